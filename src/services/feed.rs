use crate::{
    error::{AppError, Result},
    models::feed::*,
    models::post::{Post, PostResponse},
    services::{Database, PostService, ProfileService},
    utils::cache::Cache,
    utils::pagination::{PaginatedResult, Pagination},
};
use chrono::Utc;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// 公开可见的作者：主页公开且未被封禁
const PUBLIC_AUTHOR_FILTER: &str = "author_id IN \
    (SELECT VALUE meta::id(id) FROM profile WHERE visibility = 'public' AND is_active = true)";

/// Feed 组装服务
/// 四种模式共用一个分页查询骨架，结果按 (viewer, 参数) 缓存
#[derive(Clone)]
pub struct FeedService {
    db: Arc<Database>,
    profiles: ProfileService,
    posts: PostService,
    cache: Cache<FeedResponse>,
}

impl FeedService {
    pub fn new(
        db: Arc<Database>,
        profiles: ProfileService,
        posts: PostService,
        cache_ttl_secs: u64,
    ) -> Self {
        Self {
            db,
            profiles,
            posts,
            cache: Cache::new(std::time::Duration::from_secs(cache_ttl_secs)),
        }
    }

    /// 组合入口：按 feed_type 分发
    pub async fn get_feed(&self, viewer_id: Option<&str>, options: FeedOptions) -> Result<FeedResponse> {
        match options.feed_type {
            FeedType::Personalized => self.get_personalized_feed(viewer_id, &options).await,
            FeedType::Public => self.get_public_feed(viewer_id, &options).await,
            FeedType::Trending => self.get_trending_feed(viewer_id, &options).await,
            FeedType::Category => self.get_category_feed(viewer_id, &options).await,
        }
    }

    /// 个性化 feed：关注的作者加上自己，按时间倒序
    pub async fn get_personalized_feed(
        &self,
        viewer_id: Option<&str>,
        options: &FeedOptions,
    ) -> Result<FeedResponse> {
        let viewer = viewer_id
            .ok_or_else(|| AppError::unauthorized("Personalized feed requires authentication"))?;

        let pagination = Pagination::from_params(options.page, options.limit);
        let cache_key = feed_cache_key(Some(viewer), options, &pagination);

        if let Some(cached) = self.cached(&cache_key, options) {
            return Ok(cached);
        }

        let following = self.following_ids(viewer).await?;
        let authors = personalized_author_set(
            viewer,
            &following,
            &options.author_ids,
            &options.exclude_author_ids,
        );

        // 过滤后没有可见作者时直接返回空页
        if authors.is_empty() {
            let empty = FeedResponse::from(PaginatedResult::new(Vec::new(), 0, pagination));
            return Ok(empty);
        }

        let where_clause = "is_active = true AND author_id IN $authors";
        let params = json!({ "authors": authors });

        let result = self
            .fetch_page(where_clause, "created_at DESC", params, &pagination, viewer_id, false)
            .await?;

        self.store(&cache_key, options, &result);
        Ok(result)
    }

    /// 公共 feed：全部活跃帖子按时间倒序
    pub async fn get_public_feed(
        &self,
        viewer_id: Option<&str>,
        options: &FeedOptions,
    ) -> Result<FeedResponse> {
        let pagination = Pagination::from_params(options.page, options.limit);
        let cache_key = feed_cache_key(viewer_id, options, &pagination);

        if let Some(cached) = self.cached(&cache_key, options) {
            return Ok(cached);
        }

        let base = format!("is_active = true AND {}", PUBLIC_AUTHOR_FILTER);
        let (where_clause, params) = author_filtered_clause(&base, options, json!({}));

        let result = self
            .fetch_page(&where_clause, "created_at DESC", params, &pagination, viewer_id, false)
            .await?;

        self.store(&cache_key, options, &result);
        Ok(result)
    }

    /// 热门 feed：时间窗内按点赞、评论、时间三级倒序
    pub async fn get_trending_feed(
        &self,
        viewer_id: Option<&str>,
        options: &FeedOptions,
    ) -> Result<FeedResponse> {
        let pagination = Pagination::from_params(options.page, options.limit);
        let cache_key = feed_cache_key(viewer_id, options, &pagination);

        if let Some(cached) = self.cached(&cache_key, options) {
            return Ok(cached);
        }

        let timeframe = options.timeframe.unwrap_or_default();
        let since = Utc::now() - timeframe.duration();

        let base = format!(
            "is_active = true AND created_at > $since AND {}",
            PUBLIC_AUTHOR_FILTER
        );
        let (where_clause, params) = author_filtered_clause(&base, options, json!({ "since": since }));

        let result = self
            .fetch_page(
                &where_clause,
                "like_count DESC, comment_count DESC, created_at DESC",
                params,
                &pagination,
                viewer_id,
                true,
            )
            .await?;

        self.store(&cache_key, options, &result);
        Ok(result)
    }

    /// 分类 feed：必须指定分类
    pub async fn get_category_feed(
        &self,
        viewer_id: Option<&str>,
        options: &FeedOptions,
    ) -> Result<FeedResponse> {
        let category = options
            .category
            .ok_or_else(|| AppError::validation("Category feed requires a category"))?;

        let pagination = Pagination::from_params(options.page, options.limit);
        let cache_key = feed_cache_key(viewer_id, options, &pagination);

        if let Some(cached) = self.cached(&cache_key, options) {
            return Ok(cached);
        }

        let base = format!(
            "is_active = true AND category = $category AND {}",
            PUBLIC_AUTHOR_FILTER
        );
        let (where_clause, params) =
            author_filtered_clause(&base, options, json!({ "category": category }));

        let result = self
            .fetch_page(&where_clause, "created_at DESC", params, &pagination, viewer_id, false)
            .await?;

        self.store(&cache_key, options, &result);
        Ok(result)
    }

    /// 关注关系变化后让该用户的缓存页失效
    pub fn invalidate_viewer(&self, user_id: &str) {
        let removed = self.cache.invalidate_prefix(&viewer_cache_prefix(user_id));
        if removed > 0 {
            debug!("Invalidated {} cached feed pages for user {}", removed, user_id);
        }
    }

    /// 后台任务定期清理过期缓存项
    pub fn purge_cache(&self) {
        self.cache.purge_expired();
    }

    /// 共用的分页查询骨架：取页 + 计数 + 批量作者摘要 + viewer 状态
    async fn fetch_page(
        &self,
        where_clause: &str,
        order_by: &str,
        params: serde_json::Value,
        pagination: &Pagination,
        viewer_id: Option<&str>,
        trending: bool,
    ) -> Result<FeedResponse> {
        let sql = format!(
            "SELECT *, meta::id(id) AS id FROM post WHERE {} \
             ORDER BY {} LIMIT $limit START $offset",
            where_clause, order_by
        );

        let mut page_params = params.clone();
        page_params["limit"] = json!(pagination.limit);
        page_params["offset"] = json!(pagination.offset());

        let mut response = self.db.query_with_params(&sql, page_params).await?;
        let posts: Vec<Post> = response.take(0)?;

        let count_sql = format!(
            "SELECT count() AS count FROM post WHERE {} GROUP ALL",
            where_clause
        );
        let total = self.db.count(&count_sql, params).await?;

        let author_ids: Vec<String> = posts.iter().map(|p| p.author_id.clone()).collect();
        let authors = self.profiles.get_summaries(&author_ids).await?;

        let mut items: Vec<PostResponse> = posts
            .into_iter()
            .filter_map(|post| {
                authors
                    .get(&post.author_id)
                    .cloned()
                    .map(|author| PostResponse::from_post(post, author))
            })
            .collect();

        if trending {
            items.sort_by(compare_trending);
        }

        if let Some(viewer) = viewer_id {
            self.attach_viewer_state(viewer, &mut items, trending)
                .await?;
        }

        Ok(FeedResponse::from(PaginatedResult::new(items, total, *pagination)))
    }

    /// viewer 状态合并：点赞状态走单次批量查询
    async fn attach_viewer_state(
        &self,
        viewer_id: &str,
        items: &mut [PostResponse],
        with_engagement: bool,
    ) -> Result<()> {
        let post_ids: Vec<String> = items.iter().map(|p| p.id.clone()).collect();
        let liked: HashSet<String> = self
            .posts
            .liked_post_ids(viewer_id, &post_ids)
            .await?
            .into_iter()
            .collect();

        for item in items.iter_mut() {
            item.is_liked_by_user = Some(liked.contains(&item.id));
            if with_engagement {
                item.engagement_score = Some(item.like_count + item.comment_count);
            }
        }

        Ok(())
    }

    async fn following_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let mut response = self.db.query_with_params(
            "SELECT following_id FROM follow WHERE follower_id = $user",
            json!({ "user": user_id }),
        ).await?;

        let rows: Vec<serde_json::Value> = response.take(0)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.get("following_id")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
            .collect())
    }

    fn cached(&self, key: &str, options: &FeedOptions) -> Option<FeedResponse> {
        if !cacheable(options) {
            return None;
        }
        self.cache.get(key)
    }

    fn store(&self, key: &str, options: &FeedOptions, result: &FeedResponse) {
        if cacheable(options) {
            self.cache.set(key.to_string(), result.clone());
        }
    }
}

/// 热门排序键：点赞、评论、时间三级倒序
fn compare_trending(a: &PostResponse, b: &PostResponse) -> Ordering {
    b.like_count
        .cmp(&a.like_count)
        .then_with(|| b.comment_count.cmp(&a.comment_count))
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// 带作者过滤的 WHERE 子句
fn author_filtered_clause(
    base: &str,
    options: &FeedOptions,
    mut params: serde_json::Value,
) -> (String, serde_json::Value) {
    let mut clause = base.to_string();

    if !options.author_ids.is_empty() {
        clause.push_str(" AND author_id IN $author_ids");
        params["author_ids"] = json!(options.author_ids);
    }

    if !options.exclude_author_ids.is_empty() {
        clause.push_str(" AND author_id NOT IN $excluded_ids");
        params["excluded_ids"] = json!(options.exclude_author_ids);
    }

    (clause, params)
}

/// 个性化 feed 的作者集合：关注的人加上自己，再套白名单和黑名单
fn personalized_author_set(
    viewer_id: &str,
    following: &[String],
    author_ids: &[String],
    exclude_author_ids: &[String],
) -> Vec<String> {
    let mut authors: Vec<String> = following.to_vec();
    if !authors.iter().any(|id| id == viewer_id) {
        authors.push(viewer_id.to_string());
    }

    if !author_ids.is_empty() {
        let allowed: HashSet<&String> = author_ids.iter().collect();
        authors.retain(|id| allowed.contains(id));
    }

    let excluded: HashSet<&String> = exclude_author_ids.iter().collect();
    authors.retain(|id| !excluded.contains(id));

    authors
}

/// 失效用的键前缀，与 feed_cache_key 的前两段对应
fn viewer_cache_prefix(user_id: &str) -> String {
    format!("feed:{}:", user_id)
}

/// 缓存键，viewer 段用于关注变化时的定向失效
fn feed_cache_key(viewer_id: Option<&str>, options: &FeedOptions, pagination: &Pagination) -> String {
    let feed_type = match options.feed_type {
        FeedType::Personalized => "personalized",
        FeedType::Public => "public",
        FeedType::Trending => "trending",
        FeedType::Category => "category",
    };

    let mut key = format!(
        "feed:{}:{}:{}:{}",
        viewer_id.unwrap_or("anonymous"),
        feed_type,
        pagination.page,
        pagination.limit
    );

    if let Some(category) = options.category {
        key.push(':');
        key.push_str(category.as_str());
    }

    if let Some(timeframe) = options.timeframe {
        key.push(':');
        key.push_str(match timeframe {
            TimeFrame::Hour => "hour",
            TimeFrame::Day => "day",
            TimeFrame::Week => "week",
        });
    }

    key
}

/// 带作者名单的请求结果不进缓存，键里不编码名单
fn cacheable(options: &FeedOptions) -> bool {
    options.author_ids.is_empty() && options.exclude_author_ids.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::PostCategory;
    use crate::models::profile::ProfileSummary;
    use chrono::{DateTime, Duration};

    fn post(id: &str, likes: i64, comments: i64, created_at: DateTime<Utc>) -> PostResponse {
        PostResponse {
            id: id.to_string(),
            content: "hello".to_string(),
            image_url: None,
            author: ProfileSummary {
                id: "author".to_string(),
                username: "author".to_string(),
                avatar_url: None,
            },
            category: PostCategory::General,
            like_count: likes,
            comment_count: comments,
            created_at,
            updated_at: created_at,
            is_liked_by_user: None,
            engagement_score: None,
        }
    }

    #[test]
    fn test_trending_three_key_ordering() {
        let now = Utc::now();

        // p1: 最多赞；p2/p3 同赞数，p2 评论更多；p3/p4 全同键，p4 更新
        let p1 = post("p1", 10, 0, now - Duration::hours(3));
        let p2 = post("p2", 5, 8, now - Duration::hours(2));
        let p3 = post("p3", 5, 2, now - Duration::hours(2));
        let p4 = post("p4", 5, 2, now - Duration::hours(1));

        let mut posts = vec![p3.clone(), p1.clone(), p4.clone(), p2.clone()];
        posts.sort_by(compare_trending);

        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p4", "p3"]);
    }

    fn options(feed_type: FeedType) -> FeedOptions {
        FeedOptions {
            feed_type,
            ..Default::default()
        }
    }

    #[test]
    fn test_personalized_author_set_includes_self_and_following() {
        let following = vec!["a".to_string(), "b".to_string()];
        let authors = personalized_author_set("viewer", &following, &[], &[]);

        assert!(authors.contains(&"viewer".to_string()));
        assert!(authors.contains(&"a".to_string()));
        assert!(authors.contains(&"b".to_string()));
        assert_eq!(authors.len(), 3);
    }

    #[test]
    fn test_personalized_author_set_applies_exclusions() {
        // viewer 关注 a、b、c，排除 c
        let following = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let excluded = vec!["c".to_string()];
        let authors = personalized_author_set("viewer", &following, &[], &excluded);

        assert!(authors.contains(&"viewer".to_string()));
        assert!(authors.contains(&"a".to_string()));
        assert!(authors.contains(&"b".to_string()));
        assert!(!authors.contains(&"c".to_string()));
    }

    #[test]
    fn test_personalized_author_set_whitelist_intersects() {
        let following = vec!["a".to_string(), "b".to_string()];
        let allowed = vec!["b".to_string()];
        let authors = personalized_author_set("viewer", &following, &allowed, &[]);

        assert_eq!(authors, vec!["b".to_string()]);
    }

    #[test]
    fn test_personalized_author_set_does_not_duplicate_self() {
        let following = vec!["viewer".to_string(), "a".to_string()];
        let authors = personalized_author_set("viewer", &following, &[], &[]);

        assert_eq!(authors.iter().filter(|id| *id == "viewer").count(), 1);
    }

    #[test]
    fn test_cache_key_segments() {
        let pagination = Pagination::from_params(Some(2), Some(10));

        let key = feed_cache_key(Some("u1"), &options(FeedType::Public), &pagination);
        assert_eq!(key, "feed:u1:public:2:10");

        let key = feed_cache_key(None, &options(FeedType::Public), &pagination);
        assert_eq!(key, "feed:anonymous:public:2:10");

        let mut opts = options(FeedType::Category);
        opts.category = Some(PostCategory::Question);
        let key = feed_cache_key(Some("u1"), &opts, &pagination);
        assert_eq!(key, "feed:u1:category:2:10:question");

        let mut opts = options(FeedType::Trending);
        opts.timeframe = Some(TimeFrame::Week);
        let key = feed_cache_key(Some("u1"), &opts, &pagination);
        assert_eq!(key, "feed:u1:trending:2:10:week");
    }

    #[test]
    fn test_viewer_invalidation_matches_key_prefix() {
        let pagination = Pagination::from_params(Some(1), Some(20));
        let key = feed_cache_key(Some("u1"), &options(FeedType::Personalized), &pagination);

        assert!(key.starts_with(&viewer_cache_prefix("u1")));
        // 前缀相同的其他用户不会被误伤
        let other = feed_cache_key(Some("u12"), &options(FeedType::Personalized), &pagination);
        assert!(!other.starts_with(&viewer_cache_prefix("u1")));
    }

    #[test]
    fn test_numeric_viewer_prefix_skips_page_segments() {
        // 用户ID "2" 不能命中其他用户键里的页码段
        let pagination = Pagination::from_params(Some(2), Some(20));
        let other = feed_cache_key(Some("u1"), &options(FeedType::Personalized), &pagination);

        assert!(other.contains(":2:"));
        assert!(!other.starts_with(&viewer_cache_prefix("2")));

        let own = feed_cache_key(Some("2"), &options(FeedType::Public), &pagination);
        assert!(own.starts_with(&viewer_cache_prefix("2")));
    }

    #[test]
    fn test_author_filters_not_cached() {
        let mut opts = options(FeedType::Public);
        assert!(cacheable(&opts));

        opts.author_ids = vec!["a".to_string()];
        assert!(!cacheable(&opts));

        opts.author_ids.clear();
        opts.exclude_author_ids = vec!["b".to_string()];
        assert!(!cacheable(&opts));
    }

    #[test]
    fn test_author_filtered_clause() {
        let mut opts = options(FeedType::Public);
        let (clause, _) = author_filtered_clause("is_active = true", &opts, json!({}));
        assert_eq!(clause, "is_active = true");

        opts.author_ids = vec!["a".to_string()];
        opts.exclude_author_ids = vec!["b".to_string()];
        let (clause, params) = author_filtered_clause("is_active = true", &opts, json!({}));
        assert!(clause.contains("author_id IN $author_ids"));
        assert!(clause.contains("author_id NOT IN $excluded_ids"));
        assert_eq!(params["author_ids"][0], "a");
        assert_eq!(params["excluded_ids"][0], "b");
    }
}
