use crate::{
    error::{AppError, Result},
    models::like::Like,
    models::notification::{CreateNotification, NotificationType},
    models::post::*,
    services::{Database, NotificationService, ProfileService},
    utils::validation::validate_post_content,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// 帖子服务
/// 点赞数、评论数是冗余列，每次写入后从边表重算
#[derive(Clone)]
pub struct PostService {
    db: Arc<Database>,
    profiles: ProfileService,
    notifications: NotificationService,
}

impl PostService {
    pub fn new(
        db: Arc<Database>,
        profiles: ProfileService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            db,
            profiles,
            notifications,
        }
    }

    pub async fn create_post(&self, user_id: &str, request: CreatePostRequest) -> Result<PostResponse> {
        request.validate()?;
        validate_post_content(&request.content)?;

        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4().to_string(),
            content: request.content,
            image_url: request.image_url,
            author_id: user_id.to_string(),
            category: request.category,
            is_active: true,
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };

        self.db.create("post", &post.id, &post).await?;
        self.recompute_post_count(user_id).await?;

        info!("User {} created post {}", user_id, post.id);

        let author = self.profiles.require_profile(user_id).await?;
        Ok(PostResponse::from_post(post, (&author).into()))
    }

    /// 按ID取帖子，软删除的帖子视为不存在
    pub async fn get_active_post(&self, post_id: &str) -> Result<Post> {
        let post: Option<Post> = self.db.get_by_id("post", post_id).await?;

        post.filter(|p| p.is_active)
            .ok_or_else(|| AppError::not_found("Post"))
    }

    /// 帖子详情，带作者摘要；有 viewer 时合并点赞状态
    pub async fn get_post(&self, post_id: &str, viewer_id: Option<&str>) -> Result<PostResponse> {
        let post = self.get_active_post(post_id).await?;

        let author = self.profiles.require_profile(&post.author_id).await?;
        let mut response = PostResponse::from_post(post, (&author).into());

        if let Some(viewer) = viewer_id {
            let liked = self.liked_post_ids(viewer, std::slice::from_ref(&response.id)).await?;
            response.is_liked_by_user = Some(liked.contains(&response.id));
        }

        Ok(response)
    }

    /// 更新帖子，作者本人或管理员
    pub async fn update_post(
        &self,
        user_id: &str,
        post_id: &str,
        request: UpdatePostRequest,
    ) -> Result<PostResponse> {
        request.validate()?;
        if let Some(content) = &request.content {
            validate_post_content(content)?;
        }

        let post = self.get_active_post(post_id).await?;
        self.require_author_or_admin(user_id, &post).await?;

        let mut sets = Vec::new();
        let mut params = json!({
            "id": post_id,
            "now": Utc::now(),
        });

        if let Some(content) = &request.content {
            sets.push("content = $content");
            params["content"] = json!(content);
        }

        if let Some(image_url) = &request.image_url {
            sets.push("image_url = $image_url");
            params["image_url"] = json!(image_url);
        }

        if let Some(category) = &request.category {
            sets.push("category = $category");
            params["category"] = json!(category);
        }

        if !sets.is_empty() {
            sets.push("updated_at = $now");

            let query = format!(
                "UPDATE type::thing('post', $id) SET {} RETURN NONE",
                sets.join(", ")
            );
            self.db.query_with_params(&query, params).await?;
            debug!("Updated post {}", post_id);
        }

        self.get_post(post_id, None).await
    }

    /// 软删除帖子，作者本人或管理员
    pub async fn delete_post(&self, user_id: &str, post_id: &str) -> Result<()> {
        let post = self.get_active_post(post_id).await?;
        self.require_author_or_admin(user_id, &post).await?;

        self.db.query_with_params(
            "UPDATE type::thing('post', $id) SET is_active = false, updated_at = $now RETURN NONE",
            json!({ "id": post_id, "now": Utc::now() }),
        ).await?;

        self.recompute_post_count(&post.author_id).await?;

        info!("Post {} deleted by user {}", post_id, user_id);
        Ok(())
    }

    /// 点赞：重复点赞报 Conflict，作者收到通知
    pub async fn like_post(&self, user_id: &str, post_id: &str) -> Result<()> {
        let post = self.get_active_post(post_id).await?;

        if self.has_liked(user_id, post_id).await? {
            return Err(AppError::conflict("Post already liked"));
        }

        let like = Like {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            post_id: post_id.to_string(),
            created_at: Utc::now(),
        };
        self.db.create("like", &like.id, &like).await?;

        self.recompute_like_count(post_id).await?;

        // 通知失败不回滚点赞
        if let Err(e) = self
            .notifications
            .create(CreateNotification {
                recipient_id: post.author_id.clone(),
                sender_id: user_id.to_string(),
                notification_type: NotificationType::Like,
                post_id: Some(post_id.to_string()),
            })
            .await
        {
            warn!("Failed to create like notification for post {}: {}", post_id, e);
        }

        Ok(())
    }

    /// 取消点赞：未点赞时报 NotFound
    pub async fn unlike_post(&self, user_id: &str, post_id: &str) -> Result<()> {
        self.get_active_post(post_id).await?;

        let mut response = self.db.query_with_params(
            "DELETE like WHERE user_id = $user_id AND post_id = $post_id \
             RETURN meta::id(id) AS id",
            json!({ "user_id": user_id, "post_id": post_id }),
        ).await?;

        let deleted: Vec<serde_json::Value> = response.take(0)?;
        if deleted.is_empty() {
            return Err(AppError::not_found("Like"));
        }

        self.recompute_like_count(post_id).await?;
        Ok(())
    }

    /// 批量查 viewer 点赞过的帖子，供列表合并状态，单次查询
    pub async fn liked_post_ids(&self, viewer_id: &str, post_ids: &[String]) -> Result<Vec<String>> {
        let Some((sql, params)) = liked_posts_lookup(viewer_id, post_ids) else {
            return Ok(Vec::new());
        };

        let mut response = self.db.query_with_params(sql, params).await?;

        let rows: Vec<serde_json::Value> = response.take(0)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get("post_id").and_then(|v| v.as_str()).map(String::from))
            .collect())
    }

    async fn has_liked(&self, user_id: &str, post_id: &str) -> Result<bool> {
        let count = self.db.count(
            "SELECT count() AS count FROM like \
             WHERE user_id = $user_id AND post_id = $post_id GROUP ALL",
            json!({ "user_id": user_id, "post_id": post_id }),
        ).await?;

        Ok(count > 0)
    }

    async fn require_author_or_admin(&self, user_id: &str, post: &Post) -> Result<()> {
        if post.author_id == user_id || self.profiles.is_admin(user_id).await? {
            Ok(())
        } else {
            Err(AppError::forbidden("You can only modify your own posts"))
        }
    }

    /// 点赞数从 like 表重算，避免并发下的增减漂移
    async fn recompute_like_count(&self, post_id: &str) -> Result<()> {
        self.db.query_with_params(
            "LET $count = (SELECT count() AS count FROM like \
               WHERE post_id = $post_id GROUP ALL)[0].count ?? 0; \
             UPDATE type::thing('post', $post_id) SET like_count = $count RETURN NONE",
            json!({ "post_id": post_id }),
        ).await?;
        Ok(())
    }

    /// 评论数重算，评论服务在写入后调用
    pub async fn recompute_comment_count(&self, post_id: &str) -> Result<()> {
        self.db.query_with_params(
            "LET $count = (SELECT count() AS count FROM comment \
               WHERE post_id = $post_id AND is_active = true GROUP ALL)[0].count ?? 0; \
             UPDATE type::thing('post', $post_id) SET comment_count = $count RETURN NONE",
            json!({ "post_id": post_id }),
        ).await?;
        Ok(())
    }

    async fn recompute_post_count(&self, user_id: &str) -> Result<()> {
        self.db.query_with_params(
            "LET $count = (SELECT count() AS count FROM post \
               WHERE author_id = $user_id AND is_active = true GROUP ALL)[0].count ?? 0; \
             UPDATE type::thing('profile', $user_id) SET post_count = $count RETURN NONE",
            json!({ "user_id": user_id }),
        ).await?;
        Ok(())
    }
}

/// 点赞状态的批量查询：整页ID绑定进一条语句，空列表不查库
fn liked_posts_lookup(
    viewer_id: &str,
    post_ids: &[String],
) -> Option<(&'static str, serde_json::Value)> {
    if post_ids.is_empty() {
        return None;
    }

    Some((
        "SELECT post_id FROM like WHERE user_id = $user_id AND post_id IN $post_ids",
        json!({ "user_id": viewer_id, "post_ids": post_ids }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_lookup_is_one_query_for_any_page_size() {
        let one: Vec<String> = vec!["p1".to_string()];
        let many: Vec<String> = (0..200).map(|i| format!("p{}", i)).collect();

        let (sql_one, params_one) = liked_posts_lookup("viewer", &one).unwrap();
        let (sql_many, params_many) = liked_posts_lookup("viewer", &many).unwrap();

        // 语句不随页大小变化，且只有一条
        assert_eq!(sql_one, sql_many);
        assert!(!sql_many.contains(';'));
        assert_eq!(sql_many.matches("SELECT").count(), 1);

        // 整页ID走同一个绑定参数
        assert_eq!(params_one["post_ids"].as_array().unwrap().len(), 1);
        assert_eq!(params_many["post_ids"].as_array().unwrap().len(), 200);
        assert_eq!(params_many["user_id"], "viewer");
    }

    #[test]
    fn test_like_lookup_skips_empty_page() {
        assert!(liked_posts_lookup("viewer", &[]).is_none());
    }
}
