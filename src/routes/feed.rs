use crate::{
    error::Result,
    models::feed::{FeedOptions, FeedType, TimeFrame},
    models::post::PostCategory,
    services::auth::OptionalUser,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub feed_type: Option<FeedType>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub category: Option<PostCategory>,
    pub timeframe: Option<TimeFrame>,
    /// 逗号分隔的作者白名单
    pub author_ids: Option<String>,
    /// 逗号分隔的作者黑名单
    pub exclude_author_ids: Option<String>,
}

impl FeedQuery {
    fn into_options(self, feed_type: FeedType) -> FeedOptions {
        FeedOptions {
            feed_type,
            page: self.page,
            limit: self.limit,
            category: self.category,
            timeframe: self.timeframe,
            author_ids: split_ids(self.author_ids.as_deref()),
            exclude_author_ids: split_ids(self.exclude_author_ids.as_deref()),
        }
    }
}

fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_feed))
        .route("/personalized", get(get_personalized_feed))
        .route("/public", get(get_public_feed))
        .route("/trending", get(get_trending_feed))
        .route("/category/:category", get(get_category_feed))
}

/// 组合 feed 入口，按 feed_type 参数分发
/// GET /api/social/feed
async fn get_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Value>> {
    let feed_type = query.feed_type.unwrap_or_default();
    let viewer = user.as_ref().map(|u| u.id.as_str());

    debug!("Assembling {:?} feed for viewer {:?}", feed_type, viewer);

    let feed = state
        .feed_service
        .get_feed(viewer, query.into_options(feed_type))
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": feed
    })))
}

/// 个性化 feed，需要登录
/// GET /api/social/feed/personalized
async fn get_personalized_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Value>> {
    let viewer = user.as_ref().map(|u| u.id.as_str());
    let options = query.into_options(FeedType::Personalized);

    let feed = state
        .feed_service
        .get_personalized_feed(viewer, &options)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": feed
    })))
}

/// 公共 feed
/// GET /api/social/feed/public
async fn get_public_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Value>> {
    let viewer = user.as_ref().map(|u| u.id.as_str());
    let options = query.into_options(FeedType::Public);

    let feed = state.feed_service.get_public_feed(viewer, &options).await?;

    Ok(Json(json!({
        "success": true,
        "data": feed
    })))
}

/// 热门 feed，timeframe 可选 hour/day/week
/// GET /api/social/feed/trending
async fn get_trending_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Value>> {
    let viewer = user.as_ref().map(|u| u.id.as_str());
    let options = query.into_options(FeedType::Trending);

    let feed = state
        .feed_service
        .get_trending_feed(viewer, &options)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": feed
    })))
}

/// 分类 feed
/// GET /api/social/feed/category/:category
async fn get_category_feed(
    State(state): State<Arc<AppState>>,
    Path(category): Path<PostCategory>,
    Query(query): Query<FeedQuery>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Value>> {
    let viewer = user.as_ref().map(|u| u.id.as_str());
    let mut options = query.into_options(FeedType::Category);
    options.category = Some(category);

    let feed = state
        .feed_service
        .get_category_feed(viewer, &options)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": feed
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ids() {
        assert_eq!(split_ids(None), Vec::<String>::new());
        assert_eq!(split_ids(Some("")), Vec::<String>::new());
        assert_eq!(split_ids(Some("a, b ,c")), vec!["a", "b", "c"]);
        assert_eq!(split_ids(Some("a,,b")), vec!["a", "b"]);
    }
}
