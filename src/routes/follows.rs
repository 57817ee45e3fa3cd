use crate::{
    error::Result,
    services::auth::{OptionalUser, User},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct FollowQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/:user_id", post(follow_user).delete(unfollow_user))
        .route("/user/:user_id/followers", get(get_followers))
        .route("/user/:user_id/following", get(get_following))
        .route("/user/:user_id/stats", get(get_follow_stats))
}

/// 关注用户
/// POST /api/social/follows/user/:user_id
async fn follow_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    debug!("User {} following user {}", user.id, user_id);

    state.follow_service.follow_user(&user.id, &user_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "User followed successfully"
    })))
}

/// 取消关注
/// DELETE /api/social/follows/user/:user_id
async fn unfollow_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    debug!("User {} unfollowing user {}", user.id, user_id);

    state
        .follow_service
        .unfollow_user(&user.id, &user_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "User unfollowed successfully"
    })))
}

/// 粉丝列表
/// GET /api/social/follows/user/:user_id/followers
async fn get_followers(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<FollowQuery>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Value>> {
    let viewer = user.as_ref().map(|u| u.id.as_str());
    let followers = state
        .follow_service
        .get_followers(&user_id, viewer, query.page, query.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": followers
    })))
}

/// 关注列表
/// GET /api/social/follows/user/:user_id/following
async fn get_following(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<FollowQuery>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Value>> {
    let viewer = user.as_ref().map(|u| u.id.as_str());
    let following = state
        .follow_service
        .get_following(&user_id, viewer, query.page, query.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": following
    })))
}

/// 关注统计
/// GET /api/social/follows/user/:user_id/stats
async fn get_follow_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Value>> {
    let viewer = user.as_ref().map(|u| u.id.as_str());
    let stats = state.follow_service.get_stats(&user_id, viewer).await?;

    Ok(Json(json!({
        "success": true,
        "data": stats
    })))
}
