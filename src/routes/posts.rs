use crate::{
    error::Result,
    models::comment::CreateCommentRequest,
    models::post::{CreatePostRequest, UpdatePostRequest},
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
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_post))
        .route("/:post_id", get(get_post).put(update_post).delete(delete_post))
        .route("/:post_id/like", post(like_post).delete(unlike_post))
        .route("/:post_id/comments", get(list_comments).post(create_comment))
}

/// 发布帖子
/// POST /api/social/posts
async fn create_post(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<CreatePostRequest>,
) -> Result<Json<Value>> {
    debug!("User {} creating post", user.id);

    let post = state.post_service.create_post(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": post
    })))
}

/// 帖子详情，登录用户附带点赞状态
/// GET /api/social/posts/:post_id
async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<Value>> {
    let viewer = user.as_ref().map(|u| u.id.as_str());
    let post = state.post_service.get_post(&post_id, viewer).await?;

    Ok(Json(json!({
        "success": true,
        "data": post
    })))
}

/// 更新帖子（作者或管理员）
/// PUT /api/social/posts/:post_id
async fn update_post(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(post_id): Path<String>,
    Json(request): Json<UpdatePostRequest>,
) -> Result<Json<Value>> {
    let post = state
        .post_service
        .update_post(&user.id, &post_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": post
    })))
}

/// 删除帖子（软删除，作者或管理员）
/// DELETE /api/social/posts/:post_id
async fn delete_post(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(post_id): Path<String>,
) -> Result<Json<Value>> {
    state.post_service.delete_post(&user.id, &post_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Post deleted successfully"
    })))
}

/// 点赞
/// POST /api/social/posts/:post_id/like
async fn like_post(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(post_id): Path<String>,
) -> Result<Json<Value>> {
    state.post_service.like_post(&user.id, &post_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Post liked successfully"
    })))
}

/// 取消点赞
/// DELETE /api/social/posts/:post_id/like
async fn unlike_post(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(post_id): Path<String>,
) -> Result<Json<Value>> {
    state.post_service.unlike_post(&user.id, &post_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Post unliked successfully"
    })))
}

/// 帖子的评论列表
/// GET /api/social/posts/:post_id/comments
async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>> {
    let comments = state
        .comment_service
        .list_comments(&post_id, query.page, query.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": comments
    })))
}

/// 发表评论
/// POST /api/social/posts/:post_id/comments
async fn create_comment(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(post_id): Path<String>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<Value>> {
    let comment = state
        .comment_service
        .create_comment(&user.id, &post_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": comment
    })))
}
