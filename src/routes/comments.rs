use crate::{error::Result, services::auth::User, state::AppState};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::delete,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:comment_id", delete(delete_comment))
}

/// 删除评论（评论作者、帖子作者或管理员）
/// DELETE /api/social/comments/:comment_id
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(comment_id): Path<String>,
) -> Result<Json<Value>> {
    state
        .comment_service
        .delete_comment(&user.id, &comment_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Comment deleted successfully"
    })))
}
