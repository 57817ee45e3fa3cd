use crate::{
    error::Result,
    models::notification::{NotificationActionRequest, NotificationListQuery},
    services::auth::User,
    state::AppState,
};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(get_unread_count))
        .route("/stats", get(get_stats))
        .route("/actions", post(apply_action))
}

/// 通知列表，unread_only=true 只看未读
/// GET /api/social/notifications
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Value>> {
    debug!("Listing notifications for user {}", user.id);

    let notifications = state.notification_service.list(&user.id, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": notifications
    })))
}

/// 未读数
/// GET /api/social/notifications/unread-count
async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Value>> {
    let count = state.notification_service.count_unread(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "unread_count": count }
    })))
}

/// 通知统计
/// GET /api/social/notifications/stats
async fn get_stats(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Value>> {
    let stats = state.notification_service.get_stats(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": stats
    })))
}

/// 批量操作：mark_all_read / mark_read / delete_all / delete
/// POST /api/social/notifications/actions
async fn apply_action(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<NotificationActionRequest>,
) -> Result<Json<Value>> {
    let result = state
        .notification_service
        .apply_action(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": result
    })))
}
