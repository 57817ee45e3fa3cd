use crate::{
    error::Result,
    models::admin::AdminProfileUpdate,
    services::auth::User,
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
pub struct AdminListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profiles", get(list_profiles))
        .route("/profiles/:user_id", axum::routing::put(update_profile))
}

/// 用户列表（管理员）
/// GET /api/social/admin/profiles
async fn list_profiles(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<Value>> {
    let profiles = state
        .admin_service
        .list_profiles(&user.id, query.page, query.limit, query.search.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": profiles
    })))
}

/// 管理员更新用户档案：角色、可见性、封禁
/// PUT /api/social/admin/profiles/:user_id
async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(user_id): Path<String>,
    Json(update): Json<AdminProfileUpdate>,
) -> Result<Json<Value>> {
    debug!("Admin {} updating profile {}", user.id, user_id);

    let profile = state
        .admin_service
        .update_profile(&user.id, &user_id, update)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}
