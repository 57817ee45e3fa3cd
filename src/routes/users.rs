use crate::{
    error::{AppError, Result},
    models::profile::UpdateProfileRequest,
    services::auth::User,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(get_my_profile).put(update_my_profile))
        .route("/:username", get(get_profile_by_username))
}

/// 当前用户的档案
/// GET /api/social/users/me
async fn get_my_profile(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Value>> {
    let profile = state.profile_service.require_profile(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}

/// 更新当前用户的档案
/// PUT /api/social/users/me
async fn update_my_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>> {
    debug!("User {} updating profile", user.id);

    let profile = state
        .profile_service
        .update_profile(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}

/// 按用户名查档案，封禁的用户对外不可见
/// GET /api/social/users/:username
async fn get_profile_by_username(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<Value>> {
    let profile = state
        .profile_service
        .get_profile_by_username(&username)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}
