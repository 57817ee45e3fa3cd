use crate::{
    error::{AppError, Result},
    services::auth::User,
    services::media::MediaBucket,
    state::AppState,
};
use axum::{
    extract::{Multipart, Path, State},
    response::Json,
    routing::{delete, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload/:bucket", post(upload_image))
        .route("/objects/:bucket/*key", delete(delete_object))
}

/// 上传图片，bucket 为 avatar 或 post-image
/// POST /api/social/media/upload/:bucket
async fn upload_image(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(bucket): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let bucket = MediaBucket::from_slug(&bucket)
        .ok_or_else(|| AppError::validation("Unknown upload bucket"))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::FileUpload(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .ok_or_else(|| AppError::FileUpload("Missing content type".to_string()))?
            .to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::FileUpload(format!("Failed to read upload: {}", e)))?;

        debug!("User {} uploading {} bytes to {:?}", user.id, data.len(), bucket);

        let result = state
            .media_service
            .upload_image(bucket, &user.id, &content_type, data.to_vec())
            .await?;

        return Ok(Json(json!({
            "success": true,
            "data": result
        })));
    }

    Err(AppError::FileUpload("No file field in upload".to_string()))
}

/// 删除自己上传的对象，键以上传者ID开头
/// DELETE /api/social/media/objects/:bucket/*key
async fn delete_object(
    State(state): State<Arc<AppState>>,
    user: User,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let bucket = MediaBucket::from_slug(&bucket)
        .ok_or_else(|| AppError::validation("Unknown upload bucket"))?;

    if !key.starts_with(&format!("{}/", user.id)) {
        return Err(AppError::forbidden("You can only delete your own uploads"));
    }

    debug!("User {} deleting {:?}/{}", user.id, bucket, key);
    state.media_service.remove_object(bucket, &key).await?;

    Ok(Json(json!({
        "success": true,
        "message": "File deleted"
    })))
}
