use crate::{
    config::Config,
    error::{AppError, Result},
    utils::validation::validate_image_upload,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// 媒体桶，头像和帖子配图分开存放
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaBucket {
    Avatars,
    PostImages,
}

impl MediaBucket {
    /// URL 路径段到桶的映射
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "avatar" => Some(MediaBucket::Avatars),
            "post-image" => Some(MediaBucket::PostImages),
            _ => None,
        }
    }
}

/// 上传结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaUploadResponse {
    pub url: String,
    pub content_type: String,
    pub size: usize,
}

/// 媒体服务
/// 文件本体存到 Rainbow-Storage，这里只保管对象键和公开URL
#[derive(Clone)]
pub struct MediaService {
    config: Config,
    http_client: Client,
}

impl MediaService {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
        })
    }

    fn bucket_name(&self, bucket: MediaBucket) -> &str {
        match bucket {
            MediaBucket::Avatars => &self.config.avatar_bucket,
            MediaBucket::PostImages => &self.config.post_image_bucket,
        }
    }

    /// 上传图片，键名带随机前缀避免覆盖
    pub async fn upload_image(
        &self,
        bucket: MediaBucket,
        user_id: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<MediaUploadResponse> {
        validate_image_upload(
            content_type,
            data.len(),
            self.config.max_upload_size,
            &self.config.allowed_image_types,
        )?;

        let extension = extension_for(content_type);
        let key = format!("{}/{}.{}", user_id, Uuid::new_v4().simple(), extension);
        let bucket_name = self.bucket_name(bucket);
        let size = data.len();

        let url = format!(
            "{}/api/objects/{}/{}",
            self.config.storage_service_url, bucket_name, key
        );

        let response = self.http_client
            .put(&url)
            .header("Authorization", format!("Bearer {}", self.config.storage_service_token))
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Storage service rejected upload: {}", response.status());
            return Err(AppError::FileUpload("Failed to store uploaded file".to_string()));
        }

        info!("Uploaded {} bytes to {}/{}", size, bucket_name, key);

        Ok(MediaUploadResponse {
            url: self.public_url(bucket, &key),
            content_type: content_type.to_string(),
            size,
        })
    }

    /// 删除对象，不存在时静默成功
    pub async fn remove_object(&self, bucket: MediaBucket, key: &str) -> Result<()> {
        let url = format!(
            "{}/api/objects/{}/{}",
            self.config.storage_service_url,
            self.bucket_name(bucket),
            key
        );

        let response = self.http_client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.config.storage_service_token))
            .send()
            .await?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            warn!("Storage service failed to delete {}: {}", key, response.status());
            return Err(AppError::internal("Failed to delete stored file"));
        }

        Ok(())
    }

    pub fn public_url(&self, bucket: MediaBucket, key: &str) -> String {
        format!(
            "{}/public/{}/{}",
            self.config.storage_service_url,
            self.bucket_name(bucket),
            key
        )
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("application/octet-stream"), "jpg");
    }

    #[test]
    fn test_bucket_from_slug() {
        assert_eq!(MediaBucket::from_slug("avatar"), Some(MediaBucket::Avatars));
        assert_eq!(MediaBucket::from_slug("post-image"), Some(MediaBucket::PostImages));
        assert_eq!(MediaBucket::from_slug("documents"), None);
    }
}
