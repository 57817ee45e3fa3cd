use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Database configuration
    pub database_endpoint: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub auth_service_url: String,
    pub jwt_secret: String,

    // Storage configuration (Rainbow-Storage)
    pub storage_service_url: String,
    pub storage_service_token: String,
    pub avatar_bucket: String,
    pub post_image_bucket: String,
    pub max_upload_size: usize,
    pub allowed_image_types: String,

    // Content settings
    pub max_post_length: usize,
    pub max_comment_length: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,

    // Feed settings
    pub feed_cache_ttl: u64,

    // Notification settings
    pub notification_retention_days: i64,
    pub retention_sweep_interval: u64,

    // Rate limiting
    pub rate_limit_requests: u32,
    pub rate_limit_window: u64,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            database_endpoint: env::var("DATABASE_ENDPOINT")
                .unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "rainbow".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "social".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            auth_service_url: env::var("AUTH_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),

            storage_service_url: env::var("STORAGE_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8090".to_string()),
            storage_service_token: env::var("STORAGE_SERVICE_TOKEN")
                .unwrap_or_default(),
            avatar_bucket: env::var("AVATAR_BUCKET")
                .unwrap_or_else(|_| "avatars".to_string()),
            post_image_bucket: env::var("POST_IMAGE_BUCKET")
                .unwrap_or_else(|_| "post-images".to_string()),
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .unwrap_or_else(|_| "2097152".to_string())
                .parse()?,
            allowed_image_types: env::var("ALLOWED_IMAGE_TYPES")
                .unwrap_or_else(|_| "image/jpeg,image/png".to_string()),

            max_post_length: env::var("MAX_POST_LENGTH")
                .unwrap_or_else(|_| "280".to_string())
                .parse()?,
            max_comment_length: env::var("MAX_COMMENT_LENGTH")
                .unwrap_or_else(|_| "200".to_string())
                .parse()?,
            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            max_page_size: env::var("MAX_PAGE_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,

            feed_cache_ttl: env::var("FEED_CACHE_TTL")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,

            notification_retention_days: env::var("NOTIFICATION_RETENTION_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            retention_sweep_interval: env::var("RETENTION_SWEEP_INTERVAL")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,

            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            rate_limit_window: env::var("RATE_LIMIT_WINDOW")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
