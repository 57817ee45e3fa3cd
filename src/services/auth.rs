use crate::{config::Config, error::{AppError, Result}, services::ProfileService};
use axum::{
    async_trait,
    extract::FromRequestParts,
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    Extension,
    RequestPartsExt, TypedHeader,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// 认证服务
/// 令牌校验在本地完成，用户详情从 Rainbow-Auth 解析并短期缓存
#[derive(Clone)]
pub struct AuthService {
    config: Config,
    http_client: Client,
    user_cache: Arc<RwLock<HashMap<String, CachedUser>>>,
}

#[derive(Debug, Clone)]
struct CachedUser {
    user: User,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // 用户ID
    pub exp: i64,           // 过期时间
    pub iat: i64,           // 签发时间
    pub email: Option<String>,
}

/// 已认证的调用方身份
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub is_verified: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RainbowAuthUserResponse {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub email_verified: bool,
}

impl AuthService {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
            user_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    pub async fn resolve_user(&self, user_id: &str, token: &str) -> Result<User> {
        // 检查缓存
        if let Some(cached_user) = self.get_cached_user(user_id).await {
            debug!("Using cached user data for user: {}", user_id);
            return Ok(cached_user);
        }

        // 调用 Rainbow-Auth 获取用户信息
        let url = format!("{}/api/users/me", self.config.auth_service_url);

        let response = self.http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach Rainbow-Auth: {}", e);
                AppError::Network(e)
            })?;

        if !response.status().is_success() {
            warn!("Rainbow-Auth returned error status: {}", response.status());
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let user_data: RainbowAuthUserResponse = response.json().await
            .map_err(|e| {
                error!("Failed to parse Rainbow-Auth response: {}", e);
                AppError::Authentication("Invalid response from Rainbow-Auth".to_string())
            })?;

        let user = User {
            id: user_data.id.clone(),
            email: user_data.email,
            username: user_data.username,
            is_verified: user_data.email_verified,
        };

        // 缓存用户数据
        self.cache_user(&user_data.id, user.clone()).await;

        Ok(user)
    }

    async fn get_cached_user(&self, user_id: &str) -> Option<User> {
        let cache = self.user_cache.read().await;
        if let Some(cached) = cache.get(user_id) {
            if cached.expires_at > Utc::now() {
                return Some(cached.user.clone());
            }
        }
        None
    }

    async fn cache_user(&self, user_id: &str, user: User) {
        let mut cache = self.user_cache.write().await;
        cache.insert(user_id.to_string(), CachedUser {
            user,
            expires_at: Utc::now() + Duration::minutes(15),
        });
    }

    /// 清理过期的用户缓存
    pub async fn cleanup_expired_cache(&self) {
        let now = Utc::now();
        let mut cache = self.user_cache.write().await;
        let before = cache.len();
        cache.retain(|_, cached| cached.expires_at > now);
        debug!("Cleaned {} expired user cache entries", before - cache.len());
    }
}

// Axum extractor for authentication
#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        // 从请求头中提取 Authorization
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Authentication("Missing authorization header".to_string()))?;

        let Extension(auth_service): Extension<Arc<AuthService>> = parts
            .extract::<Extension<Arc<AuthService>>>()
            .await
            .map_err(|_| AppError::Internal("Auth service not found in request extensions".to_string()))?;

        let claims = auth_service.verify_jwt(bearer.token())?;
        let user = auth_service.resolve_user(&claims.sub, bearer.token()).await?;

        // 确保用户的 profile 存在
        if let Ok(Extension(profile_service)) = parts.extract::<Extension<ProfileService>>().await {
            if let Err(e) = profile_service
                .get_or_create_profile(&user.id, &user.email, user.username.clone())
                .await
            {
                warn!("Failed to ensure profile exists for user {}: {}", user.id, e);
            }
        }

        Ok(user)
    }
}

// Optional authentication extractor
pub struct OptionalUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        match User::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalUser(Some(user))),
            Err(_) => Ok(OptionalUser(None)),
        }
    }
}
