use crate::{
    error::{AppError, Result},
    models::profile::*,
    services::Database,
    utils::validation::validate_username,
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct ProfileService {
    db: Arc<Database>,
}

impl ProfileService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// 首次认证请求时自动建档
    pub async fn get_or_create_profile(
        &self,
        user_id: &str,
        email: &str,
        username_hint: Option<String>,
    ) -> Result<Profile> {
        if let Some(profile) = self.get_profile(user_id).await? {
            return Ok(profile);
        }

        let username = self
            .pick_available_username(username_hint.as_deref(), email)
            .await?;

        let now = Utc::now();
        let profile = Profile {
            id: user_id.to_string(),
            username,
            role: UserRole::User,
            visibility: ProfileVisibility::Public,
            bio: None,
            website: None,
            location: None,
            avatar_url: None,
            follower_count: 0,
            following_count: 0,
            post_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.db.create("profile", user_id, &profile).await?;
        info!("Created profile for user {} ({})", user_id, profile.username);

        Ok(profile)
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.db.get_by_id("profile", user_id).await
    }

    /// 获取主页，不存在则报 NotFound
    pub async fn require_profile(&self, user_id: &str) -> Result<Profile> {
        self.get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn get_profile_by_username(&self, username: &str) -> Result<Option<Profile>> {
        let mut response = self.db.query_with_params(
            "SELECT *, meta::id(id) AS id FROM profile WHERE username = $username",
            json!({ "username": username }),
        ).await?;

        let profiles: Vec<Profile> = response.take(0)?;
        Ok(profiles.into_iter().next())
    }

    /// 本人更新主页
    pub async fn update_profile(&self, user_id: &str, request: UpdateProfileRequest) -> Result<Profile> {
        request.validate()?;

        let profile = self.require_profile(user_id).await?;

        let mut sets = Vec::new();
        let mut params = json!({
            "id": user_id,
            "now": Utc::now(),
        });

        if let Some(username) = &request.username {
            validate_username(username)?;

            if username != &profile.username && self.username_taken(username).await? {
                return Err(AppError::conflict("Username is already taken"));
            }

            sets.push("username = $username");
            params["username"] = json!(username);
        }

        if let Some(bio) = &request.bio {
            sets.push("bio = $bio");
            params["bio"] = json!(bio);
        }

        if let Some(website) = &request.website {
            sets.push("website = $website");
            params["website"] = json!(website);
        }

        if let Some(location) = &request.location {
            sets.push("location = $location");
            params["location"] = json!(location);
        }

        if let Some(visibility) = &request.visibility {
            sets.push("visibility = $visibility");
            params["visibility"] = json!(visibility);
        }

        if let Some(avatar_url) = &request.avatar_url {
            sets.push("avatar_url = $avatar_url");
            params["avatar_url"] = json!(avatar_url);
        }

        if sets.is_empty() {
            return Ok(profile);
        }

        sets.push("updated_at = $now");

        let query = format!(
            "UPDATE type::thing('profile', $id) SET {} RETURN NONE",
            sets.join(", ")
        );
        self.db.query_with_params(&query, params).await?;

        debug!("Updated profile for user {}", user_id);
        self.require_profile(user_id).await
    }

    /// 管理员判定，以 profile 行的 role 为准
    pub async fn is_admin(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .get_profile(user_id)
            .await?
            .map(|p| p.role == UserRole::Admin)
            .unwrap_or(false))
    }

    /// 批量取主页摘要，供列表响应拼装
    pub async fn get_summaries(&self, user_ids: &[String]) -> Result<HashMap<String, ProfileSummary>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut response = self.db.query_with_params(
            "SELECT meta::id(id) AS id, username, avatar_url FROM profile WHERE meta::id(id) IN $ids",
            json!({ "ids": user_ids }),
        ).await?;

        let summaries: Vec<ProfileSummary> = response.take(0)?;
        Ok(summaries.into_iter().map(|s| (s.id.clone(), s)).collect())
    }

    async fn username_taken(&self, username: &str) -> Result<bool> {
        let count = self.db.count(
            "SELECT count() AS count FROM profile WHERE username = $username GROUP ALL",
            json!({ "username": username }),
        ).await?;

        Ok(count > 0)
    }

    /// 从提示或邮箱推导可用的用户名，冲突时追加随机后缀
    async fn pick_available_username(&self, hint: Option<&str>, email: &str) -> Result<String> {
        let base = hint
            .filter(|h| !h.trim().is_empty())
            .map(|h| h.to_string())
            .unwrap_or_else(|| email.split('@').next().unwrap_or("user").to_string());

        let mut candidate = sanitize_username(&base);

        if self.username_taken(&candidate).await? {
            let suffix = &Uuid::new_v4().simple().to_string()[..6];
            // 保证追加后缀后仍在30字符以内
            candidate.truncate(23);
            candidate = format!("{}_{}", candidate, suffix);
        }

        Ok(candidate)
    }
}

/// 把任意字符串收敛成合法用户名
fn sanitize_username(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(30)
        .collect();

    while cleaned.len() < 3 {
        cleaned.push('0');
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_username() {
        assert_eq!(sanitize_username("ana.belle!"), "anabelle");
        assert_eq!(sanitize_username("ok_name"), "ok_name");
        assert_eq!(sanitize_username("a"), "a00");
        assert_eq!(sanitize_username(&"x".repeat(40)).len(), 30);
        assert!(validate_username(&sanitize_username("weird name +++")).is_ok());
    }
}
