use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

/// 主页可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileVisibility {
    Public,
    Private,
    FollowersOnly,
}

impl Default for ProfileVisibility {
    fn default() -> Self {
        ProfileVisibility::Public
    }
}

/// 用户主页
/// id 与 Rainbow-Auth 的用户身份一致
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub role: UserRole,
    pub visibility: ProfileVisibility,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    // 冗余计数，以边表为准，随边表变更重算
    pub follower_count: i64,
    pub following_count: i64,
    pub post_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 嵌入其他响应的作者/发送者摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl From<&Profile> for ProfileSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            username: profile.username.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

/// 主页更新请求（仅限本人）
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,
    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,
    #[validate(length(max = 100, message = "Location must be at most 100 characters"))]
    pub location: Option<String>,
    pub visibility: Option<ProfileVisibility>,
    pub avatar_url: Option<String>,
}
