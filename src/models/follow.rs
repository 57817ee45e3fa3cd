use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 关注关系边：(follower_id, following_id) 唯一，禁止自关注
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: DateTime<Utc>,
}

/// 关注列表里的用户信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUserInfo {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub follower_count: i64,
    #[serde(default)]
    pub is_following: bool,
    #[serde(default)]
    pub is_followed_back: bool,
}

/// 关注统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowStats {
    pub followers_count: i64,
    pub following_count: i64,
    pub is_following: bool,
    pub is_followed_by: bool,
}
