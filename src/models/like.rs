use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 点赞边：(user_id, post_id) 唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
}
