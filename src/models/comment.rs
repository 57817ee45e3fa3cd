use crate::models::profile::ProfileSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 评论，软删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建评论请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 200, message = "Comment content must be 1-200 characters"))]
    pub content: String,
}

/// 评论DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub content: String,
    pub author: ProfileSummary,
    pub created_at: DateTime<Utc>,
}

impl CommentResponse {
    pub fn from_comment(comment: Comment, author: ProfileSummary) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            content: comment.content,
            author,
            created_at: comment.created_at,
        }
    }
}
