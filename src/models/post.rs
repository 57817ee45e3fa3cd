use crate::models::profile::ProfileSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 帖子分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostCategory {
    General,
    Announcement,
    Question,
}

impl Default for PostCategory {
    fn default() -> Self {
        PostCategory::General
    }
}

impl PostCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostCategory::General => "general",
            PostCategory::Announcement => "announcement",
            PostCategory::Question => "question",
        }
    }
}

/// 帖子
/// is_active=false 表示软删除，保留引用历史
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub author_id: String,
    pub category: PostCategory,
    pub is_active: bool,
    // 冗余计数，以 like/comment 表为准
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建帖子请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 280, message = "Post content must be 1-280 characters"))]
    pub content: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: PostCategory,
}

/// 更新帖子请求（作者或管理员）
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 280, message = "Post content must be 1-280 characters"))]
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<PostCategory>,
}

/// 返回给调用方的帖子DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub author: ProfileSummary,
    pub category: PostCategory,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 仅在提供 viewer 时合并，单次批量查询得出
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked_by_user: Option<bool>,
    /// like_count + comment_count，仅供客户端展示，不参与排序
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_score: Option<i64>,
}

impl PostResponse {
    pub fn from_post(post: Post, author: ProfileSummary) -> Self {
        Self {
            id: post.id,
            content: post.content,
            image_url: post.image_url,
            author,
            category: post.category,
            like_count: post.like_count,
            comment_count: post.comment_count,
            created_at: post.created_at,
            updated_at: post.updated_at,
            is_liked_by_user: None,
            engagement_score: None,
        }
    }
}
