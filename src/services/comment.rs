use crate::{
    error::{AppError, Result},
    models::comment::*,
    models::notification::{CreateNotification, NotificationType},
    services::{Database, NotificationService, PostService, ProfileService},
    utils::pagination::{PaginatedResult, Pagination},
    utils::validation::validate_comment_content,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

/// 评论服务
#[derive(Clone)]
pub struct CommentService {
    db: Arc<Database>,
    profiles: ProfileService,
    posts: PostService,
    notifications: NotificationService,
}

impl CommentService {
    pub fn new(
        db: Arc<Database>,
        profiles: ProfileService,
        posts: PostService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            db,
            profiles,
            posts,
            notifications,
        }
    }

    /// 发表评论，帖子作者收到通知
    pub async fn create_comment(
        &self,
        user_id: &str,
        post_id: &str,
        request: CreateCommentRequest,
    ) -> Result<CommentResponse> {
        request.validate()?;
        validate_comment_content(&request.content)?;

        let post = self.posts.get_active_post(post_id).await?;

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            author_id: user_id.to_string(),
            content: request.content,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.db.create("comment", &comment.id, &comment).await?;
        self.posts.recompute_comment_count(post_id).await?;

        if let Err(e) = self
            .notifications
            .create(CreateNotification {
                recipient_id: post.author_id.clone(),
                sender_id: user_id.to_string(),
                notification_type: NotificationType::Comment,
                post_id: Some(post_id.to_string()),
            })
            .await
        {
            warn!("Failed to create comment notification for post {}: {}", post_id, e);
        }

        let author = self.profiles.require_profile(user_id).await?;
        Ok(CommentResponse::from_comment(comment, (&author).into()))
    }

    /// 帖子的评论列表，旧的在前，作者摘要批量拼装
    pub async fn list_comments(
        &self,
        post_id: &str,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<PaginatedResult<CommentResponse>> {
        self.posts.get_active_post(post_id).await?;

        let pagination = Pagination::from_params(page, limit);

        let mut response = self.db.query_with_params(
            "SELECT *, meta::id(id) AS id FROM comment \
             WHERE post_id = $post_id AND is_active = true \
             ORDER BY created_at ASC LIMIT $limit START $offset",
            json!({
                "post_id": post_id,
                "limit": pagination.limit,
                "offset": pagination.offset(),
            }),
        ).await?;
        let comments: Vec<Comment> = response.take(0)?;

        let total = self.db.count(
            "SELECT count() AS count FROM comment \
             WHERE post_id = $post_id AND is_active = true GROUP ALL",
            json!({ "post_id": post_id }),
        ).await?;

        let author_ids: Vec<String> = comments.iter().map(|c| c.author_id.clone()).collect();
        let authors = self.profiles.get_summaries(&author_ids).await?;

        let items = comments
            .into_iter()
            .filter_map(|c| {
                authors
                    .get(&c.author_id)
                    .cloned()
                    .map(|author| CommentResponse::from_comment(c, author))
            })
            .collect();

        Ok(PaginatedResult::new(items, total, pagination))
    }

    /// 软删除评论，评论作者、帖子作者或管理员
    pub async fn delete_comment(&self, user_id: &str, comment_id: &str) -> Result<()> {
        let comment: Option<Comment> = self.db.get_by_id("comment", comment_id).await?;
        let comment = comment
            .filter(|c| c.is_active)
            .ok_or_else(|| AppError::not_found("Comment"))?;

        let post = self.posts.get_active_post(&comment.post_id).await?;

        let allowed = comment.author_id == user_id
            || post.author_id == user_id
            || self.profiles.is_admin(user_id).await?;
        if !allowed {
            return Err(AppError::forbidden("You cannot delete this comment"));
        }

        self.db.query_with_params(
            "UPDATE type::thing('comment', $id) SET is_active = false, updated_at = $now RETURN NONE",
            json!({ "id": comment_id, "now": Utc::now() }),
        ).await?;

        self.posts.recompute_comment_count(&comment.post_id).await?;

        info!("Comment {} deleted by user {}", comment_id, user_id);
        Ok(())
    }
}
