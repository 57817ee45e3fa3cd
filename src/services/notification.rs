use crate::{
    error::{AppError, Result},
    models::notification::*,
    services::realtime::{LocalChangeFeed, NotificationEvent},
    services::{Database, ProfileService},
    utils::pagination::{PaginatedResult, Pagination},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// 通知服务
/// 所有写入都会往进程内事件总线发布一份，供实时通道消费
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<Database>,
    profiles: ProfileService,
    events: Arc<LocalChangeFeed>,
    retention_days: i64,
}

impl NotificationService {
    pub fn new(
        db: Arc<Database>,
        profiles: ProfileService,
        events: Arc<LocalChangeFeed>,
        retention_days: i64,
    ) -> Self {
        Self {
            db,
            profiles,
            events,
            retention_days,
        }
    }

    /// 创建通知
    /// 自己对自己的动作不产生通知，返回 Ok(None)
    pub async fn create(&self, request: CreateNotification) -> Result<Option<Notification>> {
        if is_self_action(&request.sender_id, &request.recipient_id) {
            debug!("Skipping self-notification for user {}", request.sender_id);
            return Ok(None);
        }

        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            recipient_id: request.recipient_id,
            sender_id: request.sender_id,
            notification_type: request.notification_type,
            post_id: request.post_id,
            message: request.notification_type.message().to_string(),
            is_read: false,
            created_at: Utc::now(),
        };

        self.db
            .create("notification", &notification.id, &notification)
            .await?;

        self.events
            .publish(NotificationEvent::Created(notification.clone()));

        Ok(Some(notification))
    }

    /// 分页列出通知，新的在前，发送者摘要与帖子预览各走一次批量查询
    pub async fn list(
        &self,
        user_id: &str,
        query: &NotificationListQuery,
    ) -> Result<PaginatedResult<NotificationResponse>> {
        let pagination = Pagination::from_params(query.page, query.limit);

        let read_filter = if query.unread_only {
            " AND is_read = false"
        } else {
            ""
        };

        let sql = format!(
            "SELECT *, meta::id(id) AS id FROM notification \
             WHERE recipient_id = $user{} \
             ORDER BY created_at DESC LIMIT $limit START $offset",
            read_filter
        );
        let mut response = self.db.query_with_params(
            &sql,
            json!({
                "user": user_id,
                "limit": pagination.limit,
                "offset": pagination.offset(),
            }),
        ).await?;
        let notifications: Vec<Notification> = response.take(0)?;

        let count_sql = format!(
            "SELECT count() AS count FROM notification WHERE recipient_id = $user{} GROUP ALL",
            read_filter
        );
        let total = self.db.count(&count_sql, json!({ "user": user_id })).await?;

        let sender_ids: Vec<String> = notifications
            .iter()
            .map(|n| n.sender_id.clone())
            .collect();
        let senders = self.profiles.get_summaries(&sender_ids).await?;
        let posts = self.get_post_previews(&notifications).await?;

        let items = notifications
            .into_iter()
            .map(|n| NotificationResponse {
                sender: senders.get(&n.sender_id).cloned(),
                post: n.post_id.as_ref().and_then(|id| posts.get(id).cloned()),
                id: n.id,
                notification_type: n.notification_type,
                message: n.message,
                is_read: n.is_read,
                created_at: n.created_at,
            })
            .collect();

        Ok(PaginatedResult::new(items, total, pagination))
    }

    /// 批量取被引用帖子的预览，软删除的帖子不再展示
    async fn get_post_previews(
        &self,
        notifications: &[Notification],
    ) -> Result<HashMap<String, PostPreview>> {
        let post_ids: Vec<String> = notifications
            .iter()
            .filter_map(|n| n.post_id.clone())
            .collect();

        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut response = self.db.query_with_params(
            "SELECT meta::id(id) AS id, content FROM post \
             WHERE meta::id(id) IN $ids AND is_active = true",
            json!({ "ids": post_ids }),
        ).await?;

        let previews: Vec<PostPreview> = response.take(0)?;
        Ok(previews.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    pub async fn count_unread(&self, user_id: &str) -> Result<usize> {
        self.db.count(
            "SELECT count() AS count FROM notification \
             WHERE recipient_id = $user AND is_read = false GROUP ALL",
            json!({ "user": user_id }),
        ).await
    }

    /// 通知统计：总量、已读/未读、按类型分布
    pub async fn get_stats(&self, user_id: &str) -> Result<NotificationStats> {
        let mut response = self.db.query_with_params(
            "SELECT notification_type, is_read, count() AS count FROM notification \
             WHERE recipient_id = $user GROUP BY notification_type, is_read",
            json!({ "user": user_id }),
        ).await?;

        let rows: Vec<Value> = response.take(0)?;

        let mut stats = NotificationStats {
            total: 0,
            unread: 0,
            read: 0,
            by_type: NotificationTypeBreakdown::default(),
        };

        for row in rows {
            let count = row.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
            let is_read = row.get("is_read").and_then(|v| v.as_bool()).unwrap_or(false);

            stats.total += count;
            if is_read {
                stats.read += count;
            } else {
                stats.unread += count;
            }

            match row.get("notification_type").and_then(|v| v.as_str()) {
                Some(t) if t == NotificationType::Follow.as_str() => stats.by_type.follow += count,
                Some(t) if t == NotificationType::Like.as_str() => stats.by_type.like += count,
                Some(t) if t == NotificationType::Comment.as_str() => stats.by_type.comment += count,
                _ => {}
            }
        }

        Ok(stats)
    }

    /// 执行批量操作入口
    pub async fn apply_action(
        &self,
        user_id: &str,
        request: NotificationActionRequest,
    ) -> Result<NotificationMutationResponse> {
        let (message, affected) = match request.action {
            NotificationAction::MarkAllRead => (
                "All notifications marked as read",
                self.mark_all_read(user_id).await?,
            ),
            NotificationAction::MarkRead => (
                "Notifications marked as read",
                self.mark_read(user_id, &require_ids(request.ids)?).await?,
            ),
            NotificationAction::DeleteAll => (
                "All notifications deleted",
                self.delete_all(user_id).await?,
            ),
            NotificationAction::Delete => (
                "Notifications deleted",
                self.delete(user_id, &require_ids(request.ids)?).await?,
            ),
        };

        Ok(NotificationMutationResponse {
            message: message.to_string(),
            affected,
        })
    }

    /// 标记指定通知为已读
    /// 归属过滤在查询谓词里，别人的通知ID会被静默忽略
    pub async fn mark_read(&self, user_id: &str, ids: &[String]) -> Result<usize> {
        let mut response = self.db.query_with_params(
            &mark_read_sql(true),
            json!({ "user": user_id, "ids": ids }),
        ).await?;

        let updated: Vec<Notification> = response.take(0)?;
        let affected = updated.len();

        for notification in updated {
            self.events.publish(NotificationEvent::Updated(notification));
        }

        Ok(affected)
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        let mut response = self.db.query_with_params(
            &mark_read_sql(false),
            json!({ "user": user_id }),
        ).await?;

        let updated: Vec<Notification> = response.take(0)?;
        let affected = updated.len();

        for notification in updated {
            self.events.publish(NotificationEvent::Updated(notification));
        }

        info!("Marked {} notifications read for user {}", affected, user_id);
        Ok(affected)
    }

    /// 删除指定通知，归属过滤同 mark_read
    pub async fn delete(&self, user_id: &str, ids: &[String]) -> Result<usize> {
        let mut response = self.db.query_with_params(
            &delete_sql(true),
            json!({ "user": user_id, "ids": ids }),
        ).await?;

        let deleted: Vec<Notification> = response.take(0)?;
        let affected = deleted.len();

        for notification in deleted {
            self.events.publish(NotificationEvent::Deleted(notification));
        }

        Ok(affected)
    }

    pub async fn delete_all(&self, user_id: &str) -> Result<usize> {
        let mut response = self.db.query_with_params(
            &delete_sql(false),
            json!({ "user": user_id }),
        ).await?;

        let deleted: Vec<Notification> = response.take(0)?;
        let affected = deleted.len();

        for notification in deleted {
            self.events.publish(NotificationEvent::Deleted(notification));
        }

        info!("Deleted all {} notifications for user {}", affected, user_id);
        Ok(affected)
    }

    /// 保留期清理，由后台任务周期触发
    pub async fn purge_expired(&self) -> Result<usize> {
        let cutoff = retention_cutoff(Utc::now(), self.retention_days);

        let mut response = self.db.query_with_params(
            &format!("DELETE notification WHERE created_at < $cutoff {}", RETURN_FIELDS),
            json!({ "cutoff": cutoff }),
        ).await?;

        let deleted: Vec<Notification> = response.take(0)?;
        let affected = deleted.len();

        for notification in deleted {
            self.events.publish(NotificationEvent::Deleted(notification));
        }

        if affected > 0 {
            info!("Purged {} notifications older than {} days", affected, self.retention_days);
        }

        Ok(affected)
    }
}

/// 批量写共享的归属谓词：只有收件人本人的行能被命中
const OWNED_BY_RECIPIENT: &str = "recipient_id = $user";

/// 指定ID时附加的过滤，始终与归属谓词合取
const ID_LIST_FILTER: &str = "meta::id(id) IN $ids";

/// 批量写统一返回完整行，affected 以返回行数计
const RETURN_FIELDS: &str = "RETURN meta::id(id) AS id, recipient_id, sender_id, \
    notification_type, post_id, message, is_read, created_at";

fn mark_read_sql(targeted: bool) -> String {
    let id_filter = if targeted {
        format!(" AND {}", ID_LIST_FILTER)
    } else {
        String::new()
    };

    format!(
        "UPDATE notification SET is_read = true WHERE {}{} AND is_read = false {}",
        OWNED_BY_RECIPIENT, id_filter, RETURN_FIELDS
    )
}

fn delete_sql(targeted: bool) -> String {
    let id_filter = if targeted {
        format!(" AND {}", ID_LIST_FILTER)
    } else {
        String::new()
    };

    format!(
        "DELETE notification WHERE {}{} {}",
        OWNED_BY_RECIPIENT, id_filter, RETURN_FIELDS
    )
}

/// 自己对自己的动作不通知
pub fn is_self_action(sender_id: &str, recipient_id: &str) -> bool {
    sender_id == recipient_id
}

/// 保留期截止线：早于此时刻的通知会被清理
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: i64) -> DateTime<Utc> {
    now - Duration::days(retention_days)
}

fn require_ids(ids: Option<Vec<String>>) -> Result<Vec<String>> {
    match ids {
        Some(ids) if !ids.is_empty() => Ok(ids),
        _ => Err(AppError::validation("This action requires a list of notification ids")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_action_guard() {
        assert!(is_self_action("alice", "alice"));
        assert!(!is_self_action("alice", "bob"));
    }

    #[test]
    fn test_retention_cutoff_boundaries() {
        let now = Utc::now();
        let cutoff = retention_cutoff(now, 30);

        // 29天前的通知保留，31天前的清理
        let fresh = now - Duration::days(29);
        let stale = now - Duration::days(31);

        assert!(fresh > cutoff);
        assert!(stale < cutoff);
    }

    #[test]
    fn test_require_ids() {
        assert!(require_ids(None).is_err());
        assert!(require_ids(Some(vec![])).is_err());
        assert_eq!(require_ids(Some(vec!["a".to_string()])).unwrap().len(), 1);
    }

    #[test]
    fn test_bulk_mutations_scoped_to_recipient() {
        // 每条批量写语句都必须带归属谓词
        for sql in [
            mark_read_sql(true),
            mark_read_sql(false),
            delete_sql(true),
            delete_sql(false),
        ] {
            assert!(sql.contains(OWNED_BY_RECIPIENT), "missing ownership filter: {}", sql);
        }

        // 全量操作不能带ID过滤
        assert!(!mark_read_sql(false).contains("$ids"));
        assert!(!delete_sql(false).contains("$ids"));
    }

    #[test]
    fn test_foreign_ids_cannot_be_counted() {
        // ID列表与归属谓词是合取关系，别人的通知ID命中不了任何行，
        // 而 affected 以 RETURN 的行数计，所以也不会被计入
        let conjunction = format!("{} AND {}", OWNED_BY_RECIPIENT, ID_LIST_FILTER);

        for sql in [mark_read_sql(true), delete_sql(true)] {
            assert!(sql.contains(&conjunction), "id list not bound to owner: {}", sql);
            assert!(sql.contains(RETURN_FIELDS), "affected must count returned rows: {}", sql);
        }
    }
}
