use crate::models::profile::ProfileSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 通知类型，只有三种动作会产生通知
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Follow,
    Like,
    Comment,
}

impl NotificationType {
    /// 每种类型的固定文案
    pub fn message(&self) -> &'static str {
        match self {
            NotificationType::Follow => "started following you",
            NotificationType::Like => "liked your post",
            NotificationType::Comment => "commented on your post",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Follow => "follow",
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
        }
    }
}

/// 通知记录
/// 只由关注/点赞/评论动作产生，唯一的更新是翻转 is_read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: String,
    pub notification_type: NotificationType,
    pub post_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// 创建通知的内部请求（非对外接口）
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub recipient_id: String,
    pub sender_id: String,
    pub notification_type: NotificationType,
    pub post_id: Option<String>,
}

/// 通知列表项，带发送者摘要与帖子预览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: String,
    pub notification_type: NotificationType,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<ProfileSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<PostPreview>,
}

/// 嵌入通知的帖子预览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPreview {
    pub id: String,
    pub content: String,
}

/// 通知统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total: i64,
    pub unread: i64,
    pub read: i64,
    pub by_type: NotificationTypeBreakdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationTypeBreakdown {
    pub follow: i64,
    pub like: i64,
    pub comment: i64,
}

/// 列表查询参数
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub unread_only: bool,
}

/// 通知批量操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    MarkAllRead,
    MarkRead,
    DeleteAll,
    Delete,
}

/// 批量操作请求：mark_read/delete 需要 ids
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationActionRequest {
    pub action: NotificationAction,
    pub ids: Option<Vec<String>>,
}

/// 批量操作结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMutationResponse {
    pub message: String,
    pub affected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_templates() {
        assert_eq!(NotificationType::Follow.message(), "started following you");
        assert_eq!(NotificationType::Like.message(), "liked your post");
        assert_eq!(NotificationType::Comment.message(), "commented on your post");
    }

    #[test]
    fn test_action_wire_format() {
        let req: NotificationActionRequest =
            serde_json::from_str(r#"{"action":"mark_all_read"}"#).unwrap();
        assert_eq!(req.action, NotificationAction::MarkAllRead);
        assert!(req.ids.is_none());

        let req: NotificationActionRequest =
            serde_json::from_str(r#"{"action":"mark_read","ids":["a","b"]}"#).unwrap();
        assert_eq!(req.action, NotificationAction::MarkRead);
        assert_eq!(req.ids.unwrap().len(), 2);
    }

    #[test]
    fn test_type_wire_format() {
        assert_eq!(
            serde_json::to_string(&NotificationType::Follow).unwrap(),
            r#""follow""#
        );
        let t: NotificationType = serde_json::from_str(r#""comment""#).unwrap();
        assert_eq!(t, NotificationType::Comment);

        // as_str 必须与 serde 表示一致，统计查询按裸字符串分组
        for t in [
            NotificationType::Follow,
            NotificationType::Like,
            NotificationType::Comment,
        ] {
            assert_eq!(
                serde_json::to_string(&t).unwrap(),
                format!("\"{}\"", t.as_str())
            );
        }
    }
}
