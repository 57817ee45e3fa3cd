use crate::{
    error::Result,
    services::auth::User,
    services::realtime::{ConnectionStatus, NotificationEvent},
    state::AppState,
};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(notifications_ws))
}

/// 通知实时推送通道
/// GET /api/social/realtime/ws（带 Authorization 头升级）
async fn notifications_ws(
    State(state): State<Arc<AppState>>,
    user: User,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse> {
    Ok(ws.on_upgrade(move |socket| handle_socket(state, user, socket)))
}

async fn handle_socket(state: Arc<AppState>, user: User, socket: WebSocket) {
    // 每条 WebSocket 连接都是独立消费者，互不挤占
    let consumer_id = Uuid::new_v4().to_string();
    info!("WebSocket opened for user {} (consumer {})", user.id, consumer_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let event_tx = tx.clone();
    let status_tx = tx;

    let subscribed = state
        .realtime_service
        .subscribe(
            &user.id,
            &consumer_id,
            Arc::new(move |event| {
                let _ = event_tx.send(event_frame(&event));
            }),
            Arc::new(move |status| {
                let _ = status_tx.send(status_frame(status));
            }),
        )
        .await;

    if let Err(e) = subscribed {
        warn!("Failed to open realtime channel for user {}: {}", user.id, e);
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(frame) => {
                        if sender.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // 通道释放是幂等的，断连和显式关闭都走这里
    state.realtime_service.unsubscribe(&user.id, &consumer_id).await;
    debug!("WebSocket closed for user {} (consumer {})", user.id, consumer_id);
}

fn event_frame(event: &NotificationEvent) -> String {
    json!({
        "type": "notification",
        "action": event.kind(),
        "data": event.notification(),
    })
    .to_string()
}

fn status_frame(status: ConnectionStatus) -> String {
    json!({
        "type": "status",
        "state": status,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::{Notification, NotificationType};
    use chrono::Utc;

    #[test]
    fn test_frame_shapes() {
        let notification = Notification {
            id: "n1".to_string(),
            recipient_id: "alice".to_string(),
            sender_id: "bob".to_string(),
            notification_type: NotificationType::Follow,
            post_id: None,
            message: NotificationType::Follow.message().to_string(),
            is_read: false,
            created_at: Utc::now(),
        };

        let frame: serde_json::Value =
            serde_json::from_str(&event_frame(&NotificationEvent::Created(notification))).unwrap();
        assert_eq!(frame["type"], "notification");
        assert_eq!(frame["action"], "insert");
        assert_eq!(frame["data"]["message"], "started following you");

        let frame: serde_json::Value =
            serde_json::from_str(&status_frame(ConnectionStatus::Reconnecting)).unwrap();
        assert_eq!(frame["type"], "status");
        assert_eq!(frame["state"], "reconnecting");
    }
}
