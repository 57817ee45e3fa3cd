use crate::error::Result;
use crate::models::notification::Notification;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// 推送通道连接状态
/// 断连不是错误：通道会自行重连，状态只用于告知消费者
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Reconnecting,
}

/// 内部事件分类：insert/update 携带新记录，delete 携带旧记录
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Created(Notification),
    Updated(Notification),
    Deleted(Notification),
}

impl NotificationEvent {
    pub fn notification(&self) -> &Notification {
        match self {
            NotificationEvent::Created(n)
            | NotificationEvent::Updated(n)
            | NotificationEvent::Deleted(n) => n,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::Created(_) => "insert",
            NotificationEvent::Updated(_) => "update",
            NotificationEvent::Deleted(_) => "delete",
        }
    }
}

/// 服务端过滤器：只投递 recipient_id 匹配的事件
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    pub recipient_id: String,
}

pub type EventCallback = Arc<dyn Fn(NotificationEvent) + Send + Sync>;
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// 推送通道的窄接口，屏蔽具体传输实现
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(
        &self,
        filter: ChangeFilter,
        on_event: EventCallback,
        on_status: StatusCallback,
    ) -> Result<Box<dyn SubscriptionHandle>>;
}

/// 已打开通道的句柄，unsubscribe 必须幂等
#[async_trait]
pub trait SubscriptionHandle: Send + Sync {
    async fn unsubscribe(&self);
}

/// 进程内广播实现
/// 通知写入方发布事件，订阅方按 recipient_id 过滤消费
pub struct LocalChangeFeed {
    events: broadcast::Sender<NotificationEvent>,
    status: watch::Sender<ConnectionStatus>,
}

impl LocalChangeFeed {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        let (status, _) = watch::channel(ConnectionStatus::Connected);
        Self { events, status }
    }

    /// 发布事件，没有订阅者时静默丢弃
    pub fn publish(&self, event: NotificationEvent) {
        let _ = self.events.send(event);
    }

    /// 上游传输状态变化（重连中/已恢复）
    pub fn set_status(&self, status: ConnectionStatus) {
        let _ = self.status.send(status);
    }
}

impl Default for LocalChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeFeed for LocalChangeFeed {
    async fn subscribe(
        &self,
        filter: ChangeFilter,
        on_event: EventCallback,
        on_status: StatusCallback,
    ) -> Result<Box<dyn SubscriptionHandle>> {
        let mut events = self.events.subscribe();
        let mut status = self.status.subscribe();

        // 订阅时立即报告当前状态
        on_status(*status.borrow());

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => {
                        match event {
                            Ok(event) => {
                                if event.notification().recipient_id == filter.recipient_id {
                                    on_event(event);
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!("Change feed consumer lagged, skipped {} events", skipped);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        on_status(*status.borrow());
                    }
                }
            }
        });

        Ok(Box::new(LocalSubscriptionHandle {
            task,
            released: AtomicBool::new(false),
        }))
    }
}

struct LocalSubscriptionHandle {
    task: tokio::task::JoinHandle<()>,
    released: AtomicBool,
}

#[async_trait]
impl SubscriptionHandle for LocalSubscriptionHandle {
    async fn unsubscribe(&self) {
        // 只释放一次
        if !self.released.swap(true, Ordering::SeqCst) {
            self.task.abort();
        }
    }
}

impl Drop for LocalSubscriptionHandle {
    fn drop(&mut self) {
        // 句柄被丢弃时消费任务不能存活
        self.task.abort();
    }
}

/// 实时订阅注册表
/// 每个 (user, consumer) 对保持恰好一条上游通道
pub struct RealtimeService {
    feed: Arc<dyn ChangeFeed>,
    channels: DashMap<(String, String), Box<dyn SubscriptionHandle>>,
}

impl RealtimeService {
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            feed,
            channels: DashMap::new(),
        }
    }

    /// 为一个消费者打开该用户的通知订阅
    /// 同一 (user, consumer) 重复订阅时先释放旧通道
    pub async fn subscribe(
        &self,
        user_id: &str,
        consumer_id: &str,
        on_event: EventCallback,
        on_status: StatusCallback,
    ) -> Result<()> {
        let key = (user_id.to_string(), consumer_id.to_string());

        let handle = self
            .feed
            .subscribe(
                ChangeFilter {
                    recipient_id: user_id.to_string(),
                },
                on_event,
                on_status,
            )
            .await?;

        // 先插入再释放被顶掉的句柄，并发重复订阅也不会漏掉释放
        if let Some(stale) = self.channels.insert(key, handle) {
            debug!("Replacing existing channel for ({}, {})", user_id, consumer_id);
            stale.unsubscribe().await;
        }

        info!("Opened realtime channel for user {} (consumer {})", user_id, consumer_id);

        Ok(())
    }

    /// 幂等解除订阅：重复调用不报错也不留残余条目
    pub async fn unsubscribe(&self, user_id: &str, consumer_id: &str) {
        let key = (user_id.to_string(), consumer_id.to_string());

        if let Some((_, handle)) = self.channels.remove(&key) {
            handle.unsubscribe().await;
            info!("Closed realtime channel for user {} (consumer {})", user_id, consumer_id);
        }
    }

    pub fn active_channels(&self) -> usize {
        self.channels.len()
    }
}

/// 由事件流派生的未读计数器
/// 未读插入 +1，已读翻转 -1，删除未读 -1，不降到负数
#[derive(Debug, Default)]
pub struct UnreadCounter {
    count: AtomicI64,
}

impl UnreadCounter {
    pub fn new(initial: i64) -> Self {
        Self {
            count: AtomicI64::new(initial.max(0)),
        }
    }

    pub fn apply(&self, event: &NotificationEvent) {
        let delta = match event {
            NotificationEvent::Created(n) if !n.is_read => 1,
            // is_read 翻转是通知唯一的更新，带 is_read=true 的更新即读取转换
            NotificationEvent::Updated(n) if n.is_read => -1,
            NotificationEvent::Deleted(n) if !n.is_read => -1,
            _ => 0,
        };

        if delta != 0 {
            let _ = self.count.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some((current + delta).max(0))
            });
        }
    }

    pub fn get(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationType;
    use chrono::Utc;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    fn notification(id: &str, recipient: &str, is_read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            recipient_id: recipient.to_string(),
            sender_id: "sender".to_string(),
            notification_type: NotificationType::Like,
            post_id: Some("post1".to_string()),
            message: NotificationType::Like.message().to_string(),
            is_read,
            created_at: Utc::now(),
        }
    }

    /// 测试用通道：记录订阅与释放，并允许手动触发事件
    struct MockChangeFeed {
        callbacks: Mutex<Vec<(ChangeFilter, EventCallback)>>,
        released: Arc<AtomicI64>,
    }

    impl MockChangeFeed {
        fn new() -> Self {
            Self {
                callbacks: Mutex::new(Vec::new()),
                released: Arc::new(AtomicI64::new(0)),
            }
        }

        fn fire(&self, event: NotificationEvent) {
            for (filter, callback) in self.callbacks.lock().unwrap().iter() {
                if event.notification().recipient_id == filter.recipient_id {
                    callback(event.clone());
                }
            }
        }
    }

    struct MockHandle {
        released: Arc<AtomicI64>,
        fired: AtomicBool,
    }

    #[async_trait]
    impl SubscriptionHandle for MockHandle {
        async fn unsubscribe(&self) {
            if !self.fired.swap(true, Ordering::SeqCst) {
                self.released.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl ChangeFeed for MockChangeFeed {
        async fn subscribe(
            &self,
            filter: ChangeFilter,
            on_event: EventCallback,
            on_status: StatusCallback,
        ) -> Result<Box<dyn SubscriptionHandle>> {
            on_status(ConnectionStatus::Connected);
            self.callbacks.lock().unwrap().push((filter, on_event));
            Ok(Box::new(MockHandle {
                released: self.released.clone(),
                fired: AtomicBool::new(false),
            }))
        }
    }

    #[tokio::test]
    async fn test_event_translation_and_filtering() {
        let feed = Arc::new(MockChangeFeed::new());
        let service = RealtimeService::new(feed.clone());

        let received: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        service
            .subscribe(
                "alice",
                "web",
                Arc::new(move |event| sink.lock().unwrap().push(event.kind())),
                Arc::new(|_| {}),
            )
            .await
            .unwrap();

        feed.fire(NotificationEvent::Created(notification("n1", "alice", false)));
        feed.fire(NotificationEvent::Updated(notification("n1", "alice", true)));
        feed.fire(NotificationEvent::Deleted(notification("n1", "alice", true)));
        // 别人的事件不应投递
        feed.fire(NotificationEvent::Created(notification("n2", "bob", false)));

        assert_eq!(*received.lock().unwrap(), vec!["insert", "update", "delete"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let feed = Arc::new(MockChangeFeed::new());
        let service = RealtimeService::new(feed.clone());

        service
            .subscribe("alice", "web", Arc::new(|_| {}), Arc::new(|_| {}))
            .await
            .unwrap();
        assert_eq!(service.active_channels(), 1);

        service.unsubscribe("alice", "web").await;
        service.unsubscribe("alice", "web").await;

        assert_eq!(service.active_channels(), 0);
        assert_eq!(feed.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_channel() {
        let feed = Arc::new(MockChangeFeed::new());
        let service = RealtimeService::new(feed.clone());

        service
            .subscribe("alice", "web", Arc::new(|_| {}), Arc::new(|_| {}))
            .await
            .unwrap();
        service
            .subscribe("alice", "web", Arc::new(|_| {}), Arc::new(|_| {}))
            .await
            .unwrap();

        // 旧通道被释放，注册表仍然只有一条
        assert_eq!(service.active_channels(), 1);
        assert_eq!(feed.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resubscribe_releases_displaced_channel() {
        let feed = Arc::new(MockChangeFeed::new());
        let service = Arc::new(RealtimeService::new(feed.clone()));

        // 同一 (user, consumer) 的两个并发订阅：无论先后，被顶掉的那条必须被释放
        let first = service.clone();
        let second = service.clone();
        let (a, b) = tokio::join!(
            first.subscribe("alice", "web", Arc::new(|_| {}), Arc::new(|_| {})),
            second.subscribe("alice", "web", Arc::new(|_| {}), Arc::new(|_| {})),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(service.active_channels(), 1);
        assert_eq!(feed.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unread_counter_transitions() {
        let counter = UnreadCounter::new(0);

        counter.apply(&NotificationEvent::Created(notification("n1", "alice", false)));
        counter.apply(&NotificationEvent::Created(notification("n2", "alice", false)));
        assert_eq!(counter.get(), 2);

        // 已读插入不增加
        counter.apply(&NotificationEvent::Created(notification("n3", "alice", true)));
        assert_eq!(counter.get(), 2);

        counter.apply(&NotificationEvent::Updated(notification("n1", "alice", true)));
        assert_eq!(counter.get(), 1);

        counter.apply(&NotificationEvent::Deleted(notification("n2", "alice", false)));
        assert_eq!(counter.get(), 0);

        // 不会降到负数
        counter.apply(&NotificationEvent::Deleted(notification("n4", "alice", false)));
        assert_eq!(counter.get(), 0);
    }

    #[tokio::test]
    async fn test_local_feed_delivers_filtered_events() {
        let feed = LocalChangeFeed::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = feed
            .subscribe(
                ChangeFilter { recipient_id: "alice".to_string() },
                Arc::new(move |event| {
                    let _ = tx.send(event.kind());
                }),
                Arc::new(|_| {}),
            )
            .await
            .unwrap();

        feed.publish(NotificationEvent::Created(notification("n1", "bob", false)));
        feed.publish(NotificationEvent::Created(notification("n2", "alice", false)));

        let kind = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("event should arrive")
            .unwrap();
        assert_eq!(kind, "insert");

        handle.unsubscribe().await;
        handle.unsubscribe().await;
    }
}
