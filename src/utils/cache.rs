use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 时钟抽象，测试中可注入假时钟
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// 系统时钟
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// 缓存项
#[derive(Debug, Clone)]
struct CacheItem<T> {
    value: T,
    expires_at: u64,
}

/// 简单的内存TTL缓存
/// 单进程内有效，不提供跨进程一致性
#[derive(Clone)]
pub struct Cache<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<String, CacheItem<T>>>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone + Send + Sync + 'static> Cache<T> {
    /// 创建新的缓存实例（系统时钟）
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    /// 使用指定时钟创建缓存实例
    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
            clock,
        }
    }

    /// 设置缓存项
    pub fn set(&self, key: String, value: T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// 设置带有自定义TTL的缓存项
    pub fn set_with_ttl(&self, key: String, value: T, ttl: Duration) {
        let item = CacheItem {
            value,
            expires_at: self.clock.now_secs() + ttl.as_secs(),
        };

        self.data.write().insert(key, item);
    }

    /// 获取缓存项，过期视为不存在
    pub fn get(&self, key: &str) -> Option<T> {
        let data = self.data.read();
        let item = data.get(key)?;

        if item.expires_at > self.clock.now_secs() {
            Some(item.value.clone())
        } else {
            None
        }
    }

    /// 删除缓存项
    pub fn remove(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// 按键前缀批量失效，返回删除的条目数
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|key, _| !key.starts_with(prefix));
        before - data.len()
    }

    /// 获取缓存大小（含未清理的过期项）
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// 清理过期项，返回删除的条目数
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_secs();
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, item| item.expires_at > now);
        before - data.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// 测试用假时钟
    #[derive(Debug, Default)]
    pub struct FakeClock {
        now: AtomicU64,
    }

    impl FakeClock {
        pub fn advance(&self, secs: u64) {
            self.now.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now_secs(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache: Cache<String> = Cache::new(Duration::from_secs(60));

        cache.set("key1".to_string(), "value1".to_string());
        assert_eq!(cache.get("key1"), Some("value1".to_string()));

        assert_eq!(cache.get("nonexistent"), None);

        assert!(cache.remove("key1"));
        assert!(!cache.remove("key1"));
        assert_eq!(cache.get("key1"), None);
    }

    #[test]
    fn test_cache_expiration_with_fake_clock() {
        let clock = Arc::new(FakeClock::default());
        let cache: Cache<i64> = Cache::with_clock(Duration::from_secs(300), clock.clone());

        cache.set("feed:u1:personalized:1:20".to_string(), 42);
        assert_eq!(cache.get("feed:u1:personalized:1:20"), Some(42));

        // 5分钟TTL边界：299秒仍然有效，301秒过期
        clock.advance(299);
        assert_eq!(cache.get("feed:u1:personalized:1:20"), Some(42));

        clock.advance(2);
        assert_eq!(cache.get("feed:u1:personalized:1:20"), None);

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_prefix_by_user() {
        let cache: Cache<i64> = Cache::new(Duration::from_secs(300));

        cache.set("feed:u1:personalized:1:20".to_string(), 1);
        cache.set("feed:u1:personalized:2:20".to_string(), 2);
        cache.set("feed:u2:personalized:1:20".to_string(), 3);

        let removed = cache.invalidate_prefix("feed:u1:");
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("feed:u1:personalized:1:20"), None);
        assert_eq!(cache.get("feed:u2:personalized:1:20"), Some(3));
    }

    #[test]
    fn test_invalidate_prefix_ignores_inner_segments() {
        let cache: Cache<i64> = Cache::new(Duration::from_secs(300));

        // 用户ID为数字时不能命中其他键的页码段
        cache.set("feed:2:public:1:20".to_string(), 1);
        cache.set("feed:u1:personalized:2:20".to_string(), 2);

        let removed = cache.invalidate_prefix("feed:2:");
        assert_eq!(removed, 1);
        assert_eq!(cache.get("feed:2:public:1:20"), None);
        assert_eq!(cache.get("feed:u1:personalized:2:20"), Some(2));
    }
}
