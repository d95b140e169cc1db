use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tokio::time::{Duration, Instant};

pub const DEFAULT_PURGE_WATERMARK: usize = 1024;

/// Process-local map whose entries carry their own expiry.
///
/// Expired entries are dropped lazily on lookup, by [`TtlCache::purge_expired`],
/// and by `insert` whenever the map reaches the purge watermark. The watermark
/// then moves to twice the surviving size, so the sweep cost is amortized.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, (V, Instant)>>,
    min_watermark: usize,
    purge_at: AtomicUsize,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::with_purge_watermark(DEFAULT_PURGE_WATERMARK)
    }
}

impl<K, V> TtlCache<K, V> {
    pub fn with_purge_watermark(watermark: usize) -> Self {
        let watermark = watermark.max(1);
        Self {
            entries: RwLock::new(HashMap::new()),
            min_watermark: watermark,
            purge_at: AtomicUsize::new(watermark),
        }
    }
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            match entries.get(key) {
                Some((value, expires_at)) if Instant::now() < *expires_at => {
                    return Some(value.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }

        self.entries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(key);
        None
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());

        if entries.len() >= self.purge_at.load(Ordering::Relaxed) {
            entries.retain(|_, (_, expires_at)| now < *expires_at);
            self.purge_at
                .store((entries.len() * 2).max(self.min_watermark), Ordering::Relaxed);
        }

        entries.insert(key, (value, now + ttl));
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(key)
            .map(|(value, _)| value)
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = TtlCache::new();
        cache.insert("ref-1".to_string(), 1, Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get(&"ref-1".to_string()), Some(1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&"ref-1".to_string()), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn per_entry_ttl() {
        let cache = TtlCache::new();
        cache.insert("short", "a", Duration::from_secs(2));
        cache.insert("long", "b", Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get(&"long"), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn insert_reclaims_expired_entries_at_watermark() {
        let cache = TtlCache::with_purge_watermark(8);
        for i in 0..8u32 {
            cache.insert(i, i, Duration::from_secs(5));
        }
        assert_eq!(cache.len(), 8);

        tokio::time::advance(Duration::from_secs(6)).await;
        cache.insert(100, 100, Duration::from_secs(5));
        assert_eq!(cache.len(), 1);

        // Live entries survive and push the next sweep further out.
        for i in 0..15u32 {
            cache.insert(i, i, Duration::from_secs(60));
        }
        assert_eq!(cache.len(), 16);
        assert_eq!(cache.get(&100), Some(100));
    }

    #[tokio::test]
    async fn explicit_removal() {
        let cache = TtlCache::new();
        cache.insert(1u32, "x", Duration::from_secs(60));
        assert_eq!(cache.remove(&1), Some("x"));
        assert_eq!(cache.get(&1), None);
    }
}
