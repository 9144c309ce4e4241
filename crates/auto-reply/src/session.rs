//! Per-phone short-hand session cache.
//!
//! A product-listing reply caches the numbered list it showed, so a later
//! "p2" can be resolved against exactly what the customer saw. Staleness
//! is checked on read, and a periodic sweep evicts expired entries so the
//! map stays bounded between reads.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use {dashmap::DashMap, tracing::debug};

use leadline_channels::Product;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct CachedList {
    products: Vec<Product>,
    cached_at: Instant,
}

pub struct SessionCache {
    sessions: DashMap<String, CachedList>,
    ttl: Duration,
}

impl SessionCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn remember(&self, phone: &str, products: Vec<Product>) {
        self.sessions.insert(phone.to_string(), CachedList {
            products,
            cached_at: Instant::now(),
        });
    }

    /// The list this phone last saw, if still fresh. An expired entry is
    /// removed on the spot.
    pub fn recall(&self, phone: &str) -> Option<Vec<Product>> {
        let fresh = self
            .sessions
            .get(phone)
            .map(|entry| entry.cached_at.elapsed() <= self.ttl)?;
        if !fresh {
            self.sessions.remove(phone);
            return None;
        }
        self.sessions.get(phone).map(|entry| entry.products.clone())
    }

    /// Drop every expired entry.
    pub fn sweep(&self) {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| entry.cached_at.elapsed() <= self.ttl);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!(evicted, "swept expired reply sessions");
        }
    }

    /// Spawn the periodic eviction task.
    pub fn spawn_eviction(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep();
            }
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
