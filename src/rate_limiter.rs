use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::debug;

use crate::token_bucket::TokenBucket;

/// Longest accepted sweep interval.
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(86_400);

/// Settings for [`ClientLimiter`], fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    /// Tokens added per second.
    pub rate: f64,
    /// Bucket capacity.
    pub burst: u32,
    /// When false every request is admitted and no state is kept.
    pub enabled: bool,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
    /// Records idle for longer than `sweep_interval * staleness_multiplier` are evicted.
    pub staleness_multiplier: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            rate: 2.0,
            burst: 4,
            enabled: true,
            sweep_interval: Duration::from_secs(60),
            staleness_multiplier: 3,
        }
    }
}

impl LimiterConfig {
    pub fn staleness_threshold(&self) -> Duration {
        self.sweep_interval
            .checked_mul(self.staleness_multiplier)
            .unwrap_or(Duration::MAX)
    }
}

/// Per-client state
#[derive(Debug)]
struct ClientRecord {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Per-client token bucket rate limiter keyed by client identity
/// (normally the peer IP address).
///
/// Every lookup, refill and eviction happens under one mutex that is held
/// only for the bookkeeping itself, so concurrent requests from the same
/// client see a serialized view of their bucket.
#[derive(Debug)]
pub struct ClientLimiter {
    config: LimiterConfig,
    clients: Mutex<HashMap<String, ClientRecord>>,
}

impl ClientLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Returns true and consumes a token if `identity` has one available.
    pub fn admit(&self, identity: &str) -> bool {
        self.check(identity).is_ok()
    }

    /// Like [`admit`](Self::admit), but a denial carries the time until the
    /// client's next token.
    pub fn check(&self, identity: &str) -> Result<(), Duration> {
        if !self.config.enabled {
            return Ok(());
        }

        let now = Instant::now();
        let mut clients = self.lock_clients();

        let record = clients
            .entry(identity.to_string())
            .or_insert_with(|| ClientRecord {
                bucket: TokenBucket::new(self.config.burst, self.config.rate, now),
                last_seen: now,
            });

        record.last_seen = now;
        if record.bucket.try_acquire(now) {
            Ok(())
        } else {
            Err(record.bucket.time_until_available(now).unwrap_or_default())
        }
    }

    /// Evicts every record idle for longer than the staleness threshold.
    /// Returns the number of evicted records.
    pub fn sweep(&self) -> usize {
        let threshold = self.config.staleness_threshold();
        let now = Instant::now();
        let mut clients = self.lock_clients();

        let initial_count = clients.len();
        clients.retain(|_, record| now.saturating_duration_since(record.last_seen) <= threshold);

        initial_count - clients.len()
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.lock_clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts the background sweep loop. The loop ends on its own once the
    /// limiter is dropped; abort the handle to stop it earlier.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        let interval = self
            .config
            .sweep_interval
            .clamp(Duration::from_millis(1), MAX_SWEEP_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let evicted = limiter.sweep();
                if evicted > 0 {
                    debug!(evicted, remaining = limiter.len(), "Swept stale rate limit clients");
                }
            }
        })
    }

    // A panic while the lock was held cannot leave a record half-written,
    // so a poisoned table is still usable.
    fn lock_clients(&self) -> MutexGuard<'_, HashMap<String, ClientRecord>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
