use tokio::time::{Duration, Instant};

/// Token bucket with lazy refill: tokens accrue from the time elapsed since
/// the last refill, there is no timer driving it.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u32,
    tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    /// A new bucket starts full.
    pub fn new(capacity: u32, refill_rate: f64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            refill_rate,
            last_refill: now,
        }
    }

    /// Takes one token if one is available. Consumes nothing on failure.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let tokens_to_add = self.refill_rate * elapsed.as_secs_f64();

        self.tokens = (self.tokens + tokens_to_add).min(self.capacity as f64);
        self.last_refill = now;
    }

    /// Time until the next token is available, `None` if one is available now.
    pub fn time_until_available(&mut self, now: Instant) -> Option<Duration> {
        self.refill(now);

        if self.tokens >= 1.0 {
            return None;
        }
        if self.refill_rate <= 0.0 {
            return Some(Duration::MAX);
        }

        let seconds_to_wait = (1.0 - self.tokens) / self.refill_rate;
        Some(Duration::from_secs_f64(seconds_to_wait))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    #[tokio::test(start_paused = true)]
    async fn test_token_consumption() {
        let mut bucket = TokenBucket::new(3, 2.0, Instant::now());
        assert!(bucket.try_acquire(Instant::now()));
        assert!(bucket.try_acquire(Instant::now()));
        assert!(bucket.try_acquire(Instant::now()));
        assert!(!bucket.try_acquire(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_after_one_interval() {
        let mut bucket = TokenBucket::new(1, 2.0, Instant::now());
        assert!(bucket.try_acquire(Instant::now()));
        assert!(!bucket.try_acquire(Instant::now()));
        assert_eq!(
            bucket.time_until_available(Instant::now()),
            Some(Duration::from_millis(500))
        );

        time::advance(Duration::from_millis(500)).await;
        assert_eq!(bucket.time_until_available(Instant::now()), None);
        assert!(bucket.try_acquire(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_overflow_prevention() {
        let mut bucket = TokenBucket::new(5, 1000.0, Instant::now());
        bucket.try_acquire(Instant::now());

        time::advance(Duration::from_secs(10)).await;

        let admitted = (0..10).filter(|_| bucket.try_acquire(Instant::now())).count();
        assert_eq!(admitted, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_rate_never_refills() {
        let mut bucket = TokenBucket::new(1, 0.0, Instant::now());
        assert!(bucket.try_acquire(Instant::now()));

        time::advance(Duration::from_secs(3600)).await;
        assert!(!bucket.try_acquire(Instant::now()));
        assert_eq!(bucket.time_until_available(Instant::now()), Some(Duration::MAX));
    }
}
