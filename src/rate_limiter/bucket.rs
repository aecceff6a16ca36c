//! Token bucket for steady-state throughput.

use tokio::time::Instant;

/// Token bucket with fractional accumulation.
///
/// Tokens refill continuously at `rate` per second and never exceed
/// `capacity`. Fractions accumulate internally; `available()` reports the
/// whole tokens only.
#[derive(Debug)]
pub(crate) struct TokenBucket {
    tokens: f64,
    capacity: f64,
    rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket.
    pub fn new(capacity: u32, rate: f64, now: Instant) -> Self {
        TokenBucket {
            tokens: f64::from(capacity),
            capacity: f64::from(capacity),
            rate,
            last_refill: now,
        }
    }

    /// Adds tokens for the time elapsed since the last refill.
    ///
    /// Returns `true` if at least one whole token is available afterwards.
    pub fn refill(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity);
        self.last_refill = now;
        self.tokens >= 1.0
    }

    /// Takes one token if a whole one is available.
    pub fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available.
    pub fn available(&self) -> u32 {
        // Safe cast: tokens is clamped to [0, capacity] and capacity came from a u32
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            self.tokens.floor() as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_bucket_starts_full() {
        let bucket = TokenBucket::new(5, 2.0, Instant::now());
        assert_eq!(bucket.available(), 5);
    }

    #[test]
    fn test_consume_until_empty_never_negative() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(3, 1.0, now);
        for _ in 0..3 {
            assert!(bucket.try_consume());
        }
        for _ in 0..10 {
            assert!(!bucket.try_consume());
        }
        assert_eq!(bucket.available(), 0);
        assert!(bucket.tokens >= 0.0);
    }

    #[test]
    fn test_refill_proportional_to_elapsed_time() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(10, 4.0, start);
        for _ in 0..10 {
            bucket.try_consume();
        }
        // 4 tokens/s for 500ms = 2 tokens
        assert!(bucket.refill(start + Duration::from_millis(500)));
        assert_eq!(bucket.available(), 2);
    }

    #[test]
    fn test_fractional_tokens_accumulate() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(1, 2.0, start);
        assert!(bucket.try_consume());

        // 2 tokens/s, 100ms ticks: 0.2 per tick
        for tick in 1..5 {
            assert!(!bucket.refill(start + Duration::from_millis(100 * tick)));
            assert_eq!(bucket.available(), 0);
        }
        assert!(bucket.refill(start + Duration::from_millis(600)));
        assert_eq!(bucket.available(), 1);
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(3, 100.0, start);
        bucket.try_consume();
        bucket.refill(start + Duration::from_secs(60));
        assert_eq!(bucket.available(), 3);
        assert!(bucket.tokens <= 3.0);
    }
}
