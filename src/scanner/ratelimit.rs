use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Consecutive 429/503 responses before the target enters backoff.
    pub threshold: u32,
    /// Minimum delay inserted before each dispatch while backed off.
    pub backoff: Duration,
    /// Consecutive clean responses required to leave backoff.
    pub recovery: u32,
    /// Bounded retry budget shared by baseline capture.
    pub retry_budget: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            backoff: Duration::from_secs(2),
            recovery: 5,
            retry_budget: 3,
        }
    }
}

/// Per-target rate-limit state. An explicit context object handed to
/// workers; targets never share one.
pub struct RateLimiter {
    config: RateLimitConfig,
    consecutive_limited: AtomicU32,
    clean_streak: AtomicU32,
    backed_off: AtomicBool,
    retries_left: AtomicU32,
    budget_exhausted: AtomicBool,
    retry_after: StdMutex<Option<Duration>>,
    /// Serializes dispatch while backed off; uncontended otherwise.
    gate: Mutex<()>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let retries = config.retry_budget;
        Self {
            config,
            consecutive_limited: AtomicU32::new(0),
            clean_streak: AtomicU32::new(0),
            backed_off: AtomicBool::new(false),
            retries_left: AtomicU32::new(retries),
            budget_exhausted: AtomicBool::new(false),
            retry_after: StdMutex::new(None),
            gate: Mutex::new(()),
        }
    }

    /// Feed one observed response status (and any `Retry-After` hint) into
    /// the rolling state.
    pub fn observe(&self, status: u16, retry_after: Option<Duration>) {
        if let Some(hint) = retry_after {
            *self.retry_after.lock().expect("retry_after mutex poisoned") = Some(hint);
        }

        if matches!(status, 429 | 503) {
            self.clean_streak.store(0, Ordering::Relaxed);
            let seen = self.consecutive_limited.fetch_add(1, Ordering::Relaxed) + 1;
            if seen >= self.config.threshold && !self.backed_off.swap(true, Ordering::Relaxed) {
                warn!(consecutive = seen, "target is rate limiting, entering backoff");
            }
        } else {
            self.consecutive_limited.store(0, Ordering::Relaxed);
            if self.backed_off.load(Ordering::Relaxed) {
                let clean = self.clean_streak.fetch_add(1, Ordering::Relaxed) + 1;
                if clean >= self.config.recovery {
                    self.backed_off.store(false, Ordering::Relaxed);
                    self.clean_streak.store(0, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn is_backed_off(&self) -> bool {
        self.backed_off.load(Ordering::Relaxed)
    }

    /// Gate one dispatch. While backed off this serializes callers and
    /// sleeps at least the configured interval (or the server's
    /// `Retry-After`, whichever is longer). Returns whether the caller was
    /// throttled, so the result can be flagged.
    pub async fn admit(&self) -> bool {
        if !self.is_backed_off() {
            return false;
        }
        let _serialized = self.gate.lock().await;
        tokio::time::sleep(self.current_delay()).await;
        true
    }

    fn current_delay(&self) -> Duration {
        let hint = *self.retry_after.lock().expect("retry_after mutex poisoned");
        match hint {
            Some(h) if h > self.config.backoff => h,
            _ => self.config.backoff,
        }
    }

    /// Consume one retry from the bounded budget. Returns false once the
    /// budget is gone, which marks the session PartiallyScanned.
    pub fn try_consume_retry(&self) -> bool {
        let mut left = self.retries_left.load(Ordering::Relaxed);
        loop {
            if left == 0 {
                self.budget_exhausted.store(true, Ordering::Relaxed);
                return false;
            }
            match self.retries_left.compare_exchange_weak(
                left,
                left - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => left = actual,
            }
        }
    }

    pub fn budget_exhausted(&self) -> bool {
        self.budget_exhausted.load(Ordering::Relaxed)
    }
}

/// Parse a `Retry-After` header value. Only the delta-seconds form is
/// honored; HTTP-date values are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
