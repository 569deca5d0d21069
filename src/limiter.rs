use crate::error::PreviewError;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// Admission control injected by the enclosing server, keyed by caller
/// identity. Kept out of the core pipeline so the pipeline stays testable
/// without a clock.
pub trait RateLimiter: Send + Sync {
    fn check(&self, caller: &str) -> Result<(), PreviewError>;
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter per caller.
pub struct FixedWindowLimiter {
    config: RateLimiterConfig,
    windows: DashMap<String, Window>,
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, caller: &str) -> Result<(), PreviewError> {
        let now = Instant::now();
        let mut window = self.windows.entry(caller.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.config.window {
            window.started = now;
            window.count = 0;
        }

        window.count += 1;
        if window.count > self.config.max_requests {
            warn!(caller = %caller, "Rate limit window exhausted");
            return Err(PreviewError::RateLimitExceeded(caller.to_string()));
        }
        Ok(())
    }
}
