//! Failed-login tracking per client address
//!
//! Failures are counted in a sliding window that lives beyond any single
//! session, so reconnecting does not reset the count. When an address
//! reaches the configured number of failures inside the window the caller
//! is told to lock it out.
//!
//! # Example
//! ```no_run
//! use spool_rs::security::lockout::{LockoutPolicy, LockoutTracker};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let tracker = LockoutTracker::new(LockoutPolicy {
//!     max_attempts: 3,
//!     window: Duration::from_secs(60),
//!     ban: Some(Duration::from_secs(60)),
//! });
//!
//! if tracker.record_failure("192.0.2.1").await {
//!     println!("lock the address out");
//! }
//! # }
//! ```

use crate::config::LockoutConfig;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Lockout thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures inside `window` that trigger a lockout
    pub max_attempts: u32,
    /// Zero keeps failures until the address is reset
    pub window: Duration,
    /// Blacklist duration, `None` is permanent
    pub ban: Option<Duration>,
}

impl From<&LockoutConfig> for LockoutPolicy {
    fn from(config: &LockoutConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            window: Duration::from_secs(config.window_secs),
            ban: (config.ban_secs > 0).then(|| Duration::from_secs(config.ban_secs)),
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from(&LockoutConfig::default())
    }
}

/// Sliding window of failure timestamps
#[derive(Debug, Clone)]
struct FailureWindow {
    failures: Vec<Instant>,
    window: Duration,
}

impl FailureWindow {
    fn new(window: Duration) -> Self {
        Self {
            failures: Vec::new(),
            window,
        }
    }

    /// Record a failure and return the count inside the window
    fn add(&mut self) -> usize {
        self.cleanup();
        self.failures.push(Instant::now());
        self.failures.len()
    }

    /// Remove expired failures
    fn cleanup(&mut self) {
        if self.window.is_zero() {
            return;
        }

        let now = Instant::now();
        self.failures
            .retain(|&t| now.duration_since(t) < self.window);
    }

    fn count(&mut self) -> usize {
        self.cleanup();
        self.failures.len()
    }
}

/// Shared failure counter keyed by client address
pub struct LockoutTracker {
    policy: LockoutPolicy,
    windows: RwLock<HashMap<String, FailureWindow>>,
}

impl LockoutTracker {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Record a failed attempt from `address`
    ///
    /// Returns `true` once the address has reached the failure limit.
    pub async fn record_failure(&self, address: &str) -> bool {
        let mut windows = self.windows.write().await;

        // Drop idle addresses so the map does not grow without bound
        windows.retain(|_, w| w.count() > 0);

        let count = windows
            .entry(address.to_string())
            .or_insert_with(|| FailureWindow::new(self.policy.window))
            .add();

        debug!(
            "{} failed attempts from {} (limit {})",
            count, address, self.policy.max_attempts
        );

        count >= self.policy.max_attempts as usize
    }

    /// Failures from `address` inside the current window
    pub async fn failures(&self, address: &str) -> usize {
        let mut windows = self.windows.write().await;
        windows.get_mut(address).map_or(0, FailureWindow::count)
    }

    /// Forget all failures from `address`
    pub async fn reset(&self, address: &str) {
        self.windows.write().await.remove(address);
        debug!("Reset failure count for {}", address);
    }
}
