//! Per-key sliding-window request counters.

use crate::config::{ProfileSettings, RateLimitConfig};
use crate::error::{Result, SecurityError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Named rate-limit profile, evaluated independently per route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitProfile {
    /// Broad per-key limit for ordinary routes.
    General,
    /// Login attempts; successful logins are un-counted.
    Auth,
    /// Expensive AI-backed routes.
    Inference,
}

impl RateLimitProfile {
    /// Profile name for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Inference => "inference",
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// In-memory rate limiter.
///
/// Counter state is per-process and approximate under concurrent increments
/// from the same key; bounded cost is the goal, not exactness. Windows are
/// evicted by time, either lazily on access or via [`RateLimiter::sweep`].
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<RwLock<HashMap<(RateLimitProfile, String), Window>>>,
}

impl RateLimiter {
    /// Create a rate limiter with the given profile settings.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Settings for a profile.
    #[must_use]
    pub fn settings(&self, profile: RateLimitProfile) -> ProfileSettings {
        match profile {
            RateLimitProfile::General => self.config.general,
            RateLimitProfile::Auth => self.config.auth,
            RateLimitProfile::Inference => self.config.inference,
        }
    }

    /// Count one request from `key` against `profile`.
    ///
    /// Counters never increment past the limit, so a flooded key costs a
    /// bounded amount of state.
    ///
    /// # Errors
    /// Returns [`SecurityError::RateLimited`] with a `retry_after` hint once
    /// the profile's limit is reached inside the current window.
    pub async fn check(&self, profile: RateLimitProfile, key: &str) -> Result<()> {
        let settings = self.settings(profile);
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        let window = windows
            .entry((profile, key.to_string()))
            .or_insert(Window { started: now, count: 0 });

        if now.duration_since(window.started) >= settings.window {
            window.started = now;
            window.count = 0;
        }

        if window.count >= settings.limit {
            return Err(SecurityError::RateLimited {
                retry_after: settings.retry_after_hint(),
            });
        }

        window.count += 1;
        Ok(())
    }

    /// Remove one counted request for `key`, if any.
    ///
    /// The auth profile counts only failed or abandoned login attempts: the
    /// caller counts every attempt up front and un-counts it here once the
    /// login succeeds.
    pub async fn record_success(&self, profile: RateLimitProfile, key: &str) {
        let mut windows = self.windows.write().await;
        if let Some(window) = windows.get_mut(&(profile, key.to_string())) {
            window.count = window.count.saturating_sub(1);
        }
    }

    /// Evict windows whose interval has fully elapsed. Returns the count removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|(profile, _), window| {
            let settings = match profile {
                RateLimitProfile::General => self.config.general,
                RateLimitProfile::Auth => self.config.auth,
                RateLimitProfile::Inference => self.config.inference,
            };
            now.duration_since(window.started) < settings.window
        });
        before - windows.len()
    }

    /// Number of live windows, for diagnostics.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
