//! # Reconnect Policy
//!
//! Delay schedule for re-establishing broker and legacy socket connections.
//!
//! The default is a fixed 5 second delay with no attempt limit: the service
//! keeps trying until the peer comes back. Deployments running several
//! instances can switch to capped exponential backoff with jitter and an
//! attempt budget so reconnect storms spread out.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::DEFAULT_RECONNECT_DELAY;

/// Reconnect schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay after the first failed attempt
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
    /// Growth factor per attempt; 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,
    /// Random extra delay as a fraction of the computed delay (0.0 - 1.0)
    pub jitter_factor: f64,
    /// Give up after this many attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    /// Fixed delay, unlimited attempts
    pub fn fixed(delay: Duration) -> Self {
        let delay_ms = delay.as_millis() as u64;
        Self {
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts: None,
        }
    }

    /// Doubling delay capped at `max`, with 10% jitter
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial_delay_ms: initial.as_millis() as u64,
            max_delay_ms: max.as_millis() as u64,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: None,
        }
    }

    /// Limit the number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Whether attempt number `attempt` (1-based) may run
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let max_ms = self.max_delay_ms.max(self.initial_delay_ms) as f64;
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let growth = self.backoff_multiplier.max(1.0).powi(exponent);
        let mut delay_ms = (self.initial_delay_ms as f64 * growth).min(max_ms);

        if self.jitter_factor > 0.0 {
            let jitter = fastrand::f64() * self.jitter_factor.min(1.0);
            delay_ms = (delay_ms * (1.0 + jitter)).min(max_ms);
        }

        // NaN or infinity from a hand-built policy falls back to the cap
        if !delay_ms.is_finite() {
            delay_ms = max_ms;
        }
        Duration::from_millis(delay_ms as u64)
    }

    /// Validate policy values
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay_ms == 0 {
            return Err("initial_delay_ms must be greater than 0".to_string());
        }
        if !self.backoff_multiplier.is_finite() {
            return Err("backoff_multiplier must be a finite number".to_string());
        }
        if self.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be at least 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("jitter_factor must be between 0.0 and 1.0".to_string());
        }
        if self.max_attempts == Some(0) {
            return Err("max_attempts must be greater than 0 when set".to_string());
        }
        Ok(())
    }
}

/// Every allowed attempt failed
#[derive(Debug)]
pub struct ReconnectExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `connect` until it succeeds or the policy gives up
///
/// `connect` receives the 1-based attempt number. Failures are logged with
/// the component name; the caller never sees intermediate errors.
pub async fn reconnect_with<T, E, F, Fut>(
    policy: &ReconnectPolicy,
    component: &str,
    mut connect: F,
) -> Result<T, ReconnectExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 1;
    loop {
        match connect(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(component = %component, attempt, "🔌 Reconnected");
                }
                return Ok(value);
            }
            Err(error) => {
                if !policy.allows_attempt(attempt + 1) {
                    warn!(
                        component = %component,
                        attempts = attempt,
                        error = %error,
                        "🔌 Giving up on connection"
                    );
                    return Err(ReconnectExhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    component = %component,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "🔌 Connection attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
