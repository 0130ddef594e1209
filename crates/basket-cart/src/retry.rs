//! # Bounded Retry
//!
//! Re-runs a whole cart transaction when it loses a race.
//!
//! ```text
//! attempt 1 ──► Contention ──► sleep(~base)
//! attempt 2 ──► Contention ──► sleep(~base × 2)
//! attempt 3 ──► Contention ──► sleep(~min(base × 4, max))
//! ...
//! attempt max_retries + 1 ──► Contention ──► ConcurrencyConflict { attempts }
//! ```
//!
//! Each sleep is jittered by ±50%. Non-transient errors are returned
//! immediately.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{CartError, CartResult};

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        RetryPolicy {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        RetryPolicy::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Fresh backoff schedule for one `run`.
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            max_interval: self.max_delay,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Runs `operation` until it succeeds, fails permanently, or runs out
    /// of attempts.
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> CartResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CartResult<T>>,
    {
        let attempts = self.max_retries.saturating_add(1);
        let mut backoff = self.backoff();

        for attempt in 1..=attempts {
            match operation().await {
                Err(err) if err.is_transient() => {
                    if attempt == attempts {
                        warn!(operation = name, attempts, error = %err, "Retries exhausted");
                        return Err(CartError::ConcurrencyConflict { attempts });
                    }

                    let delay = backoff.next_backoff().unwrap_or(self.max_delay);
                    warn!(
                        operation = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient cart failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }

        Err(CartError::ConcurrencyConflict { attempts })
    }
}
