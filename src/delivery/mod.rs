//! Outbound delivery: the [`DeliveryClient`] seam, the Telegram client and
//! bounded fixed-delay retry.

pub mod direct;
pub mod format;
pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub use direct::{send_direct, DirectPolicy};
pub use telegram::{TelegramClient, TelegramConfig};

/// Sends one message to the downstream service.
///
/// `send` must be safe to call again after a failure and must return
/// within the client's own timeout.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Deliver `text` from `number`. `Ok` means the service acknowledged it.
    async fn send(&self, number: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Delivery failures.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Request could not be completed (connect, timeout, body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("API returned {status}: {description}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error description from the response body, if any.
        description: String,
    },
    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Every attempt allowed by the retry policy failed.
    #[error("delivery failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: Box<DeliveryError>,
    },
}

/// Fixed-delay retry bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Policy allowing `max_attempts` tries (at least one) with `delay`
    /// between consecutive tries.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(5))
    }
}

/// Call `client.send` until it succeeds or the policy is exhausted.
///
/// Sleeps `policy.delay()` between attempts, never after the last one.
/// Returns the number of attempts used.
///
/// # Errors
///
/// [`DeliveryError::Exhausted`] wrapping the last failure.
pub async fn send_with_retry<C>(
    client: &C,
    number: &str,
    text: &str,
    policy: &RetryPolicy,
) -> Result<u32, DeliveryError>
where
    C: DeliveryClient + ?Sized,
{
    let max_attempts = policy.max_attempts();
    let mut attempt: u32 = 1;
    loop {
        match client.send(number, text).await {
            Ok(()) => {
                debug!(attempt, "delivery acknowledged");
                return Ok(attempt);
            }
            Err(e) if attempt >= max_attempts => {
                return Err(DeliveryError::Exhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "delivery attempt failed, retrying");
            }
        }
        tokio::time::sleep(policy.delay()).await;
        attempt = attempt.saturating_add(1);
    }
}
