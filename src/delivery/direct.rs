//! Synchronous send path used when the queue is bypassed.
//!
//! The hook process blocks until Telegram acknowledges the message or the
//! long retry budget runs out. Nothing is persisted.

use std::time::Duration;

use tracing::{error, info};

use super::{send_with_retry, DeliveryClient, DeliveryError, RetryPolicy};

/// Retry budget for direct sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectPolicy {
    /// Total attempts.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for DirectPolicy {
    fn default() -> Self {
        Self {
            attempts: 120,
            delay: Duration::from_secs(30),
        }
    }
}

impl From<DirectPolicy> for RetryPolicy {
    fn from(policy: DirectPolicy) -> Self {
        RetryPolicy::new(policy.attempts, policy.delay)
    }
}

/// Deliver one message, retrying per `policy`.
///
/// # Errors
///
/// [`DeliveryError::Exhausted`] when every attempt failed.
pub async fn send_direct<C>(
    client: &C,
    number: &str,
    text: &str,
    policy: DirectPolicy,
) -> Result<u32, DeliveryError>
where
    C: DeliveryClient + ?Sized,
{
    match send_with_retry(client, number, text, &policy.into()).await {
        Ok(attempts) => {
            info!(attempts, "message delivered");
            Ok(attempts)
        }
        Err(e) => {
            error!(error = %e, "giving up on direct delivery");
            Err(e)
        }
    }
}
