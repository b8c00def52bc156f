//! Fixed-backoff reconnection.

use std::time::Duration;

use tracing::warn;

use crate::client::{ConnectOptions, HubClient};
use crate::errors::ClientError;

/// How often and how long to keep trying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Pause between attempts.
    pub delay: Duration,
    /// Total attempts before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_attempts: Some(10),
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Connect, retrying failed attempts according to `policy`.
pub async fn connect_with_retry(
    options: &ConnectOptions,
    policy: &ReconnectPolicy,
) -> Result<HubClient, ClientError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match HubClient::connect(options).await {
            Ok(client) => return Ok(client),
            Err(e @ ClientError::InvalidUrl(_)) => return Err(e),
            Err(e) if policy.allows_retry_after(attempt) => {
                warn!(attempt, error = %e, delay_ms = policy.delay.as_millis() as u64, "hub connection failed, retrying");
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                return Err(ClientError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(e),
                })
            }
        }
    }
}
