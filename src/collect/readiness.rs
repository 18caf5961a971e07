//! Readiness Poller
//!
//! Some resources are generated on demand by the server: reading them fails
//! until generation has been requested and has finished. The poller drives
//! that state machine client-side:
//!
//! - absent: trigger generation, wait the settle delay, read again
//! - in progress: wait the server's suggested delay (or the default), read again
//! - ready: check the declared content type and return the payload
//! - anything else: fatal, returned as-is
//!
//! Waits are `tokio::time::sleep`, so they only suspend the poll sequence
//! that issued them.

use crate::api::error::find_api_error;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Classified result of reading an on-demand resource
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    Ready { content_type: String, payload: T },
    Absent,
    InProgress { retry_after: Option<Duration> },
}

/// A server-generated resource: a read operation plus a generation trigger
#[async_trait]
pub trait OnDemand: Send + Sync {
    type Payload: Send;

    /// Read the resource. Readiness conditions come back as `Ok(Absent)` or
    /// `Ok(InProgress)`; every other failure is an `Err`.
    async fn read(&self) -> Result<ReadOutcome<Self::Payload>>;

    /// Ask the server to (re)generate the resource
    async fn generate(&self) -> Result<()>;
}

/// Fatal readiness failures
#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    #[error("unexpected content type: expected {expected}, got {actual}")]
    ContentType { expected: String, actual: String },

    #[error("resource still not ready after {polls} read(s)")]
    Exhausted { polls: u32 },
}

/// Error codes that mean "not there yet" rather than "broken"
#[derive(Debug, Clone, Default)]
pub struct ReadinessCodes {
    pub absent: Vec<String>,
    pub in_progress: Vec<String>,
}

impl ReadinessCodes {
    /// Map a read error onto a readiness outcome, or hand it back if it is
    /// not a readiness condition
    pub fn classify<T>(&self, error: anyhow::Error) -> Result<ReadOutcome<T>> {
        let Some(api) = find_api_error(&error) else {
            return Err(error);
        };
        let Some(code) = api.code() else {
            return Err(error);
        };

        if self.absent.iter().any(|c| c == code) {
            return Ok(ReadOutcome::Absent);
        }
        if self.in_progress.iter().any(|c| c == code) {
            return Ok(ReadOutcome::InProgress {
                retry_after: api.retry_after(),
            });
        }
        Err(error)
    }
}

/// Timing for the poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait after triggering generation
    pub settle_delay: Duration,
    /// Wait when the server is generating and suggests no delay
    pub retry_delay: Duration,
    /// Upper bound on reads; `None` polls forever
    pub max_polls: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            retry_delay: Duration::from_secs(2),
            max_polls: Some(60),
        }
    }
}

/// Drives an [`OnDemand`] resource until it is ready
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    config: PollConfig,
    expected_content_type: String,
}

impl ReadinessPoller {
    pub fn new(config: PollConfig, expected_content_type: impl Into<String>) -> Self {
        Self {
            config,
            expected_content_type: expected_content_type.into(),
        }
    }

    /// Read `resource` until it is ready, generating it if needed
    pub async fn obtain<R: OnDemand + ?Sized>(&self, resource: &R) -> Result<R::Payload> {
        let mut polls = 0u32;

        loop {
            if let Some(max) = self.config.max_polls {
                if polls >= max {
                    return Err(ReadinessError::Exhausted { polls }.into());
                }
            }
            polls += 1;

            match resource.read().await? {
                ReadOutcome::Ready {
                    content_type,
                    payload,
                } => {
                    if content_type != self.expected_content_type {
                        return Err(ReadinessError::ContentType {
                            expected: self.expected_content_type.clone(),
                            actual: content_type,
                        }
                        .into());
                    }
                    tracing::debug!("resource ready after {} read(s)", polls);
                    return Ok(payload);
                }
                ReadOutcome::Absent => {
                    tracing::info!("resource not present, requesting generation");
                    resource.generate().await?;
                    tokio::time::sleep(self.config.settle_delay).await;
                }
                ReadOutcome::InProgress { retry_after } => {
                    let delay = retry_after.unwrap_or(self.config.retry_delay);
                    tracing::debug!("resource generating, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
