//! Typed API errors
//!
//! Most of the crate works with `anyhow::Error`, but readiness polling has to
//! branch on the server's error code and suggested retry delay. Those details
//! travel inside the `anyhow::Error` as an [`ApiError`] and are recovered with
//! `downcast_ref`.

use std::time::Duration;

/// Error returned by the administrative API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-success status
    #[error("API request failed: {status}{}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Status {
        status: u16,
        code: Option<String>,
        message: Option<String>,
        retry_after: Option<Duration>,
    },

    /// The request never produced a response
    #[error("failed to send request")]
    Transport(#[source] reqwest::Error),

    /// The response body was not the JSON we expected
    #[error("failed to parse response JSON")]
    Decode(#[source] serde_json::Error),
}

impl ApiError {
    /// Server error code (e.g. `ReportInProgress`), if any
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Delay suggested by the server through `Retry-After`
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Find an [`ApiError`] anywhere in an error chain
pub fn find_api_error(error: &anyhow::Error) -> Option<&ApiError> {
    error.chain().find_map(|e| e.downcast_ref::<ApiError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_status_display_includes_code() {
        let err = ApiError::Status {
            status: 410,
            code: Some("ReportNotPresent".to_string()),
            message: None,
            retry_after: None,
        };
        assert_eq!(err.to_string(), "API request failed: 410 (ReportNotPresent)");
    }

    #[test]
    fn test_find_api_error_through_context() {
        let result: anyhow::Result<()> = Err(ApiError::Status {
            status: 409,
            code: Some("ReportInProgress".to_string()),
            message: None,
            retry_after: Some(Duration::from_secs(3)),
        })
        .context("Failed to read credential report");

        let err = result.unwrap_err();
        let api = find_api_error(&err).expect("ApiError should be in the chain");
        assert_eq!(api.code(), Some("ReportInProgress"));
        assert_eq!(api.retry_after(), Some(Duration::from_secs(3)));
    }
}
