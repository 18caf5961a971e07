//! HTTP utilities for administrative API calls

use super::error::ApiError;
use anyhow::{Context, Result};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Parse a `Retry-After` header given in whole seconds
fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pull `Error.Code` / `Error.Message` out of an error body.
/// Also accepts the flat `{"__type": ..., "message": ...}` shape.
fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };

    let text = |v: Option<&Value>| v.and_then(|v| v.as_str()).map(|s| s.to_string());

    if let Some(error) = value.get("Error") {
        return (
            text(error.get("Code")),
            text(error.get("Message").or_else(|| error.get("message"))),
        );
    }

    let code = text(value.get("__type")).map(|t| {
        // "com.example#ReportInProgress" -> "ReportInProgress"
        t.rsplit('#').next().unwrap_or(&t).to_string()
    });
    (code, text(value.get("message").or_else(|| value.get("Message"))))
}

/// HTTP client wrapper for administrative API calls
#[derive(Clone)]
pub struct ApiHttpClient {
    client: Client,
}

impl ApiHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("iamsnap/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// POST a JSON body and parse the JSON response
    pub async fn post(&self, url: &str, token: Option<&str>, body: &Value) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ApiError::Transport)?;

        let status = response.status();
        let retry_after = parse_retry_after(&response);
        let response_body = response.text().await.map_err(ApiError::Transport)?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            let (code, message) = parse_error_body(&response_body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                code,
                message,
                retry_after,
            }
            .into());
        }

        // Handle empty response
        if response_body.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&response_body).map_err(ApiError::Decode)?)
    }
}

/// Format an API error for display
/// Sanitizes error messages to avoid leaking API details
pub fn format_api_error(error: &anyhow::Error) -> String {
    if let Some(api) = super::error::find_api_error(error) {
        match api.status() {
            Some(401) => return "Authentication failed. Check IAMSNAP_TOKEN.".to_string(),
            Some(403) => return "Permission denied. Check the account's IAM permissions.".to_string(),
            Some(404) => return "Resource not found.".to_string(),
            Some(429) => return "Rate limit exceeded. Please try again later.".to_string(),
            Some(400) => {
                return match api.code() {
                    Some(code) => format!("Invalid request ({code})."),
                    None => "Invalid request. Check your parameters.".to_string(),
                };
            }
            Some(s) if s >= 500 => {
                return "Service temporarily unavailable. Please try again.".to_string();
            }
            Some(_) => {
                if let Some(code) = api.code() {
                    return format!("Request failed ({code}).");
                }
            }
            None => {
                return "Request failed. Check your network connection and try again.".to_string();
            }
        }
    }

    // Truncate long error messages and remove potential sensitive data
    let error_str = format!("{:#}", error);
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(160)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(out.contains("500 bytes total"));
    }

    #[test]
    fn test_parse_error_body_nested() {
        let (code, message) =
            parse_error_body(r#"{"Error":{"Code":"ReportInProgress","Message":"wait"}}"#);
        assert_eq!(code.as_deref(), Some("ReportInProgress"));
        assert_eq!(message.as_deref(), Some("wait"));
    }

    #[test]
    fn test_parse_error_body_flat_type() {
        let (code, _) = parse_error_body(r#"{"__type":"com.example#NoSuchEntity","message":"x"}"#);
        assert_eq!(code.as_deref(), Some("NoSuchEntity"));
    }

    #[test]
    fn test_parse_error_body_not_json() {
        assert_eq!(parse_error_body("<html>"), (None, None));
    }

    #[test]
    fn test_format_api_error_permission_denied() {
        let err: anyhow::Error = ApiError::Status {
            status: 403,
            code: Some("AccessDenied".to_string()),
            message: None,
            retry_after: None,
        }
        .into();
        assert_eq!(
            format_api_error(&err),
            "Permission denied. Check the account's IAM permissions."
        );
    }

    #[test]
    fn test_format_api_error_plain_message() {
        let err = anyhow::anyhow!("credential report format mismatch");
        assert_eq!(format_api_error(&err), "credential report format mismatch");
    }
}
