//! Admin API Client
//!
//! Main client for the administrative API, combining the endpoint,
//! an optional bearer token and the HTTP transport.

use super::http::ApiHttpClient;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use url::Url;

/// Main administrative API client
///
/// Cloning is cheap; the underlying connection pool is shared. The client
/// carries no per-call state, so one handle serves every concurrent call.
#[derive(Clone)]
pub struct AdminClient {
    pub http: ApiHttpClient,
    endpoint: Url,
    token: Option<String>,
}

impl AdminClient {
    /// Create a new client for `endpoint`
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        let mut endpoint =
            Url::parse(endpoint).with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;

        // Url::join drops the last segment unless the path ends with '/'
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let http = ApiHttpClient::new()?;

        Ok(Self {
            http,
            endpoint,
            token,
        })
    }

    /// The endpoint this client talks to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the URL for `service` / `action`
    pub fn action_url(&self, service: &str, action: &str) -> Result<String> {
        let url = self
            .endpoint
            .join(&format!("{}/{}", service, action))
            .with_context(|| format!("Invalid action path: {}/{}", service, action))?;
        Ok(url.to_string())
    }

    /// Invoke `action` on `service` with a JSON object of parameters
    pub async fn call(&self, service: &str, action: &str, params: &Map<String, Value>) -> Result<Value> {
        tracing::debug!("call: service={}, action={}", service, action);

        let url = self.action_url(service, action)?;
        self.http
            .post(&url, self.token.as_deref(), &Value::Object(params.clone()))
            .await
            .with_context(|| format!("{} failed", action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_url_without_trailing_slash() {
        let client = AdminClient::new("http://localhost:8080/api", None).unwrap();
        assert_eq!(
            client.action_url("iam", "ListUsers").unwrap(),
            "http://localhost:8080/api/iam/ListUsers"
        );
    }

    #[test]
    fn test_action_url_with_trailing_slash() {
        let client = AdminClient::new("http://localhost:8080/", None).unwrap();
        assert_eq!(
            client.action_url("sqs", "ListQueues").unwrap(),
            "http://localhost:8080/sqs/ListQueues"
        );
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        assert!(AdminClient::new("not a url", None).is_err());
    }
}
