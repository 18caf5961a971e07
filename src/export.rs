//! Export orchestration
//!
//! Runs every selected resource collection concurrently, hands each finished
//! result to the sink and records the outcome in a manifest. Each resource is
//! its own failure domain: one failing collection never stops the others.

use crate::api::http::format_api_error;
use crate::resource::Fetcher;
use crate::sink::Sink;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use uuid::Uuid;

/// Key under which the manifest is written
pub const MANIFEST_KEY: &str = "manifest";

/// Outcome of one resource collection
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok { items: usize },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatus {
    pub resource: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub elapsed_ms: u128,
}

/// Summary of one export run
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub run_id: String,
    pub endpoint: String,
    pub started_at: String,
    pub finished_at: String,
    pub resources: Vec<ResourceStatus>,
}

impl Manifest {
    pub fn failures(&self) -> impl Iterator<Item = &ResourceStatus> {
        self.resources
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Error { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Number of exported items in a collected value
pub fn count_items(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) if map.values().all(|v| v.is_array()) && !map.is_empty() => map
            .values()
            .filter_map(|v| v.as_array())
            .map(|a| a.len())
            .sum(),
        _ => 1,
    }
}

async fn export_one<S: Sink + ?Sized>(fetcher: &Fetcher, sink: &S, resource: &str) -> ResourceStatus {
    let started = Instant::now();

    let result: Result<usize> = async {
        let value = fetcher.fetch(resource).await?;
        sink.write(resource, &value)
            .await
            .with_context(|| format!("Failed to store {}", resource))?;
        Ok(count_items(&value))
    }
    .await;

    let outcome = match result {
        Ok(items) => {
            tracing::info!("{}: {} item(s)", resource, items);
            Outcome::Ok { items }
        }
        Err(e) => {
            tracing::error!("{}: {:#}", resource, e);
            Outcome::Error {
                message: format_api_error(&e),
            }
        }
    };

    ResourceStatus {
        resource: resource.to_string(),
        outcome,
        elapsed_ms: started.elapsed().as_millis(),
    }
}

/// Export `resources` concurrently and write the manifest.
///
/// Collection failures are recorded in the manifest, not returned; only a
/// failure to write the manifest itself is an error.
pub async fn run<S: Sink + ?Sized>(fetcher: &Fetcher, resources: &[String], sink: &S) -> Result<Manifest> {
    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now().to_rfc3339();
    tracing::info!("export {} started: {} resource(s)", run_id, resources.len());

    let statuses =
        futures::future::join_all(resources.iter().map(|r| export_one(fetcher, sink, r))).await;

    let manifest = Manifest {
        run_id,
        endpoint: fetcher.client().endpoint().to_string(),
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        resources: statuses,
    };

    let value = serde_json::to_value(&manifest).context("Failed to serialize manifest")?;
    sink.write(MANIFEST_KEY, &value)
        .await
        .context("Failed to store manifest")?;

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_items() {
        assert_eq!(count_items(&Value::Null), 0);
        assert_eq!(count_items(&json!([1, 2, 3])), 3);
        assert_eq!(
            count_items(&json!({"UserDetailList": [1, 2], "Policies": [3]})),
            3
        );
        assert_eq!(count_items(&json!({"Users": 3, "Groups": 1})), 1);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let status = ResourceStatus {
            resource: "iam-users".to_string(),
            outcome: Outcome::Ok { items: 2 },
            elapsed_ms: 5,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"resource": "iam-users", "status": "ok", "items": 2, "elapsed_ms": 5})
        );
    }
}
