//! Credential Report
//!
//! The credential report is generated server-side on request. Reading it
//! before it exists fails with `ReportNotPresent` (or `ReportExpired`), and
//! while it is being built with `ReportInProgress`. The readiness poller
//! handles both; this module supplies the two API calls and decodes the
//! base64 CSV payload into one JSON object per row.

use super::registry::ResourceDef;
use crate::api::client::AdminClient;
use crate::collect::{OnDemand, ReadOutcome, ReadinessCodes};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde_json::{Map, Value};

/// Raw report as returned by the read call
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPayload {
    /// Base64-encoded report body
    pub content: String,
    pub generated_time: Option<String>,
}

/// The read/generate pair for the credential report
pub struct CredentialReport<'a> {
    client: &'a AdminClient,
    def: &'a ResourceDef,
    codes: ReadinessCodes,
}

impl<'a> CredentialReport<'a> {
    pub fn new(client: &'a AdminClient, def: &'a ResourceDef) -> Self {
        Self {
            client,
            def,
            codes: ReadinessCodes {
                absent: def.absent_codes.clone(),
                in_progress: def.in_progress_codes.clone(),
            },
        }
    }
}

#[async_trait]
impl<'a> OnDemand for CredentialReport<'a> {
    type Payload = ReportPayload;

    async fn read(&self) -> Result<ReadOutcome<ReportPayload>> {
        let response = match self
            .client
            .call(&self.def.service, &self.def.action, &self.def.base_params())
            .await
        {
            Ok(response) => response,
            Err(e) => return self.codes.classify(e),
        };

        let text = |field: &str| response.get(field).and_then(|v| v.as_str()).map(|s| s.to_string());

        Ok(ReadOutcome::Ready {
            content_type: text("ReportFormat").unwrap_or_default(),
            payload: ReportPayload {
                content: text("Content").unwrap_or_default(),
                generated_time: text("GeneratedTime"),
            },
        })
    }

    async fn generate(&self) -> Result<()> {
        let action = self
            .def
            .generate_action
            .as_deref()
            .context("report without a generate action")?;

        let response = self
            .client
            .call(&self.def.service, action, &Map::new())
            .await?;

        if let Some(state) = response.get("State").and_then(|v| v.as_str()) {
            tracing::debug!("{} state: {}", action, state);
        }
        Ok(())
    }
}

/// Decode a base64 CSV report into one JSON object per row, keyed by header
pub fn decode_report(payload: &ReportPayload) -> Result<Vec<Value>> {
    // Some encoders wrap base64 output across lines
    let compact: String = payload.content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .context("Credential report content is not valid base64")?;

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader
        .headers()
        .context("Credential report has no header row")?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("Malformed credential report row")?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(Value::Object(row));
    }

    Ok(rows)
}
