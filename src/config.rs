//! Configuration Management
//!
//! Handles persistent configuration storage for iamsnap. Every value can be
//! overridden on the command line; the endpoint also falls back to the
//! environment. The bearer token only ever comes from the environment.

use crate::collect::PollConfig;
use crate::resource::FetchSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENDPOINT_ENV: &str = "IAMSNAP_ENDPOINT";
pub const TOKEN_ENV: &str = "IAMSNAP_TOKEN";

pub const DEFAULT_ENDPOINT: &str = "http://localhost:4566";
pub const DEFAULT_OUTPUT_DIR: &str = "iamsnap-out";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Administrative API endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Directory snapshots are written to
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Root prefix for queue enumeration
    #[serde(default)]
    pub queue_name_prefix: Option<String>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub settle_delay_ms: Option<u64>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    /// Credential report read limit; 0 polls until ready
    #[serde(default)]
    pub max_polls: Option<u32>,
    /// Resource keys to export; empty exports everything
    #[serde(default)]
    pub resources: Vec<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("iamsnap").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`; a missing or unreadable file yields the defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective endpoint (CLI > config > IAMSNAP_ENDPOINT > default)
    pub fn effective_endpoint(&self, cli: Option<&str>) -> String {
        resolve(
            cli,
            self.endpoint.as_deref(),
            std::env::var(ENDPOINT_ENV).ok().as_deref(),
        )
        .unwrap_or(DEFAULT_ENDPOINT)
        .to_string()
    }

    /// Get effective output directory (CLI > config > default)
    pub fn effective_output_dir(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    /// Get effective resource selection (CLI > config > everything).
    ///
    /// Repeated keys are dropped, keeping the first occurrence, since each
    /// resource is written to one output file.
    pub fn effective_resources(&self, cli: &[String]) -> Vec<String> {
        let selected: Vec<String> = if !cli.is_empty() {
            cli.to_vec()
        } else if !self.resources.is_empty() {
            self.resources.clone()
        } else {
            crate::resource::get_all_resource_keys()
                .into_iter()
                .map(|k| k.to_string())
                .collect()
        };

        let mut seen = HashSet::new();
        selected
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    /// Polling knobs for server-generated resources
    pub fn poll_config(&self) -> PollConfig {
        let defaults = PollConfig::default();
        PollConfig {
            settle_delay: self
                .settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            retry_delay: self
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            max_polls: match self.max_polls {
                Some(0) => None,
                Some(n) => Some(n),
                None => defaults.max_polls,
            },
        }
    }

    /// Collection settings, with the queue prefix from the CLI taking precedence
    pub fn fetch_settings(&self, cli_queue_prefix: Option<&str>) -> FetchSettings {
        let defaults = FetchSettings::default();
        FetchSettings {
            concurrency: self
                .max_concurrency
                .filter(|n| *n > 0)
                .unwrap_or(defaults.concurrency),
            poll: self.poll_config(),
            queue_name_prefix: cli_queue_prefix
                .or(self.queue_name_prefix.as_deref())
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Set endpoint and save
    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<()> {
        self.endpoint = Some(endpoint.to_string());
        self.save()
    }
}

/// Bearer token from the environment, if set and non-empty
pub fn token_from_env() -> Option<String> {
    std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty())
}

/// First non-empty value in precedence order
fn resolve<'a>(cli: Option<&'a str>, config: Option<&'a str>, env: Option<&'a str>) -> Option<&'a str> {
    [cli, config, env]
        .into_iter()
        .flatten()
        .find(|v| !v.trim().is_empty())
}
