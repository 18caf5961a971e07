//! Snapshot Sinks
//!
//! Where collected resources end up. The collectors hand over one complete
//! in-memory structure per resource; a sink stores it under the resource key.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Destination for collected resources
#[async_trait]
pub trait Sink: Send + Sync {
    /// Store the complete structure for `resource`, replacing any previous one
    async fn write(&self, resource: &str, value: &Value) -> Result<()>;
}

/// Writes `<dir>/<resource>.json`, pretty-printed
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    /// Create the sink, creating `dir` if needed
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path for a resource
    pub fn path_for(&self, resource: &str) -> PathBuf {
        self.dir.join(format!("{}.json", resource))
    }
}

#[async_trait]
impl Sink for JsonFileSink {
    async fn write(&self, resource: &str, value: &Value) -> Result<()> {
        let path = self.path_for(resource);
        let tmp = self.dir.join(format!(".{}.json.tmp", resource));

        let content = serde_json::to_vec_pretty(value)
            .with_context(|| format!("Failed to serialize {}", resource))?;

        // Write next to the target and rename so readers never see a partial file
        tokio::fs::write(&tmp, &content)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move {} into place", path.display()))?;

        tracing::debug!("wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }
}

/// Keeps everything in memory; used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    written: Mutex<BTreeMap<String, Value>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, resource: &str) -> Option<Value> {
        self.written.lock().await.get(resource).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.written.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&self, resource: &str, value: &Value) -> Result<()> {
        self.written
            .lock()
            .await
            .insert(resource.to_string(), value.clone());
        Ok(())
    }
}
