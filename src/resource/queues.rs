//! Queue listing
//!
//! `ListQueues` returns at most `MaxResults` queue URLs filtered by
//! `QueueNamePrefix`, and says nothing when it cuts the list short. The
//! prefix expander turns that into a complete inventory; this module is the
//! listing it drives.

use super::registry::ResourceDef;
use crate::api::client::AdminClient;
use crate::collect::PrefixListing;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Last path segment of a queue URL (the queue name)
pub fn queue_name(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

/// Prefix-filtered queue listing
pub struct QueueListing<'a> {
    client: &'a AdminClient,
    def: &'a ResourceDef,
    items_field: &'a str,
    max_results: usize,
}

impl<'a> QueueListing<'a> {
    pub fn new(client: &'a AdminClient, def: &'a ResourceDef, max_results: usize) -> Result<Self> {
        let items_field = def
            .primary_items_field()
            .context("queue listing needs an items field")?;

        Ok(Self {
            client,
            def,
            items_field,
            max_results,
        })
    }

    /// Exported form of one queue
    pub fn describe(&self, url: &str) -> Value {
        json!({
            "QueueUrl": url,
            "QueueName": queue_name(url),
        })
    }
}

#[async_trait]
impl<'a> PrefixListing for QueueListing<'a> {
    type Item = String;

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut params = self.def.base_params();
        if !prefix.is_empty() {
            if let Some(param) = &self.def.prefix_param {
                params.insert(param.clone(), Value::String(prefix.to_string()));
            }
        }
        if let Some(param) = &self.def.max_results_param {
            params.insert(param.clone(), json!(self.max_results));
        }

        let response = self
            .client
            .call(&self.def.service, &self.def.action, &params)
            .await?;

        let urls = response
            .get(self.items_field)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(urls)
    }

    fn identity(&self, item: &String) -> String {
        item.clone()
    }

    fn local_key(&self, item: &String) -> String {
        queue_name(item).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_name_is_last_segment() {
        assert_eq!(queue_name("https://sqs.us-east-1.amazonaws.com/123456789012/orders"), "orders");
        assert_eq!(queue_name("http://localhost:4566/000000000000/jobs.fifo/"), "jobs.fifo");
        assert_eq!(queue_name("flat-name"), "flat-name");
    }
}
