//! Resource Fetcher
//!
//! Collects resources from the administrative API based on resource
//! definitions, routing each definition to the engine its strategy names.

use super::queues::QueueListing;
use super::registry::{get_registry, get_resource, ParentDef, ResourceDef, Strategy};
use super::report::{decode_report, CredentialReport};
use crate::api::client::AdminClient;
use crate::api::error::find_api_error;
use crate::collect::{
    collect, concat_fields, concat_per_entity, Alphabet, ListArgs, Page, PollConfig,
    PrefixExpander, ReadinessPoller,
};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::OnceCell;

/// Knobs shared by every collection in a run
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Maximum concurrent calls per fan-out or expansion
    pub concurrency: usize,
    pub poll: PollConfig,
    /// Root prefix for queue enumeration
    pub queue_name_prefix: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            poll: PollConfig::default(),
            queue_name_prefix: String::new(),
        }
    }
}

/// Fetches resources for one export run.
///
/// Resources that other resources fan out over (users, queues) are collected
/// once per run and shared; nothing is cached across runs.
pub struct Fetcher {
    client: AdminClient,
    settings: FetchSettings,
    shared: HashMap<String, OnceCell<Value>>,
}

impl Fetcher {
    pub fn new(client: AdminClient, settings: FetchSettings) -> Self {
        let shared = get_registry()
            .resources
            .values()
            .filter_map(|def| def.parent.as_ref())
            .map(|parent| (parent.resource_key.clone(), OnceCell::new()))
            .collect();

        Self {
            client,
            settings,
            shared,
        }
    }

    pub fn client(&self) -> &AdminClient {
        &self.client
    }

    /// Fetch a resource by registry key
    pub fn fetch<'a>(&'a self, resource_key: &'a str) -> BoxFuture<'a, Result<Value>> {
        async move {
            let Some(def) = get_resource(resource_key) else {
                return Err(anyhow::anyhow!("Unknown resource: {}", resource_key));
            };

            match self.shared.get(resource_key) {
                Some(cell) => cell
                    .get_or_try_init(|| self.fetch_def(resource_key, def))
                    .await
                    .cloned(),
                None => self.fetch_def(resource_key, def).await,
            }
        }
        .boxed()
    }

    async fn fetch_def(&self, resource_key: &str, def: &ResourceDef) -> Result<Value> {
        tracing::debug!("fetching {} ({:?})", resource_key, def.strategy);

        let value = match def.strategy {
            Strategy::Paginated => self.fetch_paginated(def).await,
            Strategy::PerEntity => self.fetch_per_entity(def).await,
            Strategy::Report => self.fetch_report(def).await,
            Strategy::PrefixExpansion => self.fetch_prefix_expansion(def).await,
            Strategy::Single => self.fetch_single(def).await,
        }
        .with_context(|| format!("Failed to collect {}", resource_key))?;

        Ok(value)
    }

    /// One page of a listing call
    async fn list_page(&self, def: &ResourceDef, args: ListArgs) -> Result<Page<Map<String, Value>>> {
        let response = self.client.call(&def.service, &def.action, &args.params).await?;
        Ok(page_from_response(response, def))
    }

    /// Follow the cursor for `params`, merging the items fields page by page
    async fn list_all(&self, def: &ResourceDef, params: Map<String, Value>) -> Result<Map<String, Value>> {
        let args = ListArgs::new(params, def.cursor_request.clone().unwrap_or_default());
        collect(
            |args| self.list_page(def, args),
            args,
            concat_fields(&def.items_fields),
        )
        .await
    }

    async fn fetch_paginated(&self, def: &ResourceDef) -> Result<Value> {
        let mut merged = self.list_all(def, def.base_params()).await?;

        if let [field] = def.items_fields.as_slice() {
            let mut items = take_array(&mut merged, field);
            sort_items(&mut items, def.sort_by.as_deref());
            return Ok(Value::Array(items));
        }

        Ok(Value::Object(merged))
    }

    async fn fetch_per_entity(&self, def: &ResourceDef) -> Result<Value> {
        let parent = def
            .parent
            .as_ref()
            .context("per-entity resource without a parent")?;

        let parents = self.fetch(&parent.resource_key).await?;
        let parents = parents.as_array().map(|a| a.as_slice()).unwrap_or_default();

        let mut items = concat_per_entity(parents, self.settings.concurrency, |entity| {
            self.fetch_for_entity(def, parent, entity)
        })
        .await?;

        sort_items(&mut items, def.sort_by.as_deref());
        Ok(Value::Array(items))
    }

    async fn fetch_for_entity(
        &self,
        def: &ResourceDef,
        parent: &ParentDef,
        entity: &Value,
    ) -> Result<Vec<Value>> {
        let id = entity_id(entity, &parent.id_field)
            .with_context(|| format!("Parent item without {}", parent.id_field))?;

        let mut params = def.base_params();
        params.insert(parent.param.clone(), Value::String(id.clone()));

        let mut merged = self.list_all(def, params).await?;
        let field = def.primary_items_field().unwrap_or_default();
        let value = merged.remove(field).unwrap_or(Value::Null);

        Ok(annotate_items(value, parent, &id))
    }

    async fn fetch_report(&self, def: &ResourceDef) -> Result<Value> {
        let report = CredentialReport::new(&self.client, def);
        let poller = ReadinessPoller::new(
            self.settings.poll.clone(),
            def.content_type.clone().unwrap_or_default(),
        );

        let payload = poller.obtain(&report).await?;
        let rows = decode_report(&payload)?;
        tracing::info!("credential report generated at {:?} with {} row(s)", payload.generated_time, rows.len());
        Ok(Value::Array(rows))
    }

    async fn fetch_prefix_expansion(&self, def: &ResourceDef) -> Result<Value> {
        let alphabet = def
            .alphabet
            .as_deref()
            .and_then(Alphabet::by_name)
            .with_context(|| format!("Unknown alphabet: {:?}", def.alphabet))?;
        let max_results = def.max_results.context("max_results is required")?;

        let listing = QueueListing::new(&self.client, def, max_results)?;
        let expansion = PrefixExpander::new(&listing, &alphabet, max_results, self.settings.concurrency)?
            .expand(&self.settings.queue_name_prefix)
            .await?;

        let items = expansion
            .items
            .into_iter()
            .map(|url| listing.describe(&url))
            .collect();

        Ok(Value::Array(items))
    }

    async fn fetch_single(&self, def: &ResourceDef) -> Result<Value> {
        let response = match self.client.call(&def.service, &def.action, &def.base_params()).await {
            Ok(response) => response,
            Err(e) => {
                let missing_ok = find_api_error(&e)
                    .and_then(|api| api.code())
                    .is_some_and(|code| def.missing_ok_codes.iter().any(|c| c == code));
                if missing_ok {
                    tracing::info!("{} not configured on this account", def.action);
                    return Ok(Value::Null);
                }
                return Err(e);
            }
        };

        Ok(match def.primary_items_field() {
            Some(field) => response.get(field).cloned().unwrap_or(Value::Null),
            None => response,
        })
    }
}

/// Split a response into the items fields and the continuation cursor
pub fn page_from_response(response: Value, def: &ResourceDef) -> Page<Map<String, Value>> {
    let mut response = match response {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let next_cursor = def
        .cursor_response
        .as_deref()
        .and_then(|field| response.get(field))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let items = def
        .items_fields
        .iter()
        .map(|field| {
            let value = match response.remove(field) {
                Some(Value::Null) | None => Value::Array(Vec::new()),
                Some(v) => v,
            };
            (field.clone(), value)
        })
        .collect();

    Page { items, next_cursor }
}

/// Identifier of a parent entity: a string item itself, or its `id_field`
pub fn entity_id(entity: &Value, id_field: &str) -> Option<String> {
    match entity {
        Value::String(s) => Some(s.clone()),
        other => other.get(id_field).and_then(|v| v.as_str()).map(|s| s.to_string()),
    }
}

/// Turn one entity's response field into output items tagged with the parent
pub fn annotate_items(value: Value, parent: &ParentDef, parent_id: &str) -> Vec<Value> {
    let tag = |mut map: Map<String, Value>| {
        map.entry(parent.id_field.clone())
            .or_insert_with(|| Value::String(parent_id.to_string()));
        Value::Object(map)
    };

    let scalar = |v: Value| {
        let mut map = Map::new();
        map.insert(parent.id_field.clone(), Value::String(parent_id.to_string()));
        map.insert(
            parent.item_name.clone().unwrap_or_else(|| "Value".to_string()),
            v,
        );
        Value::Object(map)
    };

    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => tag(map),
                other => scalar(other),
            })
            .collect(),
        Value::Object(map) => vec![tag(map)],
        other => vec![scalar(other)],
    }
}

/// Deterministic secondary sort on a string field; items without the field
/// keep their relative order at the end
pub fn sort_items(items: &mut [Value], sort_by: Option<&str>) {
    let Some(field) = sort_by else {
        return;
    };
    items.sort_by(|a, b| {
        let a = a.get(field).and_then(|v| v.as_str());
        let b = b.get(field).and_then(|v| v.as_str());
        match (a, b) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
}

fn take_array(map: &mut Map<String, Value>, field: &str) -> Vec<Value> {
    match map.remove(field) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}
