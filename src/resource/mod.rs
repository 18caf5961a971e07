//! Resource abstraction layer
//!
//! This module provides a data-driven approach to exporting account resources.
//! Resource definitions are loaded from JSON files at compile time, allowing
//! new list operations to be added without code changes as long as they fit
//! one of the collection strategies.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`fetcher`] - Routes each definition to its collection engine
//! - [`report`] - Credential report read/generate pair and CSV decoding
//! - [`queues`] - Prefix-filtered queue listing for the expander
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `iam.json` - users, roles, groups, policies, keys, credential report
//! - `queues.json` - queue inventory and attributes
//!
//! # Example
//!
//! ```ignore
//! use iamsnap::resource::{Fetcher, FetchSettings};
//! use iamsnap::api::AdminClient;
//!
//! async fn list_users(client: AdminClient) -> anyhow::Result<serde_json::Value> {
//!     let fetcher = Fetcher::new(client, FetchSettings::default());
//!     fetcher.fetch("iam-users").await
//! }
//! ```

mod fetcher;
pub mod queues;
mod registry;
pub mod report;

pub use fetcher::{annotate_items, entity_id, page_from_response, sort_items, FetchSettings, Fetcher};
pub use registry::*;
