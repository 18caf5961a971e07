//! Resource Registry - Load resource definitions from JSON
//!
//! This module loads every exportable resource definition from embedded JSON
//! files and provides lookup functions for the rest of the application.

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/iam.json"),
    include_str!("../resources/queues.json"),
];

/// How a resource is collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Cursor-paginated list call
    Paginated,
    /// One (possibly paginated) call per parent entity
    PerEntity,
    /// Server-generated report, polled until ready
    Report,
    /// Capped listing enumerated by name prefix
    PrefixExpansion,
    /// A single call, no pagination
    Single,
}

/// Parent definition for per-entity resources
#[derive(Debug, Clone, Deserialize)]
pub struct ParentDef {
    /// Resource whose items are the parent entities
    pub resource_key: String,
    /// Field of the parent item holding its identifier
    pub id_field: String,
    /// Request parameter the identifier is sent in
    pub param: String,
    /// Field name used to wrap scalar child items (e.g. policy names)
    #[serde(default)]
    pub item_name: Option<String>,
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    pub service: String,
    pub strategy: Strategy,
    pub action: String,
    #[serde(default)]
    pub params: Value,
    /// Response fields holding the items; several fields are merged field-wise
    #[serde(default)]
    pub items_fields: Vec<String>,
    #[serde(default)]
    pub cursor_request: Option<String>,
    #[serde(default)]
    pub cursor_response: Option<String>,
    /// Stable identifier used to sort the final result
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub parent: Option<ParentDef>,

    // Prefix expansion
    #[serde(default)]
    pub prefix_param: Option<String>,
    #[serde(default)]
    pub max_results_param: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub alphabet: Option<String>,

    // Reports
    #[serde(default)]
    pub generate_action: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub absent_codes: Vec<String>,
    #[serde(default)]
    pub in_progress_codes: Vec<String>,

    /// Error codes meaning "nothing configured", exported as `null`
    #[serde(default)]
    pub missing_ok_codes: Vec<String>,
}

impl ResourceDef {
    /// Request parameters as a JSON object
    pub fn base_params(&self) -> serde_json::Map<String, Value> {
        self.params.as_object().cloned().unwrap_or_default()
    }

    /// The first (usually only) items field
    pub fn primary_items_field(&self) -> Option<&str> {
        self.items_fields.first().map(|s| s.as_str())
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: BTreeMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        if let Err(e) = final_config.validate() {
            panic!("Invalid embedded resource definition: {:#}", e);
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get all resource keys, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect()
}

impl ResourceConfig {
    /// Check every definition against what its strategy needs
    pub fn validate(&self) -> Result<()> {
        for (key, def) in &self.resources {
            validate_resource(key, def, self)?;
        }
        Ok(())
    }
}

fn validate_resource(key: &str, def: &ResourceDef, registry: &ResourceConfig) -> Result<()> {
    let require = |present: bool, field: &str| -> Result<()> {
        anyhow::ensure!(present, "{}: strategy {:?} requires {}", key, def.strategy, field);
        Ok(())
    };

    match def.strategy {
        Strategy::Paginated | Strategy::Single => {
            require(!def.items_fields.is_empty(), "items_fields")?;
        }
        Strategy::PerEntity => {
            let Some(parent) = &def.parent else {
                anyhow::bail!("{}: strategy {:?} requires parent", key, def.strategy);
            };
            if !registry.resources.contains_key(&parent.resource_key) {
                anyhow::bail!("{}: unknown parent {}", key, parent.resource_key);
            }
            require(!def.items_fields.is_empty(), "items_fields")?;
        }
        Strategy::Report => {
            require(def.generate_action.is_some(), "generate_action")?;
            require(def.content_type.is_some(), "content_type")?;
        }
        Strategy::PrefixExpansion => {
            require(def.prefix_param.is_some(), "prefix_param")?;
            require(def.max_results.unwrap_or(0) > 0, "max_results")?;
            require(
                def.alphabet
                    .as_deref()
                    .and_then(crate::collect::Alphabet::by_name)
                    .is_some(),
                "a known alphabet",
            )?;
            require(!def.items_fields.is_empty(), "items_fields")?;
        }
    }

    if def.cursor_request.is_some() != def.cursor_response.is_some() {
        anyhow::bail!("{}: cursor_request and cursor_response go together", key);
    }

    Ok(())
}
