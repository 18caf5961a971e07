//! iamsnap
//!
//! Exports a point-in-time snapshot of an account's identity and queue
//! inventory through its administrative API.
//!
//! - [`collect`] - the collection engines (pagination, readiness polling,
//!   prefix expansion, per-entity fan-out)
//! - [`api`] - HTTP transport and error model for the administrative API
//! - [`resource`] - data-driven resource definitions wired to the engines
//! - [`sink`] - where snapshots are written
//! - [`export`] - runs a selection of resources and writes the manifest

pub mod api;
pub mod collect;
pub mod config;
pub mod export;
pub mod resource;
pub mod sink;

/// Version injected at compile time via IAMSNAP_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("IAMSNAP_VERSION") {
    Some(v) => v,
    None => "dev",
};
