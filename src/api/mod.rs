//! Administrative API interaction module
//!
//! This module provides the transport layer for talking to the account's
//! administrative API: an HTTP client, typed errors, and the client handle
//! shared by every collector.
//!
//! # Module Structure
//!
//! - [`client`] - Main client for invoking API actions
//! - [`http`] - HTTP utilities for JSON calls
//! - [`error`] - Typed errors carrying status, error code and retry hints
//!
//! # Example
//!
//! ```ignore
//! use iamsnap::api::client::AdminClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = AdminClient::new("http://localhost:4566", None)?;
//!     let users = client.call("iam", "ListUsers", &Default::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod http;

pub use client::AdminClient;
pub use error::{find_api_error, ApiError};
pub use http::format_api_error;
