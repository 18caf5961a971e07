//! Collection engines
//!
//! The reusable machinery every exported resource is built on. None of these
//! know anything about IAM or queues; the [`crate::resource`] layer plugs
//! concrete API calls into them.
//!
//! - [`paginate`] - cursor-following accumulation for ordinary list calls
//! - [`readiness`] - poll loop for server-generated resources
//! - [`expand`] - prefix trie walk for capped listings without a cursor
//! - [`fanout`] - one concurrent sub-listing per parent entity

pub mod expand;
pub mod fanout;
pub mod paginate;
pub mod readiness;

pub use expand::{Alphabet, ExpandStats, Expansion, NamespaceNode, PrefixExpander, PrefixListing};
pub use fanout::{collect_per_entity, concat_per_entity};
pub use paginate::{collect, concat, concat_fields, CursorArgs, ListArgs, Page};
pub use readiness::{OnDemand, PollConfig, ReadOutcome, ReadinessCodes, ReadinessError, ReadinessPoller};
