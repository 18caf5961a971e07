//! Prefix Truncation Expander
//!
//! Complete enumeration of a named object space through a listing call that
//! silently caps its results and has no continuation cursor, only a
//! name-prefix filter.
//!
//! The walk is an implicit trie over the alphabet. Each [`NamespaceNode`]
//! lists its prefix once:
//!
//! - fewer than `max_results` items: the page cannot be truncated, so it is
//!   the complete answer for that prefix and the branch stops.
//! - `max_results` items (or more): the page may be truncated. Its items are
//!   dropped, except the ones whose local key *is* the prefix (no child can
//!   ever return those), and one child is expanded per alphabet character.
//!
//! Every name is a finite string over the alphabet, and a branch is only
//! abandoned once it is proven complete, so by induction on prefix length
//! every object is found. Siblings are independent and run concurrently;
//! their results are merged as a union keyed by identity, which makes the
//! output independent of completion order.
//!
//! Completeness depends on two properties of the listing that cannot be
//! verified from the outside:
//!
//! - the alphabet covers every character that can appear in a local key.
//!   The expander logs the characters it happens to see outside it.
//! - a capped page holds the *smallest* matching local keys, in ascending
//!   order. An item whose key equals a truncated prefix is only ever seen in
//!   that prefix's own page; under any other order it can be cut off and is
//!   lost. Truncated pages that are not ascending are counted in
//!   [`ExpandStats::unordered_pages`] and logged.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use std::collections::BTreeMap;
use tokio::sync::Semaphore;

/// Default depth guard. Queue names are at most 80 characters.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Ordered set of characters that may appear in a local key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    chars: Vec<char>,
}

impl Alphabet {
    /// Build from characters, dropping duplicates but keeping first-seen order
    pub fn new(chars: impl IntoIterator<Item = char>) -> Self {
        let mut seen = Vec::new();
        for c in chars {
            if !seen.contains(&c) {
                seen.push(c);
            }
        }
        Self { chars: seen }
    }

    /// Characters legal in a queue name: ASCII alphanumerics, `-`, `_`, and
    /// `.` (FIFO queues end in `.fifo`)
    pub fn queue_names() -> Self {
        Self::new(
            ('a'..='z')
                .chain('A'..='Z')
                .chain('0'..='9')
                .chain(['-', '_', '.']),
        )
    }

    /// Look up a named alphabet used by resource definitions
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "queue_names" => Some(Self::queue_names()),
            "lowercase_alphanumeric" => Some(Self::new(('a'..='z').chain('0'..='9'))),
            _ => None,
        }
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn contains(&self, c: char) -> bool {
        self.chars.contains(&c)
    }

    /// True if every character of `s` is in the alphabet
    pub fn covers(&self, s: &str) -> bool {
        s.chars().all(|c| self.contains(c))
    }
}

/// A listing call that can only be narrowed by name prefix
#[async_trait]
pub trait PrefixListing: Send + Sync {
    type Item: Send;

    /// Items whose local key starts with `prefix`, at most `max_results`
    /// of them, in ascending order of local key
    async fn list(&self, prefix: &str) -> Result<Vec<Self::Item>>;

    /// Stable identity used for deduplication (e.g. the full URL)
    fn identity(&self, item: &Self::Item) -> String;

    /// The part of the name the prefix filter applies to (e.g. the last
    /// path segment)
    fn local_key(&self, item: &Self::Item) -> String;
}

/// One prefix query in the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceNode {
    pub prefix: String,
    pub depth: usize,
}

impl NamespaceNode {
    pub fn root(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            depth: 0,
        }
    }

    pub fn child(&self, c: char) -> Self {
        let mut prefix = self.prefix.clone();
        prefix.push(c);
        Self {
            prefix,
            depth: self.depth + 1,
        }
    }
}

/// Counters for one expansion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandStats {
    pub list_calls: usize,
    pub truncated_nodes: usize,
    pub max_depth: usize,
    /// Truncated pages whose local keys were not ascending
    pub unordered_pages: usize,
}

impl ExpandStats {
    fn merge(&mut self, other: Self) {
        self.list_calls += other.list_calls;
        self.truncated_nodes += other.truncated_nodes;
        self.unordered_pages += other.unordered_pages;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

/// Result of an expansion: items ordered by identity
#[derive(Debug)]
pub struct Expansion<T> {
    pub items: Vec<T>,
    pub stats: ExpandStats,
}

#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("prefix expansion exceeded depth {max_depth} at prefix {prefix:?}")]
    DepthExceeded { max_depth: usize, prefix: String },
}

type Branch<T> = (BTreeMap<String, T>, ExpandStats);

/// Walks the prefix trie of a [`PrefixListing`]
pub struct PrefixExpander<'a, L: PrefixListing> {
    listing: &'a L,
    alphabet: &'a Alphabet,
    max_results: usize,
    max_depth: usize,
    limiter: Semaphore,
}

impl<'a, L: PrefixListing> PrefixExpander<'a, L> {
    /// `max_results` is the server's page cap; `max_concurrency` bounds the
    /// number of listing calls in flight
    pub fn new(
        listing: &'a L,
        alphabet: &'a Alphabet,
        max_results: usize,
        max_concurrency: usize,
    ) -> Result<Self> {
        anyhow::ensure!(max_results > 0, "max_results must be at least 1");
        anyhow::ensure!(!alphabet.is_empty(), "alphabet must not be empty");
        anyhow::ensure!(max_concurrency > 0, "max_concurrency must be at least 1");

        Ok(Self {
            listing,
            alphabet,
            max_results,
            max_depth: DEFAULT_MAX_DEPTH,
            limiter: Semaphore::new(max_concurrency),
        })
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enumerate every item whose local key starts with `root_prefix`
    pub async fn expand(&self, root_prefix: &str) -> Result<Expansion<L::Item>> {
        let (items, stats) = self.expand_node(NamespaceNode::root(root_prefix)).await?;

        tracing::info!(
            "prefix expansion of {:?}: {} item(s), {} list call(s), {} truncated node(s), depth {}",
            root_prefix,
            items.len(),
            stats.list_calls,
            stats.truncated_nodes,
            stats.max_depth
        );

        Ok(Expansion {
            items: items.into_values().collect(),
            stats,
        })
    }

    fn expand_node(&self, node: NamespaceNode) -> BoxFuture<'_, Result<Branch<L::Item>>> {
        async move {
            if node.depth > self.max_depth {
                return Err(ExpandError::DepthExceeded {
                    max_depth: self.max_depth,
                    prefix: node.prefix,
                }
                .into());
            }

            let page = {
                // Permit covers the remote call only, never the wait on children
                let _permit = self.limiter.acquire().await?;
                self.listing.list(&node.prefix).await?
            };

            let mut stats = ExpandStats {
                list_calls: 1,
                truncated_nodes: 0,
                max_depth: node.depth,
                unordered_pages: 0,
            };
            let mut found = BTreeMap::new();

            if page.len() < self.max_results {
                tracing::trace!("prefix {:?} complete with {} item(s)", node.prefix, page.len());
                for item in page {
                    found.entry(self.listing.identity(&item)).or_insert(item);
                }
                return Ok((found, stats));
            }

            tracing::debug!(
                "prefix {:?} returned {} item(s), branching {} way(s)",
                node.prefix,
                page.len(),
                self.alphabet.len()
            );
            stats.truncated_nodes = 1;

            let keys: Vec<String> = page.iter().map(|item| self.listing.local_key(item)).collect();
            if keys.windows(2).any(|pair| pair[0] > pair[1]) {
                tracing::warn!(
                    "prefix {:?} returned a capped page out of order; exact matches may be missed",
                    node.prefix
                );
                stats.unordered_pages = 1;
            }

            let branch_at = node.prefix.chars().count();
            for (item, key) in page.into_iter().zip(keys) {
                if key == node.prefix {
                    found.entry(self.listing.identity(&item)).or_insert(item);
                } else if let Some(c) = key.chars().nth(branch_at) {
                    if !self.alphabet.contains(c) {
                        tracing::warn!(
                            "name {:?} has character {:?} outside the alphabet; listing may be incomplete",
                            key,
                            c
                        );
                    }
                }
            }

            let children = self
                .alphabet
                .chars()
                .iter()
                .map(|c| self.expand_node(node.child(*c)));

            for (items, child_stats) in try_join_all(children).await? {
                stats.merge(child_stats);
                for (identity, item) in items {
                    found.entry(identity).or_insert(item);
                }
            }

            Ok((found, stats))
        }
        .boxed()
    }
}
