//! Property-based tests using proptest
//!
//! These tests check the prefix expander against an in-memory namespace:
//! whatever the inventory and page cap, the expansion must return every
//! name exactly once, and pagination must concatenate pages in order.

use anyhow::Result;
use async_trait::async_trait;
use iamsnap::collect::{collect, concat, Alphabet, ListArgs, Page, PrefixExpander, PrefixListing};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lexicographically ordered listing capped at `max_results`
struct SortedNames {
    names: Vec<String>,
    max_results: usize,
    calls: AtomicUsize,
}

impl SortedNames {
    fn new(names: &BTreeSet<String>, max_results: usize) -> Self {
        Self {
            names: names.iter().cloned().collect(),
            max_results,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PrefixListing for SortedNames {
    type Item = String;

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .names
            .iter()
            .filter(|n| n.starts_with(prefix))
            .take(self.max_results)
            .cloned()
            .collect())
    }

    fn identity(&self, item: &String) -> String {
        item.clone()
    }

    fn local_key(&self, item: &String) -> String {
        item.clone()
    }
}

/// Names over a three-letter alphabet, so prefixes collide often
fn arb_names() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[abc]{1,6}", 0..60)
}

fn expand(names: &BTreeSet<String>, max_results: usize, root: &str) -> (Vec<String>, usize) {
    let listing = SortedNames::new(names, max_results);
    let alphabet = Alphabet::new("abc".chars());

    let expansion = tokio_test::block_on(async {
        PrefixExpander::new(&listing, &alphabet, max_results, 4)?
            .expand(root)
            .await
    })
    .unwrap();

    (expansion.items, listing.calls.load(Ordering::SeqCst))
}

proptest! {
    /// Every name is found exactly once, whatever the cap
    #[test]
    fn expansion_is_complete_without_duplicates(
        names in arb_names(),
        max_results in 1usize..6,
    ) {
        let (items, _) = expand(&names, max_results, "");
        let expected: Vec<String> = names.iter().cloned().collect();
        prop_assert_eq!(items, expected);
    }

    /// A root prefix restricts the expansion to names under it
    #[test]
    fn expansion_respects_root_prefix(
        names in arb_names(),
        max_results in 1usize..6,
        root in "[abc]{1,2}",
    ) {
        let (items, _) = expand(&names, max_results, &root);
        let expected: Vec<String> = names
            .iter()
            .filter(|n| n.starts_with(root.as_str()))
            .cloned()
            .collect();
        prop_assert_eq!(items, expected);
    }

    /// An inventory below the cap costs exactly one call
    #[test]
    fn small_inventory_is_one_call(names in arb_names()) {
        let (items, calls) = expand(&names, names.len() + 1, "");
        prop_assert_eq!(items.len(), names.len());
        prop_assert_eq!(calls, 1);
    }

    /// Pages are concatenated in cursor order
    #[test]
    fn pagination_concatenates_in_order(
        pages in prop::collection::vec(prop::collection::vec(any::<u32>(), 0..5), 1..8),
    ) {
        let expected: Vec<u32> = pages.iter().flatten().copied().collect();
        let total = pages.len();

        let collected = tokio_test::block_on(collect(
            |args: ListArgs| {
                let index: usize = args
                    .params
                    .get("Marker")
                    .and_then(|v| v.as_str())
                    .map(|s| s.parse().unwrap())
                    .unwrap_or(0);
                let items = pages[index].clone();
                async move {
                    Ok::<_, anyhow::Error>(if index + 1 < total {
                        Page::more(items, (index + 1).to_string())
                    } else {
                        Page::last(items)
                    })
                }
            },
            ListArgs::new(serde_json::Map::new(), "Marker"),
            concat,
        ))
        .unwrap();

        prop_assert_eq!(collected, expected);
    }
}
