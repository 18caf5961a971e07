//! Paginated Collector
//!
//! Follows a continuation cursor until the server stops returning one,
//! merging every page into a single accumulator.

use anyhow::Result;
use serde_json::{Map, Value};
use std::future::Future;

/// One response from a listing call
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: T,
    /// Continuation token; `None` means the listing is finished
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: T) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    pub fn more(items: T, cursor: impl Into<String>) -> Self {
        Self {
            items,
            next_cursor: Some(cursor.into()),
        }
    }
}

/// Arguments that can carry a continuation cursor
pub trait CursorArgs: Clone {
    /// Copy of `self` with the cursor overlaid; every other field is preserved
    fn with_cursor(&self, cursor: &str) -> Self;
}

/// Arguments for a JSON listing call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListArgs {
    pub params: Map<String, Value>,
    /// Request field the cursor is sent back in (e.g. `Marker`, `NextToken`)
    pub cursor_field: String,
}

impl ListArgs {
    pub fn new(params: Map<String, Value>, cursor_field: impl Into<String>) -> Self {
        Self {
            params,
            cursor_field: cursor_field.into(),
        }
    }
}

impl CursorArgs for ListArgs {
    fn with_cursor(&self, cursor: &str) -> Self {
        let mut next = self.clone();
        next.params
            .insert(self.cursor_field.clone(), Value::String(cursor.to_string()));
        next
    }
}

/// Collect every page of a listing capability.
///
/// The first page seeds the accumulator; each following page is folded in
/// with `combine(prev, next)`. Any error from `capability` aborts the whole
/// collection and nothing accumulated so far is returned.
pub async fn collect<A, T, F, Fut, M>(mut capability: F, initial: A, mut combine: M) -> Result<T>
where
    A: CursorArgs,
    F: FnMut(A) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
    M: FnMut(T, T) -> T,
{
    let mut args = initial;
    let mut accumulated: Option<T> = None;
    let mut pages = 0usize;

    loop {
        let page = capability(args.clone()).await?;
        pages += 1;

        accumulated = Some(match accumulated.take() {
            Some(prev) => combine(prev, page.items),
            None => page.items,
        });

        match page.next_cursor {
            Some(cursor) => args = args.with_cursor(&cursor),
            None => break,
        }
    }

    tracing::debug!("collected {} page(s)", pages);

    // The loop runs at least once, so the accumulator is always seeded
    accumulated.ok_or_else(|| anyhow::anyhow!("listing returned no pages"))
}

/// Combinator: append `next` to `prev`
pub fn concat<T>(mut prev: Vec<T>, next: Vec<T>) -> Vec<T> {
    prev.extend(next);
    prev
}

/// Combinator: field-wise concatenation of array fields.
///
/// Each field in `fields` is treated as an independent sequence; a field
/// missing from one page is treated as empty.
pub fn concat_fields(
    fields: &[String],
) -> impl FnMut(Map<String, Value>, Map<String, Value>) -> Map<String, Value> + '_ {
    move |mut prev, mut next| {
        for field in fields {
            let Some(Value::Array(more)) = next.remove(field) else {
                continue;
            };
            match prev.get_mut(field) {
                Some(Value::Array(existing)) => existing.extend(more),
                _ => {
                    prev.insert(field.clone(), Value::Array(more));
                }
            }
        }
        prev
    }
}
