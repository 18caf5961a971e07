//! Fan-out Aggregator
//!
//! One sub-listing per parent entity (access keys per user, attributes per
//! queue, ...), issued concurrently and merged in entity order.

use anyhow::Result;
use futures::{stream, StreamExt, TryStreamExt};
use std::future::Future;

/// Run `per_entity` for every entity and fold the results with `merge`.
///
/// At most `concurrency` calls are in flight. Results are merged in the
/// order of `entities`, whatever order the calls complete in. The first
/// failure aborts the aggregate; `merge` is only invoked once every call
/// has succeeded.
pub async fn collect_per_entity<'e, E, T, A, F, Fut, M>(
    entities: &'e [E],
    concurrency: usize,
    per_entity: F,
    init: A,
    mut merge: M,
) -> Result<A>
where
    F: FnMut(&'e E) -> Fut,
    Fut: Future<Output = Result<T>>,
    M: FnMut(A, T) -> A,
{
    // Build the calls first; the stream then holds plain futures
    let calls: Vec<Fut> = entities.iter().map(per_entity).collect();
    let results: Vec<T> = stream::iter(calls)
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    tracing::debug!("fan-out over {} entit(ies) complete", entities.len());

    let mut acc = init;
    for result in results {
        acc = merge(acc, result);
    }
    Ok(acc)
}

/// Fan-out whose per-entity results are arrays, concatenated in entity order
pub async fn concat_per_entity<'e, E, T, F, Fut>(
    entities: &'e [E],
    concurrency: usize,
    per_entity: F,
) -> Result<Vec<T>>
where
    F: FnMut(&'e E) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    collect_per_entity(entities, concurrency, per_entity, Vec::new(), |mut acc, items| {
        acc.extend(items);
        acc
    })
    .await
}
