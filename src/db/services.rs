//! High-level data-access helpers shared by the report driver and the
//! per-store estimator.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::api::StoreId;
use crate::db::repository::{FullRepository, RepositoryResult};

/// Retry schedule for transient data-access failures.
const RETRY_BACKOFF: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(400),
    Duration::from_millis(1600),
];

/// Run a repository operation, retrying retryable failures up to three times
/// with exponential backoff before giving up.
pub async fn with_retry<T, F, Fut>(operation: &str, mut call: F) -> RepositoryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RepositoryResult<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < RETRY_BACKOFF.len() => {
                let delay = RETRY_BACKOFF[attempt];
                attempt += 1;
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying transient data-access failure: {}",
                    err
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err.with_operation(operation)),
        }
    }
}

/// The report's store universe: the union of distinct store ids across the
/// poll, schedule, and timezone tables.
pub async fn resolve_store_universe(
    repo: &dyn FullRepository,
) -> RepositoryResult<BTreeSet<StoreId>> {
    let mut universe = with_retry("store_ids_with_timezones", || {
        repo.store_ids_with_timezones()
    })
    .await?;
    universe.extend(with_retry("store_ids_with_schedules", || repo.store_ids_with_schedules()).await?);
    universe.extend(with_retry("store_ids_with_polls", || repo.store_ids_with_polls()).await?);
    Ok(universe)
}

/// The reference instant `now`: the maximum poll timestamp in the data set.
pub async fn resolve_reference_instant(
    repo: &dyn FullRepository,
) -> RepositoryResult<DateTime<Utc>> {
    with_retry("max_poll_timestamp", || repo.max_poll_timestamp()).await
}

/// Verify the backing store is reachable.
pub async fn health_check(repo: &dyn FullRepository) -> RepositoryResult<bool> {
    repo.health_check().await
}
