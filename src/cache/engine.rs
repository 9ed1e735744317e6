//! Refresh engine: decides staleness, fetches remote pages, and commits them
//! atomically together with the owner's page cursor.

use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::errors::{CacheError, StoreError};
use super::paging::{LoadDirection, PageFetch, PagePlan, PageResult};
use super::staleness::is_stale;
use super::storage::{CacheStore, WriteBatch};
use super::traits::{CacheItem, CachedRow, OwnerKey, PageSource, RefreshOutcome};

/// Expiry and page sizing applied to every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
  /// How long a written item stays fresh
  pub ttl: Duration,
  /// Items requested per remote page
  pub page_size: u32,
}

impl Default for CachePolicy {
  fn default() -> Self {
    Self {
      ttl: Duration::hours(8),
      page_size: 20,
    }
  }
}

/// Snapshot of what is cached for one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerStatus {
  pub cached: usize,
  pub cursor: Option<u32>,
  pub stale: bool,
}

/// One async mutex per owner partition, held across read-fetch-commit.
#[derive(Debug, Default)]
struct OwnerLocks {
  locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl OwnerLocks {
  async fn acquire(&self, partition: &str) -> OwnedMutexGuard<()> {
    let lock = {
      let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
      Arc::clone(locks.entry(partition.to_string()).or_default())
    };
    lock.lock_owned().await
  }
}

/// Keeps one feed's owners in sync with the remote source.
///
/// Refreshes and page loads for the same owner are serialized; different
/// owners proceed independently.
pub struct RefreshEngine<P: PageSource, S: CacheStore> {
  source: Arc<P>,
  store: Arc<S>,
  clock: Arc<dyn Clock>,
  policy: CachePolicy,
  locks: Arc<OwnerLocks>,
}

impl<P: PageSource, S: CacheStore> RefreshEngine<P, S> {
  pub fn new(source: Arc<P>, store: Arc<S>) -> Self {
    Self {
      source,
      store,
      clock: Arc::new(SystemClock),
      policy: CachePolicy::default(),
      locks: Arc::new(OwnerLocks::default()),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_policy(mut self, policy: CachePolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Refresh the owner's items if stale (or when forced).
  ///
  /// Fetches page 0 and replaces the owner's items in one transaction. On a
  /// fetch failure the old items stay visible and the error is returned.
  pub async fn refresh(&self, owner: &P::Owner, force: bool) -> Result<RefreshOutcome, CacheError> {
    let partition = owner.partition();
    let _guard = self.locks.acquire(&partition).await;

    if !force {
      let current = self.store.query_ordered(&partition)?;
      if !is_stale(&current, self.clock.now()) {
        debug!(owner = %owner.description(), cached = current.len(), "cache fresh, skipping refresh");
        return Ok(RefreshOutcome::Fresh);
      }
    }

    info!(owner = %owner.description(), force, "refreshing");
    let items = self
      .source
      .fetch_page(owner, 0, self.policy.page_size)
      .await
      .map_err(|e| {
        warn!(owner = %owner.description(), error = %e, "refresh fetch failed, keeping cached items");
        e
      })?;

    let rows = self.stamp(&partition, &items, 0)?;
    let mut batch = WriteBatch::new().delete_all_for(&partition).upsert_all(rows);

    // A paged owner must not keep pointing past the page just replaced
    if self.store.page_cursor(&partition)?.is_some() {
      batch = batch.set_cursor(&partition, &owner.description(), 1);
    }

    self.store.run_atomically(batch)?;
    info!(owner = %owner.description(), count = items.len(), "refresh committed");

    Ok(RefreshOutcome::Refreshed { count: items.len() })
  }

  /// Load one page in the given direction.
  ///
  /// The cursor only advances when the page commits, so retrying a failed
  /// `Append` requests the same page again.
  pub async fn load_page(
    &self,
    owner: &P::Owner,
    direction: LoadDirection,
  ) -> Result<PageResult, CacheError> {
    let plan = direction.plan();
    if plan == PagePlan::NoMoreData {
      return Ok(PageResult::no_more_data());
    }

    let partition = owner.partition();
    let _guard = self.locks.acquire(&partition).await;

    let cursor = if plan.reads_cursor() {
      self.store.page_cursor(&partition)?
    } else {
      None
    };
    let Some(fetch) = plan.resolve(cursor) else {
      return Ok(PageResult::no_more_data());
    };

    debug!(owner = %owner.description(), ?direction, page = fetch.page, "loading page");
    let items = self
      .source
      .fetch_page(owner, fetch.page, self.policy.page_size)
      .await
      .map_err(|e| {
        warn!(owner = %owner.description(), page = fetch.page, error = %e, "page fetch failed");
        e
      })?;

    let batch = self.page_batch(&partition, &owner.description(), fetch, &items)?;
    if !batch.is_empty() {
      self.store.run_atomically(batch)?;
    }

    let result = PageResult::fetched(fetch.page, items.len());
    if result.end_reached {
      info!(owner = %owner.description(), page = fetch.page, "end of data");
    } else {
      debug!(owner = %owner.description(), page = fetch.page, count = items.len(), "page committed");
    }
    Ok(result)
  }

  /// Cached items for an owner in natural order.
  pub fn cached(&self, owner: &P::Owner) -> Result<Vec<P::Item>, StoreError> {
    self
      .store
      .query_ordered(&owner.partition())?
      .iter()
      .map(|row| row.decode::<P::Item>().map_err(StoreError::from))
      .collect()
  }

  pub fn status(&self, owner: &P::Owner) -> Result<OwnerStatus, StoreError> {
    let (rows, cursor) = self.store.query_with_cursor(&owner.partition())?;
    Ok(OwnerStatus {
      cached: rows.len(),
      cursor,
      stale: is_stale(&rows, self.clock.now()),
    })
  }

  fn page_batch(
    &self,
    partition: &str,
    description: &str,
    fetch: PageFetch,
    items: &[P::Item],
  ) -> Result<WriteBatch, StoreError> {
    let rows = self.stamp(partition, items, fetch.first_position(self.policy.page_size))?;

    let batch = if fetch.replace {
      WriteBatch::new()
        .delete_all_for(partition)
        .clear_cursor(partition)
        .upsert_all(rows)
        .set_cursor(partition, description, fetch.next_cursor())
    } else if items.is_empty() {
      // Exhausted: leave the cursor where it is
      WriteBatch::new()
    } else {
      WriteBatch::new()
        .upsert_all(rows)
        .set_cursor(partition, description, fetch.next_cursor())
    };
    Ok(batch)
  }

  fn stamp<T: CacheItem>(
    &self,
    partition: &str,
    items: &[T],
    first_position: i64,
  ) -> Result<Vec<CachedRow>, StoreError> {
    let expires_at = self.clock.now() + self.policy.ttl;
    items
      .iter()
      .zip(first_position..)
      .map(|(item, position)| {
        CachedRow::encode(partition, item, position, expires_at).map_err(StoreError::from)
      })
      .collect()
  }
}

impl<P, S> RefreshEngine<P, S>
where
  P: PageSource + 'static,
  S: CacheStore + 'static,
  P::Owner: Clone + 'static,
{
  /// Fire-and-observe refresh running on its own task.
  pub fn spawn_refresh(
    &self,
    owner: P::Owner,
    force: bool,
  ) -> JoinHandle<Result<RefreshOutcome, CacheError>> {
    let engine = self.clone();
    tokio::spawn(async move { engine.refresh(&owner, force).await })
  }
}

impl<P: PageSource, S: CacheStore> Clone for RefreshEngine<P, S> {
  fn clone(&self) -> Self {
    Self {
      source: Arc::clone(&self.source),
      store: Arc::clone(&self.store),
      clock: Arc::clone(&self.clock),
      policy: self.policy,
      locks: Arc::clone(&self.locks),
    }
  }
}
