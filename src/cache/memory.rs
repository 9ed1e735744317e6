//! In-memory store double with failure injection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{CacheStore, CachedRow, StoreError, WriteBatch, WriteOp};

#[derive(Debug, Clone, Default)]
struct State {
  rows: BTreeMap<(String, String), CachedRow>,
  cursors: HashMap<String, u32>,
}

impl State {
  fn rows_for(&self, owner: &str) -> Vec<CachedRow> {
    let mut rows: Vec<CachedRow> = self
      .rows
      .values()
      .filter(|row| row.owner == owner)
      .cloned()
      .collect();
    rows.sort_by(|a, b| {
      a.position
        .cmp(&b.position)
        .then_with(|| a.item_key.cmp(&b.item_key))
    });
    rows
  }
}

/// Applies a batch to a copy of the state and swaps it in on success, so
/// readers only ever see whole batches.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  state: Mutex<State>,
  /// Fail the next batch after this many operations were applied
  fail_after: Mutex<Option<usize>>,
  commits: AtomicUsize,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make the next batch fail once `ops` operations have been applied.
  pub fn fail_next_batch_after(&self, ops: usize) {
    *self.fail_after.lock().unwrap() = Some(ops);
  }

  /// Number of batches that committed.
  pub fn commits(&self) -> usize {
    self.commits.load(Ordering::SeqCst)
  }
}

impl CacheStore for MemoryStorage {
  fn query_ordered(&self, owner: &str) -> Result<Vec<CachedRow>, StoreError> {
    Ok(self.state.lock().unwrap().rows_for(owner))
  }

  fn page_cursor(&self, owner: &str) -> Result<Option<u32>, StoreError> {
    Ok(self.state.lock().unwrap().cursors.get(owner).copied())
  }

  fn query_with_cursor(&self, owner: &str) -> Result<(Vec<CachedRow>, Option<u32>), StoreError> {
    let state = self.state.lock().unwrap();
    Ok((state.rows_for(owner), state.cursors.get(owner).copied()))
  }

  fn run_atomically(&self, batch: WriteBatch) -> Result<(), StoreError> {
    let fail_after = self.fail_after.lock().unwrap().take();
    let mut state = self.state.lock().unwrap();
    let mut next = state.clone();

    for (applied, op) in batch.into_ops().into_iter().enumerate() {
      if fail_after == Some(applied) {
        return Err(StoreError::Other(format!(
          "injected failure after {} operations",
          applied
        )));
      }
      match op {
        WriteOp::DeleteAllFor { owner } => next.rows.retain(|(o, _), _| *o != owner),
        WriteOp::UpsertAll { rows } => {
          for row in rows {
            next
              .rows
              .insert((row.owner.clone(), row.item_key.clone()), row);
          }
        }
        WriteOp::SetCursor { owner, page, .. } => {
          next.cursors.insert(owner, page);
        }
        WriteOp::ClearCursor { owner } => {
          next.cursors.remove(&owner);
        }
      }
    }

    *state = next;
    self.commits.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}
