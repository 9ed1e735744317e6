//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::errors::StoreError;
use super::traits::CachedRow;

/// A single mutation inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
  /// Remove every item row for the owner
  DeleteAllFor { owner: String },
  /// Insert or replace rows by `(owner, item_key)`
  UpsertAll { rows: Vec<CachedRow> },
  /// Set the next page index to fetch
  SetCursor {
    owner: String,
    description: String,
    page: u32,
  },
  /// Forget the page cursor (reads back as absent)
  ClearCursor { owner: String },
}

/// Mutations applied as one unit: either all land or none do.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
  ops: Vec<WriteOp>,
}

impl WriteBatch {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn delete_all_for(mut self, owner: &str) -> Self {
    self.ops.push(WriteOp::DeleteAllFor {
      owner: owner.to_string(),
    });
    self
  }

  pub fn upsert_all(mut self, rows: Vec<CachedRow>) -> Self {
    self.ops.push(WriteOp::UpsertAll { rows });
    self
  }

  pub fn set_cursor(mut self, owner: &str, description: &str, page: u32) -> Self {
    self.ops.push(WriteOp::SetCursor {
      owner: owner.to_string(),
      description: description.to_string(),
      page,
    });
    self
  }

  pub fn clear_cursor(mut self, owner: &str) -> Self {
    self.ops.push(WriteOp::ClearCursor {
      owner: owner.to_string(),
    });
    self
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }

  pub fn into_ops(self) -> Vec<WriteOp> {
    self.ops
  }
}

/// Trait for cache storage backends.
///
/// Holds both the content table and the page cursor table so the two can be
/// mutated in one transaction.
pub trait CacheStore: Send + Sync {
  /// All rows for an owner in natural order.
  fn query_ordered(&self, owner: &str) -> Result<Vec<CachedRow>, StoreError>;

  /// Next page index to fetch for an owner, if one was recorded.
  fn page_cursor(&self, owner: &str) -> Result<Option<u32>, StoreError>;

  /// Rows and cursor for an owner read as one consistent snapshot.
  fn query_with_cursor(&self, owner: &str) -> Result<(Vec<CachedRow>, Option<u32>), StoreError>;

  /// Apply every operation of the batch atomically.
  fn run_atomically(&self, batch: WriteBatch) -> Result<(), StoreError>;

  fn set_page_cursor(&self, owner: &str, description: &str, page: u32) -> Result<(), StoreError> {
    self.run_atomically(WriteBatch::new().set_cursor(owner, description, page))
  }

  fn clear_page_cursor(&self, owner: &str) -> Result<(), StoreError> {
    self.run_atomically(WriteBatch::new().clear_cursor(owner))
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// A private database that lives as long as the storage.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("dealdeck").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock().map_err(|e| eyre!("{}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::Poisoned(e.to_string()))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Cached items, one partition per owner
CREATE TABLE IF NOT EXISTS cached_items (
    owner TEXT NOT NULL,
    item_key TEXT NOT NULL CHECK (length(item_key) > 0),
    entity_type TEXT NOT NULL,
    position INTEGER NOT NULL,
    data BLOB NOT NULL,
    expires_at TEXT NOT NULL,
    PRIMARY KEY (owner, item_key)
);

CREATE INDEX IF NOT EXISTS idx_cached_items_order
    ON cached_items(owner, position);

-- Next remote page to request, one row per owner
CREATE TABLE IF NOT EXISTS page_cursors (
    owner TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    next_page INTEGER NOT NULL CHECK (next_page >= 0),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl CacheStore for SqliteStorage {
  fn query_ordered(&self, owner: &str) -> Result<Vec<CachedRow>, StoreError> {
    let conn = self.lock()?;
    select_rows(&conn, owner)
  }

  fn page_cursor(&self, owner: &str) -> Result<Option<u32>, StoreError> {
    let conn = self.lock()?;
    select_cursor(&conn, owner)
  }

  fn query_with_cursor(&self, owner: &str) -> Result<(Vec<CachedRow>, Option<u32>), StoreError> {
    // Writers hold the same lock for their whole transaction
    let conn = self.lock()?;
    Ok((select_rows(&conn, owner)?, select_cursor(&conn, owner)?))
  }

  fn run_atomically(&self, batch: WriteBatch) -> Result<(), StoreError> {
    if batch.is_empty() {
      return Ok(());
    }

    let mut conn = self.lock()?;
    let tx = conn.transaction()?;

    for op in batch.into_ops() {
      apply_op(&tx, op)?;
    }

    // Dropping an uncommitted transaction rolls it back
    tx.commit()?;
    Ok(())
  }
}

fn select_rows(conn: &Connection, owner: &str) -> Result<Vec<CachedRow>, StoreError> {
  let mut stmt = conn.prepare_cached(
    "SELECT item_key, entity_type, position, data, expires_at FROM cached_items
     WHERE owner = ?
     ORDER BY position, item_key",
  )?;

  let raw: Vec<(String, String, i64, Vec<u8>, String)> = stmt
    .query_map(params![owner], |row| {
      Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    })?
    .collect::<rusqlite::Result<_>>()?;

  raw
    .into_iter()
    .map(|(item_key, entity_type, position, data, expires_at)| {
      Ok(CachedRow {
        owner: owner.to_string(),
        item_key,
        entity_type,
        position,
        data,
        expires_at: parse_datetime(&expires_at)?,
      })
    })
    .collect()
}

fn select_cursor(conn: &Connection, owner: &str) -> Result<Option<u32>, StoreError> {
  let page: Option<i64> = conn
    .query_row(
      "SELECT next_page FROM page_cursors WHERE owner = ?",
      params![owner],
      |row| row.get(0),
    )
    .optional()?;

  page
    .map(|p| u32::try_from(p).map_err(|_| StoreError::Corrupt(format!("page cursor {}", p))))
    .transpose()
}

fn apply_op(tx: &Transaction<'_>, op: WriteOp) -> Result<(), StoreError> {
  match op {
    WriteOp::DeleteAllFor { owner } => {
      tx.execute("DELETE FROM cached_items WHERE owner = ?", params![owner])?;
    }
    WriteOp::UpsertAll { rows } => {
      let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO cached_items (owner, item_key, entity_type, position, data, expires_at)
         VALUES (?, ?, ?, ?, ?, ?)",
      )?;
      for row in rows {
        stmt.execute(params![
          row.owner,
          row.item_key,
          row.entity_type,
          row.position,
          row.data,
          row.expires_at.to_rfc3339(),
        ])?;
      }
    }
    WriteOp::SetCursor {
      owner,
      description,
      page,
    } => {
      tx.execute(
        "INSERT OR REPLACE INTO page_cursors (owner, description, next_page, updated_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![owner, description, page],
      )?;
    }
    WriteOp::ClearCursor { owner } => {
      tx.execute("DELETE FROM page_cursors WHERE owner = ?", params![owner])?;
    }
  }
  Ok(())
}

/// Parse an RFC 3339 timestamp stored by this module.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone};

  fn expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap()
  }

  fn row(owner: &str, key: &str, position: i64) -> CachedRow {
    CachedRow {
      owner: owner.to_string(),
      item_key: key.to_string(),
      entity_type: "deal".to_string(),
      position,
      data: format!("{{\"id\":\"{}\"}}", key).into_bytes(),
      expires_at: expiry(),
    }
  }

  fn keys(rows: &[CachedRow]) -> Vec<&str> {
    rows.iter().map(|r| r.item_key.as_str()).collect()
  }

  #[test]
  fn test_query_returns_natural_order() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .run_atomically(WriteBatch::new().upsert_all(vec![
        row("a", "z", 2),
        row("a", "x", 0),
        row("a", "y", 1),
        row("b", "w", 0),
      ]))
      .unwrap();

    let rows = storage.query_ordered("a").unwrap();
    assert_eq!(keys(&rows), vec!["x", "y", "z"]);
    assert_eq!(rows[0].expires_at, expiry());
    assert_eq!(storage.query_ordered("b").unwrap().len(), 1);
  }

  #[test]
  fn test_upsert_replaces_by_key() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .run_atomically(WriteBatch::new().upsert_all(vec![row("a", "x", 0)]))
      .unwrap();

    let mut replacement = row("a", "x", 5);
    replacement.expires_at = expiry() + Duration::hours(1);
    storage
      .run_atomically(WriteBatch::new().upsert_all(vec![replacement]))
      .unwrap();

    let rows = storage.query_ordered("a").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].position, 5);
    assert_eq!(rows[0].expires_at, expiry() + Duration::hours(1));
  }

  #[test]
  fn test_delete_all_for_only_touches_owner() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .run_atomically(WriteBatch::new().upsert_all(vec![row("a", "x", 0), row("b", "y", 0)]))
      .unwrap();

    storage
      .run_atomically(WriteBatch::new().delete_all_for("a"))
      .unwrap();

    assert!(storage.query_ordered("a").unwrap().is_empty());
    assert_eq!(storage.query_ordered("b").unwrap().len(), 1);
  }

  #[test]
  fn test_cursor_set_get_clear() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert_eq!(storage.page_cursor("a").unwrap(), None);

    storage.set_page_cursor("a", "deals for store a", 3).unwrap();
    assert_eq!(storage.page_cursor("a").unwrap(), Some(3));

    storage.set_page_cursor("a", "deals for store a", 4).unwrap();
    assert_eq!(storage.page_cursor("a").unwrap(), Some(4));

    storage.clear_page_cursor("a").unwrap();
    assert_eq!(storage.page_cursor("a").unwrap(), None);
  }

  #[test]
  fn test_failed_batch_rolls_back_everything() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .run_atomically(
        WriteBatch::new()
          .upsert_all(vec![row("a", "x", 0), row("a", "y", 1)])
          .set_cursor("a", "a", 2),
      )
      .unwrap();

    // The empty key violates the CHECK constraint after the delete already ran
    let result = storage.run_atomically(
      WriteBatch::new()
        .delete_all_for("a")
        .clear_cursor("a")
        .upsert_all(vec![row("a", "", 0)]),
    );

    assert!(matches!(result, Err(StoreError::Sqlite(_))));
    assert_eq!(keys(&storage.query_ordered("a").unwrap()), vec!["x", "y"]);
    assert_eq!(storage.page_cursor("a").unwrap(), Some(2));
  }

  #[test]
  fn test_query_with_cursor_reads_both_tables() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let (rows, cursor) = storage.query_with_cursor("a").unwrap();
    assert!(rows.is_empty());
    assert_eq!(cursor, None);

    storage
      .run_atomically(
        WriteBatch::new()
          .upsert_all(vec![row("a", "y", 1), row("a", "x", 0)])
          .set_cursor("a", "store a", 1),
      )
      .unwrap();

    let (rows, cursor) = storage.query_with_cursor("a").unwrap();
    assert_eq!(keys(&rows), vec!["x", "y"]);
    assert_eq!(cursor, Some(1));
  }

  #[test]
  fn test_open_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    let storage = SqliteStorage::open(&path).unwrap();
    storage.set_page_cursor("a", "a", 1).unwrap();
    assert!(path.exists());

    drop(storage);
    let reopened = SqliteStorage::open(&path).unwrap();
    assert_eq!(reopened.page_cursor("a").unwrap(), Some(1));
  }
}
