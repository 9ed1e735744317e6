//! Core traits and types for the caching system.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use super::errors::FetchError;

/// Trait for items that can be cached under an owner.
pub trait CacheItem: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this item within its owner (e.g. a deal id)
  fn cache_key(&self) -> String;

  /// Item type name for storage organization (e.g. "deal", "giveaway")
  fn entity_type() -> &'static str;
}

/// Partition key under which items are grouped and paged.
pub trait OwnerKey: Send + Sync {
  /// Stable identity string, e.g. `deals:1`. Hashed into the partition key.
  fn identity(&self) -> String;

  /// Human-readable description, stored next to the page cursor.
  fn description(&self) -> String;

  /// SHA-256 of the identity, used as the storage partition key.
  fn partition(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.identity().as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// The remote paged API.
#[async_trait]
pub trait PageSource: Send + Sync {
  type Owner: OwnerKey;
  type Item: CacheItem;

  /// Fetch one page. An empty batch means there is nothing at that index.
  async fn fetch_page(
    &self,
    owner: &Self::Owner,
    page: u32,
    page_size: u32,
  ) -> Result<Vec<Self::Item>, FetchError>;
}

/// One persisted item row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRow {
  pub owner: String,
  pub item_key: String,
  pub entity_type: String,
  /// Natural ordering within the owner
  pub position: i64,
  /// Serialized item (JSON)
  pub data: Vec<u8>,
  pub expires_at: DateTime<Utc>,
}

impl CachedRow {
  /// Serialize an item into a row stamped with the given expiry.
  pub fn encode<T: CacheItem>(
    owner: &str,
    item: &T,
    position: i64,
    expires_at: DateTime<Utc>,
  ) -> serde_json::Result<Self> {
    Ok(Self {
      owner: owner.to_string(),
      item_key: item.cache_key(),
      entity_type: T::entity_type().to_string(),
      position,
      data: serde_json::to_vec(item)?,
      expires_at,
    })
  }

  pub fn decode<T: CacheItem>(&self) -> serde_json::Result<T> {
    serde_json::from_slice(&self.data)
  }
}

/// Anything carrying an expiry timestamp.
pub trait Expiring {
  fn expires_at(&self) -> DateTime<Utc>;
}

impl Expiring for CachedRow {
  fn expires_at(&self) -> DateTime<Utc> {
    self.expires_at
  }
}

/// What a `refresh` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
  /// Cached data was fresh, nothing fetched
  Fresh,
  /// Remote data replaced the cached set
  Refreshed { count: usize },
}
