//! Error taxonomy for the cache engine.

use thiserror::Error;

/// The remote page source failed. Never partially applied to local state.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("request failed: {0}")]
  Http(String),

  #[error("server returned status {status} for {url}")]
  Status { status: u16, url: String },

  #[error("failed to decode response: {0}")]
  Decode(String),

  #[error("fetch failed: {0}")]
  Other(String),
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      FetchError::Decode(err.to_string())
    } else {
      FetchError::Http(err.to_string())
    }
  }
}

/// The local store failed. The cache may be in an unknown state.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to serialize cached item: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("corrupt cache row: {0}")]
  Corrupt(String),

  #[error("store lock poisoned: {0}")]
  Poisoned(String),

  #[error("store error: {0}")]
  Other(String),
}

/// Any failure of a refresh or page load.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl CacheError {
  pub fn is_fetch(&self) -> bool {
    matches!(self, CacheError::Fetch(_))
  }

  pub fn is_store(&self) -> bool {
    matches!(self, CacheError::Store(_))
  }
}
