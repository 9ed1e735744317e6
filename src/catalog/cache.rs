//! Caching implementations for catalog types.

use chrono::NaiveDate;

use crate::cache::{CacheItem, OwnerKey};

use super::types::{Deal, Giveaway, Release};

// ============================================================================
// CacheItem implementations
// ============================================================================

impl CacheItem for Deal {
  fn cache_key(&self) -> String {
    self.deal_id.clone()
  }

  fn entity_type() -> &'static str {
    "deal"
  }
}

impl CacheItem for Giveaway {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "giveaway"
  }
}

impl CacheItem for Release {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "release"
  }
}

// ============================================================================
// Owner keys
// ============================================================================

/// Deals offered by one store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDeals {
  pub store_id: String,
}

impl StoreDeals {
  pub fn new(store_id: &str) -> Self {
    Self {
      store_id: store_id.trim().to_string(),
    }
  }
}

impl OwnerKey for StoreDeals {
  fn identity(&self) -> String {
    format!("deals:{}", self.store_id)
  }

  fn description(&self) -> String {
    format!("deals for store {}", self.store_id)
  }
}

/// Giveaways running on one platform (`None` for every platform)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformGiveaways {
  pub platform: Option<String>,
}

impl PlatformGiveaways {
  pub fn new(platform: Option<&str>) -> Self {
    Self {
      platform: platform
        .map(normalize_platform)
        .filter(|p| !p.is_empty() && p != "all"),
    }
  }
}

impl OwnerKey for PlatformGiveaways {
  fn identity(&self) -> String {
    format!("giveaways:{}", self.platform.as_deref().unwrap_or(""))
  }

  fn description(&self) -> String {
    match &self.platform {
      Some(p) => format!("giveaways on {}", p),
      None => "all giveaways".to_string(),
    }
  }
}

/// Releases dated inside an inclusive window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseWindow {
  pub from: NaiveDate,
  pub to: NaiveDate,
}

impl ReleaseWindow {
  /// Build a window, swapping the bounds if given backwards.
  pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
    if from <= to {
      Self { from, to }
    } else {
      Self { from: to, to: from }
    }
  }

  /// The `dates` query value, e.g. `2024-05-01,2024-05-31`.
  pub fn dates_param(&self) -> String {
    format!("{},{}", self.from, self.to)
  }
}

impl OwnerKey for ReleaseWindow {
  fn identity(&self) -> String {
    format!("releases:{}", self.dates_param())
  }

  fn description(&self) -> String {
    format!("releases from {} to {}", self.from, self.to)
  }
}

/// Normalize a platform name for consistent hashing.
/// Trims whitespace, lowercases, and joins words with dashes.
fn normalize_platform(platform: &str) -> String {
  platform
    .split_whitespace()
    .collect::<Vec<_>>()
    .join("-")
    .to_lowercase()
}
