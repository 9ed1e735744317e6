//! Catalog service wiring one refresh engine per feed over a shared store.

use chrono::Duration;
use color_eyre::Result;
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::cache::{
  CacheError, CachePolicy, CacheStore, OwnerStatus, Pager, RefreshEngine, RefreshOutcome,
  SqliteStorage, StoreError,
};
use crate::config::Config;

use super::cache::{PlatformGiveaways, ReleaseWindow, StoreDeals};
use super::client::CatalogClient;
use super::sources::{DealsSource, GiveawaysSource, ReleasesSource};
use super::types::Giveaway;

/// Offline-tolerant access to every catalog feed.
pub struct CatalogService<S: CacheStore = SqliteStorage> {
  deals: RefreshEngine<DealsSource, S>,
  giveaways: RefreshEngine<GiveawaysSource, S>,
  releases: RefreshEngine<ReleasesSource, S>,
  prefetch_distance: usize,
}

impl CatalogService<SqliteStorage> {
  /// Create the service from configuration, opening the cache database.
  pub fn new(config: &Config) -> Result<Self> {
    let path = match &config.cache.database {
      Some(path) => path.clone(),
      None => SqliteStorage::default_path()?,
    };
    let storage = Arc::new(SqliteStorage::open(&path)?);
    let client = CatalogClient::new(&config.sources)?;

    // Only the release calendar needs a key; the other feeds work without it
    let api_key = Config::get_releases_api_key().ok();

    Ok(Self::with_store(config, client, api_key, storage))
  }
}

impl<S: CacheStore> CatalogService<S> {
  pub fn with_store(
    config: &Config,
    client: CatalogClient,
    releases_api_key: Option<String>,
    store: Arc<S>,
  ) -> Self {
    let policy = CachePolicy {
      ttl: Duration::hours(config.cache.ttl_hours),
      page_size: config.cache.page_size,
    };

    Self {
      deals: RefreshEngine::new(
        Arc::new(DealsSource::new(client.clone())),
        Arc::clone(&store),
      )
      .with_policy(policy),
      giveaways: RefreshEngine::new(
        Arc::new(GiveawaysSource::new(client.clone())),
        Arc::clone(&store),
      )
      .with_policy(policy),
      releases: RefreshEngine::new(
        Arc::new(ReleasesSource::new(client, releases_api_key)),
        store,
      )
      .with_policy(policy),
      prefetch_distance: config.cache.prefetch_distance,
    }
  }

  /// A paging session over one store's deals.
  pub fn deals_pager(&self, store_id: &str) -> Pager<DealsSource, S> {
    Pager::new(self.deals.clone(), StoreDeals::new(store_id))
      .with_prefetch_distance(self.prefetch_distance)
  }

  /// A paging session over the release calendar.
  pub fn releases_pager(&self, window: ReleaseWindow) -> Pager<ReleasesSource, S> {
    Pager::new(self.releases.clone(), window).with_prefetch_distance(self.prefetch_distance)
  }

  /// Pull-to-refresh for a store's deals.
  pub async fn refresh_deals(
    &self,
    store_id: &str,
    force: bool,
  ) -> Result<RefreshOutcome, CacheError> {
    self.deals.refresh(&StoreDeals::new(store_id), force).await
  }

  pub async fn refresh_giveaways(
    &self,
    platform: Option<&str>,
    force: bool,
  ) -> Result<RefreshOutcome, CacheError> {
    self
      .giveaways
      .refresh(&PlatformGiveaways::new(platform), force)
      .await
  }

  /// Refresh several platforms concurrently. Failures are reported per platform.
  pub async fn refresh_many_giveaways(
    &self,
    platforms: &[String],
    force: bool,
  ) -> Vec<(String, Result<RefreshOutcome, CacheError>)> {
    let owners: Vec<PlatformGiveaways> = platforms
      .iter()
      .map(|p| PlatformGiveaways::new(Some(p)))
      .collect();

    let results = join_all(
      owners
        .iter()
        .map(|owner| self.giveaways.refresh(owner, force)),
    )
    .await;

    platforms
      .iter()
      .cloned()
      .zip(results)
      .inspect(|(platform, result)| {
        if let Err(e) = result {
          warn!(platform = %platform, error = %e, "giveaway refresh failed");
        }
      })
      .collect()
  }

  /// Cached giveaways for a platform, whatever their freshness.
  pub fn giveaways(&self, platform: Option<&str>) -> Result<Vec<Giveaway>, StoreError> {
    self.giveaways.cached(&PlatformGiveaways::new(platform))
  }

  pub fn deals_status(&self, store_id: &str) -> Result<OwnerStatus, StoreError> {
    self.deals.status(&StoreDeals::new(store_id))
  }

  pub fn giveaways_status(&self, platform: Option<&str>) -> Result<OwnerStatus, StoreError> {
    self.giveaways.status(&PlatformGiveaways::new(platform))
  }

  pub fn releases_status(&self, window: ReleaseWindow) -> Result<OwnerStatus, StoreError> {
    self.releases.status(&window)
  }
}

impl<S: CacheStore + 'static> CatalogService<S> {
  /// Fire-and-observe giveaway refresh.
  pub fn spawn_refresh_giveaways(
    &self,
    platform: Option<&str>,
    force: bool,
  ) -> JoinHandle<Result<RefreshOutcome, CacheError>> {
    self
      .giveaways
      .spawn_refresh(PlatformGiveaways::new(platform), force)
  }

  /// Fire-and-observe deals refresh.
  pub fn spawn_refresh_deals(
    &self,
    store_id: &str,
    force: bool,
  ) -> JoinHandle<Result<RefreshOutcome, CacheError>> {
    self.deals.spawn_refresh(StoreDeals::new(store_id), force)
  }
}
