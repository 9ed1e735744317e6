//! Remote page sources for each catalog feed.

use async_trait::async_trait;

use crate::cache::{FetchError, PageSource};

use super::cache::{PlatformGiveaways, ReleaseWindow, StoreDeals};
use super::client::CatalogClient;
use super::types::{Deal, Giveaway, Release};

/// CheapShark deals, paged per store.
pub struct DealsSource {
  client: CatalogClient,
}

impl DealsSource {
  pub fn new(client: CatalogClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl PageSource for DealsSource {
  type Owner = StoreDeals;
  type Item = Deal;

  async fn fetch_page(
    &self,
    owner: &StoreDeals,
    page: u32,
    page_size: u32,
  ) -> Result<Vec<Deal>, FetchError> {
    self
      .client
      .get_deals(&owner.store_id, page, page_size)
      .await
  }
}

/// GamerPower giveaways. The feed is not paged: everything is on page 0.
pub struct GiveawaysSource {
  client: CatalogClient,
}

impl GiveawaysSource {
  pub fn new(client: CatalogClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl PageSource for GiveawaysSource {
  type Owner = PlatformGiveaways;
  type Item = Giveaway;

  async fn fetch_page(
    &self,
    owner: &PlatformGiveaways,
    page: u32,
    _page_size: u32,
  ) -> Result<Vec<Giveaway>, FetchError> {
    if page > 0 {
      return Ok(Vec::new());
    }
    self.client.get_giveaways(owner.platform.as_deref()).await
  }
}

/// RAWG release calendar, paged per date window.
pub struct ReleasesSource {
  client: CatalogClient,
  api_key: Option<String>,
}

impl ReleasesSource {
  pub fn new(client: CatalogClient, api_key: Option<String>) -> Self {
    Self { client, api_key }
  }
}

#[async_trait]
impl PageSource for ReleasesSource {
  type Owner = ReleaseWindow;
  type Item = Release;

  async fn fetch_page(
    &self,
    owner: &ReleaseWindow,
    page: u32,
    page_size: u32,
  ) -> Result<Vec<Release>, FetchError> {
    let api_key = self.api_key.as_deref().ok_or_else(|| {
      FetchError::Other("release calendar API key not set (DEALDECK_RAWG_KEY)".to_string())
    })?;

    // Remote pages start at 1
    self
      .client
      .get_releases(owner, page + 1, page_size, api_key)
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::client::tests::{client_for, CannedServer};
  use chrono::NaiveDate;

  fn window() -> ReleaseWindow {
    ReleaseWindow::new(
      NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
      NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
  }

  #[tokio::test]
  async fn test_giveaways_beyond_first_page_are_empty() {
    let server = CannedServer::start(200, "[]").await;
    let source = GiveawaysSource::new(client_for(&server));

    let items = source
      .fetch_page(&PlatformGiveaways::new(Some("pc")), 1, 20)
      .await
      .unwrap();

    assert!(items.is_empty());
    assert!(server.requests().is_empty());
  }

  #[tokio::test]
  async fn test_releases_map_to_one_based_pages() {
    let server = CannedServer::start(200, r#"{"results":[]}"#).await;
    let source = ReleasesSource::new(client_for(&server), Some("k".to_string()));

    source.fetch_page(&window(), 0, 20).await.unwrap();

    assert!(server.requests()[0].contains("page=1"));
  }

  #[tokio::test]
  async fn test_releases_without_key_fail_before_request() {
    let server = CannedServer::start(200, r#"{"results":[]}"#).await;
    let source = ReleasesSource::new(client_for(&server), None);

    let err = source.fetch_page(&window(), 0, 20).await.unwrap_err();

    assert!(matches!(err, FetchError::Other(_)));
    assert!(server.requests().is_empty());
  }
}
