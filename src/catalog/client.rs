use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::FetchError;
use crate::config::SourcesConfig;

use super::api_types::{ApiDeal, ApiGiveaway, ApiRelease, ApiReleasesResponse, ApiStatusMessage};
use super::cache::ReleaseWindow;
use super::types::{Deal, Giveaway, Release};

/// HTTP client for the catalog feeds
#[derive(Clone)]
pub struct CatalogClient {
  http: reqwest::Client,
  sources: SourcesConfig,
}

impl CatalogClient {
  pub fn new(sources: &SourcesConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(sources.timeout_secs))
      .user_agent(concat!("dealdeck/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      sources: sources.clone(),
    })
  }

  /// Get one page of deals for a store (0-based pages)
  pub async fn get_deals(
    &self,
    store_id: &str,
    page: u32,
    page_size: u32,
  ) -> Result<Vec<Deal>, FetchError> {
    let mut url = endpoint(&self.sources.deals_url, "deals")?;
    url
      .query_pairs_mut()
      .append_pair("storeID", store_id)
      .append_pair("pageNumber", &page.to_string())
      .append_pair("pageSize", &page_size.to_string());

    let response = self.http.get(url.clone()).send().await?;
    let deals: Vec<ApiDeal> = decode(url, response).await?;

    Ok(deals.into_iter().map(ApiDeal::into_deal).collect())
  }

  /// Get every running giveaway, optionally for one platform
  pub async fn get_giveaways(&self, platform: Option<&str>) -> Result<Vec<Giveaway>, FetchError> {
    let mut url = endpoint(&self.sources.giveaways_url, "giveaways")?;
    if let Some(p) = platform {
      url.query_pairs_mut().append_pair("platform", p);
    }

    let response = self.http.get(url.clone()).send().await?;

    // 201 carries a status message instead of a list
    if response.status() == StatusCode::CREATED {
      let message: ApiStatusMessage = response.json().await?;
      debug!(platform = ?platform, message = %message.status_message, "no active giveaways");
      return Ok(Vec::new());
    }

    let giveaways: Vec<ApiGiveaway> = decode(url, response).await?;
    Ok(
      giveaways
        .into_iter()
        .map(ApiGiveaway::into_giveaway)
        .collect(),
    )
  }

  /// Get releases inside a window (1-based remote pages)
  pub async fn get_releases(
    &self,
    window: &ReleaseWindow,
    page: u32,
    page_size: u32,
    api_key: &str,
  ) -> Result<Vec<Release>, FetchError> {
    let mut url = endpoint(&self.sources.releases_url, "games")?;
    url
      .query_pairs_mut()
      .append_pair("key", api_key)
      .append_pair("dates", &window.dates_param())
      .append_pair("ordering", "released")
      .append_pair("page", &page.to_string())
      .append_pair("page_size", &page_size.to_string());

    let response = self.http.get(url.clone()).send().await?;

    // Past the last page the API answers 404
    if response.status() == StatusCode::NOT_FOUND {
      debug!(page, "release calendar exhausted");
      return Ok(Vec::new());
    }

    let body: ApiReleasesResponse = decode(url, response).await?;
    Ok(
      body
        .results
        .into_iter()
        .map(ApiRelease::into_release)
        .collect(),
    )
  }
}

fn endpoint(base: &str, path: &str) -> Result<Url, FetchError> {
  let raw = format!("{}/{}", base.trim_end_matches('/'), path);
  Url::parse(&raw).map_err(|e| FetchError::Other(format!("invalid url {}: {}", raw, e)))
}

async fn decode<T: DeserializeOwned>(url: Url, response: reqwest::Response) -> Result<T, FetchError> {
  let status = response.status();
  if !status.is_success() {
    let mut url = url;
    // Keep API keys out of error messages
    url.set_query(None);
    return Err(FetchError::Status {
      status: status.as_u16(),
      url: url.to_string(),
    });
  }

  let bytes = response.bytes().await?;
  serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  /// Answers every connection with the same canned response and records
  /// request lines.
  pub struct CannedServer {
    pub base: String,
    requests: Arc<Mutex<Vec<String>>>,
  }

  impl CannedServer {
    pub async fn start(status: u16, body: &str) -> Self {
      let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
      let base = format!("http://{}", listener.local_addr().unwrap());
      let requests = Arc::new(Mutex::new(Vec::new()));
      let seen = Arc::clone(&requests);
      let response = format!(
        "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
      );

      tokio::spawn(async move {
        loop {
          let Ok((mut socket, _)) = listener.accept().await else {
            break;
          };
          let mut buf = vec![0u8; 8192];
          let n = socket.read(&mut buf).await.unwrap_or(0);
          let head = String::from_utf8_lossy(&buf[..n]).to_string();
          if let Some(line) = head.lines().next() {
            seen.lock().unwrap().push(line.to_string());
          }
          let _ = socket.write_all(response.as_bytes()).await;
          let _ = socket.shutdown().await;
        }
      });

      Self { base, requests }
    }

    pub fn requests(&self) -> Vec<String> {
      self.requests.lock().unwrap().clone()
    }
  }

  pub fn client_for(server: &CannedServer) -> CatalogClient {
    CatalogClient::new(&SourcesConfig {
      deals_url: server.base.clone(),
      giveaways_url: server.base.clone(),
      releases_url: format!("{}/", server.base),
      timeout_secs: 5,
    })
    .unwrap()
  }

  #[tokio::test]
  async fn test_get_deals_sends_paging_params() {
    let server = CannedServer::start(
      200,
      r#"[{"dealID":"d1","gameID":"g1","storeID":"1","title":"Celeste","salePrice":"4.99","normalPrice":"19.99","savings":"75.03","metacriticScore":"92","steamRatingPercent":"97","dealRating":"10.0","thumb":""}]"#,
    )
    .await;
    let client = client_for(&server);

    let deals = client.get_deals("1", 2, 30).await.unwrap();

    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].title, "Celeste");
    assert_eq!(deals[0].thumb, None);
    let request = &server.requests()[0];
    assert!(request.starts_with("GET /deals?"));
    assert!(request.contains("storeID=1"));
    assert!(request.contains("pageNumber=2"));
    assert!(request.contains("pageSize=30"));
  }

  #[tokio::test]
  async fn test_server_error_is_status_error() {
    let server = CannedServer::start(503, "{}").await;
    let client = client_for(&server);

    let err = client.get_deals("1", 0, 20).await.unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 503, .. }));
  }

  #[tokio::test]
  async fn test_bad_json_is_decode_error() {
    let server = CannedServer::start(200, r#"{"not":"a list"}"#).await;
    let client = client_for(&server);

    let err = client.get_deals("1", 0, 20).await.unwrap_err();

    assert!(matches!(err, FetchError::Decode(_)));
  }

  #[tokio::test]
  async fn test_giveaways_created_status_means_empty() {
    let server = CannedServer::start(
      201,
      r#"{"status":0,"status_message":"No active giveaways available at the moment, please try again later."}"#,
    )
    .await;
    let client = client_for(&server);

    let giveaways = client.get_giveaways(Some("pc")).await.unwrap();

    assert!(giveaways.is_empty());
    assert!(server.requests()[0].contains("platform=pc"));
  }

  #[tokio::test]
  async fn test_releases_past_last_page_is_empty() {
    let server = CannedServer::start(404, r#"{"detail":"Invalid page."}"#).await;
    let client = client_for(&server);
    let window = ReleaseWindow::new(
      chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
      chrono::NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
    );

    let releases = client.get_releases(&window, 9, 20, "secret").await.unwrap();

    assert!(releases.is_empty());
    let request = &server.requests()[0];
    assert!(request.starts_with("GET /games?"));
    assert!(request.contains("page=9"));
    assert!(request.contains("dates=2024-05-01%2C2024-05-31"));
  }

  #[tokio::test]
  async fn test_status_error_hides_query() {
    let server = CannedServer::start(401, "{}").await;
    let client = client_for(&server);
    let window = ReleaseWindow::new(
      chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
      chrono::NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
    );

    let err = client.get_releases(&window, 1, 20, "secret").await.unwrap_err();

    assert!(!err.to_string().contains("secret"));
  }
}
