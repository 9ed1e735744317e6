//! Serde-deserializable types matching the remote feed responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::NaiveDate;
use serde::Deserialize;

use super::types::{Deal, Giveaway, Release};

/// Parse a numeric field that the API sends as a string.
fn parse_number<T: std::str::FromStr>(value: &str) -> Option<T> {
  value.trim().parse().ok()
}

// ============================================================================
// CheapShark deals
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDeal {
  #[serde(rename = "dealID")]
  pub deal_id: String,
  #[serde(rename = "gameID", default)]
  pub game_id: String,
  #[serde(rename = "storeID", default)]
  pub store_id: String,
  pub title: String,
  #[serde(default)]
  pub sale_price: String,
  #[serde(default)]
  pub normal_price: String,
  #[serde(default)]
  pub savings: String,
  #[serde(default)]
  pub metacritic_score: String,
  #[serde(default)]
  pub steam_rating_percent: String,
  #[serde(default)]
  pub deal_rating: String,
  pub thumb: Option<String>,
}

impl ApiDeal {
  pub fn into_deal(self) -> Deal {
    Deal {
      sale_price: parse_number(&self.sale_price).unwrap_or_default(),
      normal_price: parse_number(&self.normal_price).unwrap_or_default(),
      savings: parse_number(&self.savings).unwrap_or_default(),
      // "0" means no score
      metacritic_score: parse_number(&self.metacritic_score).filter(|s| *s > 0),
      steam_rating_percent: parse_number(&self.steam_rating_percent).filter(|s| *s > 0),
      deal_rating: parse_number(&self.deal_rating),
      thumb: self.thumb.filter(|t| !t.is_empty()),
      deal_id: self.deal_id,
      game_id: self.game_id,
      store_id: self.store_id,
      title: self.title,
    }
  }
}

// ============================================================================
// GamerPower giveaways
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiGiveaway {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub worth: String,
  #[serde(rename = "type", default)]
  pub kind: String,
  #[serde(default)]
  pub platforms: String,
  #[serde(default)]
  pub open_giveaway_url: String,
  #[serde(default)]
  pub gamerpower_url: String,
  pub thumbnail: Option<String>,
  pub end_date: Option<String>,
  #[serde(default)]
  pub users: u64,
}

/// Sent with HTTP 201 when a platform has nothing running.
#[derive(Debug, Deserialize)]
pub struct ApiStatusMessage {
  pub status_message: String,
}

fn not_applicable(value: &str) -> bool {
  value.trim().is_empty() || value.trim().eq_ignore_ascii_case("n/a")
}

impl ApiGiveaway {
  pub fn into_giveaway(self) -> Giveaway {
    let url = if self.open_giveaway_url.is_empty() {
      self.gamerpower_url
    } else {
      self.open_giveaway_url
    };

    Giveaway {
      id: self.id,
      title: self.title,
      worth: (!not_applicable(&self.worth)).then_some(self.worth),
      kind: self.kind,
      platforms: self
        .platforms
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect(),
      url,
      thumbnail: self.thumbnail.filter(|t| !t.is_empty()),
      end_date: self.end_date.filter(|d| !not_applicable(d)),
      users: self.users,
    }
  }
}

// ============================================================================
// RAWG release calendar
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiReleasesResponse {
  #[serde(default)]
  pub results: Vec<ApiRelease>,
}

#[derive(Debug, Deserialize)]
pub struct ApiRelease {
  pub id: u64,
  #[serde(default)]
  pub slug: String,
  pub name: String,
  pub released: Option<String>,
  #[serde(default)]
  pub rating: f64,
  pub metacritic: Option<u32>,
  pub background_image: Option<String>,
  #[serde(default)]
  pub platforms: Option<Vec<ApiPlatformEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPlatformEntry {
  pub platform: ApiPlatform,
}

#[derive(Debug, Deserialize)]
pub struct ApiPlatform {
  pub name: String,
}

impl ApiRelease {
  pub fn into_release(self) -> Release {
    Release {
      id: self.id,
      slug: self.slug,
      name: self.name,
      released: self
        .released
        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
      rating: self.rating,
      metacritic: self.metacritic,
      platforms: self
        .platforms
        .unwrap_or_default()
        .into_iter()
        .map(|p| p.platform.name)
        .collect(),
      background_image: self.background_image,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deal_parses_string_numbers() {
    let json = r#"{
      "internalName": "PORTAL2",
      "title": "Portal 2",
      "dealID": "abc%3D",
      "storeID": "1",
      "gameID": "7",
      "salePrice": "1.99",
      "normalPrice": "9.99",
      "isOnSale": "1",
      "savings": "80.080080",
      "metacriticScore": "95",
      "steamRatingPercent": "0",
      "dealRating": "9.8",
      "thumb": "https://example.test/portal.jpg"
    }"#;

    let deal = serde_json::from_str::<ApiDeal>(json).unwrap().into_deal();

    assert_eq!(deal.deal_id, "abc%3D");
    assert_eq!(deal.sale_price, 1.99);
    assert_eq!(deal.normal_price, 9.99);
    assert!((deal.savings - 80.08).abs() < 0.01);
    assert_eq!(deal.metacritic_score, Some(95));
    assert_eq!(deal.steam_rating_percent, None);
    assert_eq!(deal.deal_rating, Some(9.8));
  }

  #[test]
  fn test_giveaway_normalizes_placeholders() {
    let json = r#"{
      "id": 2731,
      "title": "Lost Castle (Epic Games) Giveaway",
      "worth": "N/A",
      "thumbnail": "https://example.test/2731.jpg",
      "type": "Game",
      "platforms": "PC, Epic Games Store",
      "end_date": "N/A",
      "users": 5310,
      "open_giveaway_url": "https://example.test/open/2731",
      "gamerpower_url": "https://example.test/2731"
    }"#;

    let giveaway = serde_json::from_str::<ApiGiveaway>(json)
      .unwrap()
      .into_giveaway();

    assert_eq!(giveaway.worth, None);
    assert_eq!(giveaway.end_date, None);
    assert_eq!(giveaway.platforms, vec!["PC", "Epic Games Store"]);
    assert_eq!(giveaway.url, "https://example.test/open/2731");
  }

  #[test]
  fn test_release_page_parses() {
    let json = r#"{
      "count": 2,
      "next": null,
      "results": [
        {
          "id": 1,
          "slug": "hades-ii",
          "name": "Hades II",
          "released": "2024-05-06",
          "rating": 4.4,
          "metacritic": null,
          "background_image": null,
          "platforms": [{"platform": {"id": 4, "name": "PC"}}]
        },
        {"id": 2, "name": "Untitled", "released": null, "platforms": null}
      ]
    }"#;

    let page: ApiReleasesResponse = serde_json::from_str(json).unwrap();
    let releases: Vec<Release> = page
      .results
      .into_iter()
      .map(ApiRelease::into_release)
      .collect();

    assert_eq!(releases.len(), 2);
    assert_eq!(
      releases[0].released,
      NaiveDate::from_ymd_opt(2024, 5, 6)
    );
    assert_eq!(releases[0].platforms, vec!["PC"]);
    assert_eq!(releases[1].released, None);
    assert!(releases[1].platforms.is_empty());
  }
}
