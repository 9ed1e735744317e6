use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A discounted game offered by one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
  pub deal_id: String,
  pub game_id: String,
  pub store_id: String,
  pub title: String,
  pub sale_price: f64,
  pub normal_price: f64,
  /// Percentage off the normal price
  pub savings: f64,
  pub metacritic_score: Option<u32>,
  pub steam_rating_percent: Option<u32>,
  pub deal_rating: Option<f64>,
  pub thumb: Option<String>,
}

/// A free-game or loot giveaway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Giveaway {
  pub id: u64,
  pub title: String,
  /// Display worth, e.g. "$19.99"; `None` when the feed says "N/A"
  pub worth: Option<String>,
  pub kind: String,
  pub platforms: Vec<String>,
  pub url: String,
  pub thumbnail: Option<String>,
  pub end_date: Option<String>,
  pub users: u64,
}

/// A release-calendar entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
  pub id: u64,
  pub slug: String,
  pub name: String,
  pub released: Option<NaiveDate>,
  pub rating: f64,
  pub metacritic: Option<u32>,
  pub platforms: Vec<String>,
  pub background_image: Option<String>,
}
