//! Plain-text rendering of cached catalog rows.

use crate::cache::OwnerStatus;
use crate::catalog::types::{Deal, Giveaway, Release};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn deal_line(deal: &Deal) -> String {
  let score = deal
    .metacritic_score
    .map(|s| format!("mc {:>3}", s))
    .unwrap_or_else(|| "mc   -".to_string());
  format!(
    "{:<40} {:>7.2} (was {:>6.2}, -{:>2.0}%)  {}",
    truncate(&deal.title, 40),
    deal.sale_price,
    deal.normal_price,
    deal.savings,
    score
  )
}

pub fn giveaway_line(giveaway: &Giveaway) -> String {
  format!(
    "{:<48} {:<8} {:>8}  ends {}",
    truncate(&giveaway.title, 48),
    giveaway.kind,
    giveaway.worth.as_deref().unwrap_or("free"),
    giveaway.end_date.as_deref().unwrap_or("-")
  )
}

pub fn release_line(release: &Release) -> String {
  let date = release
    .released
    .map(|d| d.to_string())
    .unwrap_or_else(|| "TBA".to_string());
  format!(
    "{}  {:<40} {}",
    date,
    truncate(&release.name, 40),
    release.platforms.join(", ")
  )
}

pub fn status_line(label: &str, status: &OwnerStatus) -> String {
  let cursor = status
    .cursor
    .map(|c| format!("next page {}", c))
    .unwrap_or_else(|| "not paged".to_string());
  let freshness = if status.stale { "stale" } else { "fresh" };
  format!("{}: {} cached, {}, {}", label, status.cached, cursor, freshness)
}
