//! Time-based cache invalidity.

use chrono::{DateTime, Utc};

use super::traits::Expiring;

/// True when `items` is empty or any item expired strictly before `now`.
///
/// A single expired item marks the whole owner-scoped set stale, so refreshes
/// are all-or-nothing.
pub fn is_stale<I>(items: &[I], now: DateTime<Utc>) -> bool
where
  I: Expiring,
{
  items.is_empty() || items.iter().any(|item| item.expires_at() < now)
}
