//! Offline-tolerant catalog of game deals, giveaways and release calendars.
//!
//! `cache` holds the feed-agnostic sync engine; `catalog` plugs the concrete
//! remote feeds into it.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod output;
