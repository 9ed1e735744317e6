//! Game catalog feeds: deals, giveaways and the release calendar.

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod sources;
pub mod types;
