//! Generic cache synchronization and paged-fetch engine.
//!
//! This module is feed-agnostic:
//! - Items are cached per owner with a write-time expiry
//! - Staleness is derived at read time from the expiries
//! - Paged owners keep a next-page cursor committed atomically with the items
//! - Stale-while-revalidate: a failed fetch never touches cached data

mod clock;
mod engine;
mod errors;
#[cfg(test)]
mod memory;
mod pager;
mod paging;
mod staleness;
mod storage;
mod traits;

pub use clock::{Clock, SystemClock};
pub use engine::{CachePolicy, OwnerStatus, RefreshEngine};
pub use errors::{CacheError, FetchError, StoreError};
pub use pager::{LoadState, LoadStates, Pager, PagingOutcome};
pub use paging::{LoadDirection, PageResult};
pub use staleness::is_stale;
pub use storage::{CacheStore, SqliteStorage, WriteBatch, WriteOp};
pub use traits::{CacheItem, CachedRow, Expiring, OwnerKey, PageSource, RefreshOutcome};
