//! Paged read adapter: turns "give me more rows" pulls into engine page loads
//! and publishes per-direction load states.

use tokio::sync::watch;
use tracing::debug;

use super::engine::RefreshEngine;
use super::errors::{CacheError, StoreError};
use super::paging::LoadDirection;
use super::storage::CacheStore;
use super::traits::PageSource;

/// Load state of one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
  NotLoading,
  Loading,
  Error(String),
  EndOfData,
}

/// Load states for every direction of a paged sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStates {
  pub refresh: LoadState,
  pub append: LoadState,
  /// Always `EndOfData`: nothing exists before page 0
  pub prepend: LoadState,
}

impl Default for LoadStates {
  fn default() -> Self {
    Self {
      refresh: LoadState::NotLoading,
      append: LoadState::NotLoading,
      prepend: LoadState::EndOfData,
    }
  }
}

/// Result of one page request as seen by the consumer.
#[derive(Debug)]
pub enum PagingOutcome {
  Success { end_reached: bool },
  Error(CacheError),
}

impl PagingOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, PagingOutcome::Success { .. })
  }

  pub fn end_reached(&self) -> bool {
    matches!(self, PagingOutcome::Success { end_reached: true })
  }
}

/// One paging session over an owner's items.
///
/// The first request of a session loads `Initial`; later requests append.
/// Items are never read here except through `rows()`, which re-queries the
/// store.
pub struct Pager<P: PageSource, S: CacheStore> {
  engine: RefreshEngine<P, S>,
  owner: P::Owner,
  started: bool,
  prefetch_distance: usize,
  last_failed: Option<LoadDirection>,
  /// Set while a load is awaiting; still set afterwards means it was dropped
  in_flight: Option<LoadDirection>,
  states: watch::Sender<LoadStates>,
}

impl<P: PageSource, S: CacheStore> Pager<P, S> {
  pub fn new(engine: RefreshEngine<P, S>, owner: P::Owner) -> Self {
    let (states, _) = watch::channel(LoadStates::default());
    Self {
      engine,
      owner,
      started: false,
      prefetch_distance: 5,
      last_failed: None,
      in_flight: None,
      states,
    }
  }

  pub fn with_prefetch_distance(mut self, distance: usize) -> Self {
    self.prefetch_distance = distance;
    self
  }

  /// Observe load state changes.
  pub fn subscribe(&self) -> watch::Receiver<LoadStates> {
    self.states.subscribe()
  }

  pub fn load_states(&self) -> LoadStates {
    self.states.borrow().clone()
  }

  /// Direction the next pull will use.
  pub fn next_direction(&self) -> LoadDirection {
    if self.started {
      LoadDirection::Append
    } else {
      LoadDirection::Initial
    }
  }

  /// Pull the next page of this session.
  pub async fn request(&mut self) -> PagingOutcome {
    let direction = self.next_direction();
    self.load(direction).await
  }

  /// Call when the consumer shows row `last_visible` out of `loaded` rows.
  ///
  /// Loads the next page once the consumer is within the prefetch distance of
  /// the tail. Returns `None` when nothing was requested.
  pub async fn on_visible(&mut self, last_visible: usize, loaded: usize) -> Option<PagingOutcome> {
    self.settle_cancelled();

    if !self.started {
      let refresh = self.states.borrow().refresh.clone();
      return match refresh {
        LoadState::NotLoading => Some(self.load(LoadDirection::Initial).await),
        LoadState::Loading | LoadState::Error(_) | LoadState::EndOfData => None,
      };
    }

    let append = self.states.borrow().append.clone();
    match append {
      LoadState::NotLoading => {}
      // Errors wait for an explicit retry
      LoadState::Loading | LoadState::Error(_) | LoadState::EndOfData => return None,
    }

    if last_visible + self.prefetch_distance < loaded {
      return None;
    }
    Some(self.load(LoadDirection::Append).await)
  }

  /// Re-issue the last failed load, if any.
  pub async fn retry(&mut self) -> Option<PagingOutcome> {
    self.settle_cancelled();
    let direction = self.last_failed.take()?;
    Some(self.load(direction).await)
  }

  /// Start a new session; the next request reloads from page 0.
  pub fn invalidate(&mut self) {
    self.started = false;
    self.last_failed = None;
    self.in_flight = None;
    self.states.send_replace(LoadStates::default());
  }

  /// The owner's cached items in natural order.
  pub fn rows(&self) -> Result<Vec<P::Item>, StoreError> {
    self.engine.cached(&self.owner)
  }

  /// Load one page in `direction` and map the result.
  pub async fn load(&mut self, direction: LoadDirection) -> PagingOutcome {
    if direction == LoadDirection::Prepend {
      self
        .states
        .send_modify(|s| s.prepend = LoadState::EndOfData);
      return PagingOutcome::Success { end_reached: true };
    }

    self.settle_cancelled();
    self.set_state(direction, LoadState::Loading);
    // Recorded up front so a dropped load can be retried
    self.last_failed = Some(direction);
    self.in_flight = Some(direction);

    let result = self.engine.load_page(&self.owner, direction).await;
    self.in_flight = None;

    match result {
      Ok(result) => {
        self.last_failed = None;
        let next = if result.end_reached {
          LoadState::EndOfData
        } else {
          LoadState::NotLoading
        };
        if direction == LoadDirection::Initial {
          self.started = true;
          self.states.send_modify(|s| {
            s.refresh = LoadState::NotLoading;
            s.append = next;
          });
        } else {
          self.set_state(direction, next);
        }
        debug!(?direction, end_reached = result.end_reached, "page request done");
        PagingOutcome::Success {
          end_reached: result.end_reached,
        }
      }
      Err(e) => {
        self.set_state(direction, LoadState::Error(e.to_string()));
        PagingOutcome::Error(e)
      }
    }
  }

  /// Reset the state left behind by a load whose future was dropped.
  fn settle_cancelled(&mut self) {
    if let Some(direction) = self.in_flight.take() {
      debug!(?direction, "previous load was cancelled");
      self.set_state(direction, LoadState::NotLoading);
    }
  }

  fn set_state(&self, direction: LoadDirection, state: LoadState) {
    self.states.send_modify(|s| match direction {
      LoadDirection::Initial => s.refresh = state,
      LoadDirection::Append => s.append = state,
      LoadDirection::Prepend => s.prepend = state,
    });
  }
}
