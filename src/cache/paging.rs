//! Load directions and the page-fetch plans they map to.

/// Direction of a pull-based page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadDirection {
  /// First load of a session; starts over from page 0
  Initial,
  /// Continue after the last committed page
  Append,
  /// Earlier than page 0; never available
  Prepend,
}

/// What a load direction asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePlan {
  /// Nothing exists in this direction
  NoMoreData,
  /// Fetch page 0 and replace the owner's items and cursor
  Restart,
  /// Fetch the page at the stored cursor and append
  Continue,
}

impl LoadDirection {
  pub fn plan(self) -> PagePlan {
    match self {
      LoadDirection::Initial => PagePlan::Restart,
      LoadDirection::Append => PagePlan::Continue,
      LoadDirection::Prepend => PagePlan::NoMoreData,
    }
  }
}

/// A concrete remote request resolved from a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFetch {
  pub page: u32,
  /// Clear the owner's items and cursor before inserting
  pub replace: bool,
}

impl PagePlan {
  /// Resolve against the stored cursor. `Restart` ignores it; a missing
  /// cursor means page 0.
  pub fn resolve(self, cursor: Option<u32>) -> Option<PageFetch> {
    match self {
      PagePlan::NoMoreData => None,
      PagePlan::Restart => Some(PageFetch {
        page: 0,
        replace: true,
      }),
      PagePlan::Continue => Some(PageFetch {
        page: cursor.unwrap_or(0),
        replace: false,
      }),
    }
  }

  /// Whether resolving needs the stored cursor at all.
  pub fn reads_cursor(self) -> bool {
    matches!(self, PagePlan::Continue)
  }
}

impl PageFetch {
  /// Cursor value to commit once this page landed.
  pub fn next_cursor(&self) -> u32 {
    self.page + 1
  }

  /// Position of the first item of this page in the owner's natural order.
  pub fn first_position(&self, page_size: u32) -> i64 {
    i64::from(self.page) * i64::from(page_size)
  }
}

/// Outcome of a successful `load_page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageResult {
  /// Page index that was fetched, if any
  pub page: Option<u32>,
  /// Number of items in the fetched batch
  pub fetched: usize,
  /// No further pages in this direction
  pub end_reached: bool,
}

impl PageResult {
  pub fn no_more_data() -> Self {
    Self {
      page: None,
      fetched: 0,
      end_reached: true,
    }
  }

  pub fn fetched(page: u32, fetched: usize) -> Self {
    Self {
      page: Some(page),
      fetched,
      end_reached: fetched == 0,
    }
  }
}
