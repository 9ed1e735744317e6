//! Clock abstraction so staleness can be tested without sleeping.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// `Clock` backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
  now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
  pub fn at(now: DateTime<Utc>) -> Self {
    Self {
      now: std::sync::Mutex::new(now),
    }
  }

  pub fn advance(&self, by: chrono::Duration) {
    let mut now = self.now.lock().unwrap();
    *now += by;
  }
}

#[cfg(test)]
impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap()
  }
}
