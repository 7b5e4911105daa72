//! Source of "now" for check-ins. Attendance dates are local calendar dates.

use chrono::{Local, NaiveDateTime};

pub trait Clock: Send + Sync {
  /// The current local date and wall-clock time.
  fn now(&self) -> NaiveDateTime;
}

/// Reads the host clock in the host's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> NaiveDateTime { Local::now().naive_local() }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
  fn now(&self) -> NaiveDateTime { self.0 }
}
