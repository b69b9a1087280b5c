//! Single-flight guard
//!
//! At most one logical interaction (user turn, staged system sequence, or
//! error report) may be in flight per session.

use serde::Serialize;
use std::fmt;

/// Identifier of one flight, monotonic per session
///
/// Every asynchronous outcome carries the id of the flight that produced it;
/// outcomes for any other flight are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FlightId(pub u64);

impl fmt::Display for FlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flight-{}", self.0)
    }
}

/// Mutex-like gate over remote interactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingleFlightGuard {
    held: bool,
}

impl SingleFlightGuard {
    /// Take the guard. Returns `false` without side effects if already held.
    pub fn acquire(&mut self) -> bool {
        if self.held {
            return false;
        }
        self.held = true;
        true
    }

    /// Release the guard. Idempotent.
    pub fn release(&mut self) {
        self.held = false;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}
