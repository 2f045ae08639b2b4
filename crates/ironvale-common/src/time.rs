//! Simulation clock timestamps.

use serde::{Deserialize, Serialize};
use std::ops::Add;
use std::time::Duration;

/// A point on the simulation clock, measured from simulation start.
///
/// All deadlines (cooldowns, combat timeouts, respawns) are `SimTime`
/// values compared against the current tick time; no wall-clock timers are
/// involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(Duration);

impl SimTime {
    /// Simulation start.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Creates a timestamp from a duration since simulation start.
    #[must_use]
    pub const fn from_duration(since_start: Duration) -> Self {
        Self(since_start)
    }

    /// Creates a timestamp from milliseconds since simulation start.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Creates a timestamp from seconds since simulation start.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Returns the duration since simulation start.
    #[must_use]
    pub const fn since_start(self) -> Duration {
        self.0
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is in the future.
    #[must_use]
    pub fn saturating_since(self, earlier: SimTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns true once `deadline` has been reached.
    #[must_use]
    pub fn has_reached(self, deadline: SimTime) -> bool {
        self >= deadline
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0.saturating_add(rhs))
    }
}
