use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};

/// Time source injected into the coalescer and the cache.
///
/// `Manual` shares its instant between clones, so a test can hand one clone to
/// the engine and advance the other.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
    Manual(Arc<RwLock<DateTime<Utc>>>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns a shared, advanceable clock starting at `at`.
    #[must_use]
    pub fn manual(at: DateTime<Utc>) -> Self {
        Self::Manual(Arc::new(RwLock::new(at)))
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
            Clock::Manual(shared) => *shared.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Current time as milliseconds since the Unix epoch.
    #[must_use]
    pub fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }

    /// Advance a fixed or manual clock by `delta`.
    ///
    /// Has no effect on `Clock::Default`. Advancing a `Manual` clock is
    /// visible through every clone.
    pub fn advance(&mut self, delta: Duration) {
        match self {
            Clock::Default => {}
            Clock::Fixed(t) => *t += delta,
            Clock::Manual(shared) => {
                let mut guard = shared.write().unwrap_or_else(PoisonError::into_inner);
                *guard += delta;
            }
        }
    }

    /// Returns true if this clock represents real time.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Clock::Default)
    }
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock::Manual` starting at the deterministic test timestamp.
#[must_use]
pub fn manual_clock() -> Clock {
    Clock::manual(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_through_clones() {
        let mut driver = manual_clock();
        let observer = driver.clone();

        driver.advance(Duration::minutes(3));

        assert_eq!(observer.now(), fixed_now() + Duration::minutes(3));
    }

    #[test]
    fn fixed_clock_advance_is_local() {
        let mut clock = Clock::fixed(fixed_now());
        let copy = clock.clone();
        clock.advance(Duration::seconds(1));
        assert_eq!(copy.now(), fixed_now());
        assert_eq!(clock.now_millis(), FIXED_TEST_TIMESTAMP * 1000 + 1000);
    }
}
