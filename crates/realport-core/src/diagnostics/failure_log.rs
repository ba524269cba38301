//! Hourly suppression of repeated connection failures.
//!
//! During an outage the manager retries every ten seconds.  Logging each
//! attempt would write hundreds of identical lines per hour, so only the
//! first failure of a kind is reported, and then again once an hour has
//! passed or a different kind of failure was seen in between.

use std::time::{Duration, Instant};

use super::events::FailureKind;

/// Minimum gap between two reports of the same failure kind.
pub const REPEAT_SUPPRESSION: Duration = Duration::from_secs(3600);

/// Remembers the last reported failure.
///
/// The clock is passed in by the caller so tests can step time freely.
#[derive(Debug, Default, Clone)]
pub struct FailureLog {
    last: Option<(FailureKind, Instant)>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when a failure of `kind` observed at `now` should be
    /// logged, and records it as the last report if so.
    pub fn should_report(&mut self, kind: FailureKind, now: Instant) -> bool {
        if let Some((last_kind, at)) = self.last {
            if last_kind == kind && now.saturating_duration_since(at) < REPEAT_SUPPRESSION {
                return false;
            }
        }
        self.last = Some((kind, now));
        true
    }

    /// Forgets the last report.  Called after a successful connect so the
    /// next outage is logged immediately.
    pub fn clear(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_is_reported() {
        let mut log = FailureLog::new();
        assert!(log.should_report(FailureKind::Resolve, Instant::now()));
    }

    #[test]
    fn test_repeat_within_an_hour_is_suppressed() {
        // Arrange
        let mut log = FailureLog::new();
        let t0 = Instant::now();
        log.should_report(FailureKind::Connect, t0);

        // Act
        let ten_secs = log.should_report(FailureKind::Connect, t0 + Duration::from_secs(10));
        let almost = log.should_report(FailureKind::Connect, t0 + Duration::from_secs(3599));
        let hour = log.should_report(FailureKind::Connect, t0 + REPEAT_SUPPRESSION);

        // Assert
        assert!(!ten_secs);
        assert!(!almost);
        assert!(hour);
    }

    #[test]
    fn test_suppression_window_restarts_from_last_report() {
        let mut log = FailureLog::new();
        let t0 = Instant::now();
        log.should_report(FailureKind::Connect, t0);
        log.should_report(FailureKind::Connect, t0 + REPEAT_SUPPRESSION);

        assert!(!log.should_report(
            FailureKind::Connect,
            t0 + REPEAT_SUPPRESSION + Duration::from_secs(60)
        ));
    }

    #[test]
    fn test_different_kind_is_reported_immediately() {
        let mut log = FailureLog::new();
        let t0 = Instant::now();
        log.should_report(FailureKind::Resolve, t0);

        assert!(log.should_report(FailureKind::Connect, t0 + Duration::from_secs(10)));
        // Switching back counts as a new message too.
        assert!(log.should_report(FailureKind::Resolve, t0 + Duration::from_secs(20)));
    }

    #[test]
    fn test_clear_resets_suppression() {
        let mut log = FailureLog::new();
        let t0 = Instant::now();
        log.should_report(FailureKind::Connect, t0);

        log.clear();

        assert!(log.should_report(FailureKind::Connect, t0 + Duration::from_secs(10)));
    }
}
