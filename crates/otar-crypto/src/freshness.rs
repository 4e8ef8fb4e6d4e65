//! Freshness markers for replay detection.
//!
//! A freshness marker is the UTC creation time of a plaintext, embedded in
//! the message by the sender and checked against the receiver's clock. The
//! check is pure and stateless: a marker is fresh iff its age (in either
//! direction, to tolerate clock skew) is strictly inside the configured
//! window.
//!
//! The window is a data-validity deadline for the message, not an execution
//! timeout for any operation.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Render format for markers: microsecond precision, UTC.
const MARKER_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Parse format accepts any sub-second fraction length.
const MARKER_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Embedded creation time of a plaintext.
///
/// Generated at encrypt time, checked and discarded at decrypt time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessMarker(DateTime<Utc>);

impl FreshnessMarker {
    /// Marker for the current instant.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Marker for an explicit instant.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp)
    }

    /// The marked instant.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    /// Render to the embedded textual form.
    pub fn render(&self) -> String {
        self.0.format(MARKER_FORMAT).to_string()
    }

    /// Parse a marker previously produced by [`render`](Self::render).
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let naive = NaiveDateTime::parse_from_str(s, MARKER_PARSE_FORMAT)?;
        Ok(Self(naive.and_utc()))
    }

    /// Absolute distance between the marker and `now`.
    ///
    /// A marker ahead of `now` (sender clock runs fast) counts the same as
    /// one behind it.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.0).abs().to_std().unwrap_or(Duration::MAX)
    }
}

/// True iff `marker` is strictly within `window` of `now`.
///
/// Pure and deterministic given its inputs; callers supply the clock.
pub fn is_fresh(marker: &FreshnessMarker, now: DateTime<Utc>, window: Duration) -> bool {
    marker.age(now) < window
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    const WINDOW: Duration = Duration::from_secs(30);

    fn marker_at_offset(now: DateTime<Utc>, offset_ms: i64) -> FreshnessMarker {
        FreshnessMarker::at(now + TimeDelta::milliseconds(offset_ms))
    }

    #[test]
    fn test_fresh_inside_window() {
        let now = Utc::now();
        // 100ms inside the boundary
        assert!(is_fresh(&marker_at_offset(now, -29_900), now, WINDOW));
    }

    #[test]
    fn test_stale_outside_window() {
        let now = Utc::now();
        assert!(!is_fresh(&marker_at_offset(now, -30_100), now, WINDOW));
    }

    #[test]
    fn test_boundary_is_stale() {
        let now = Utc::now();
        // abs(now - marker) < window is strict
        assert!(!is_fresh(&marker_at_offset(now, -30_000), now, WINDOW));
    }

    #[test]
    fn test_future_marker_within_window_accepted() {
        let now = Utc::now();
        // Sender clock ahead of ours
        assert!(is_fresh(&marker_at_offset(now, 5_000), now, WINDOW));
        assert!(!is_fresh(&marker_at_offset(now, 35_000), now, WINDOW));
    }

    #[test]
    fn test_render_parse_roundtrip() {
        use chrono::TimeZone;

        let instant = Utc.with_ymd_and_hms(2024, 11, 3, 17, 45, 9).unwrap()
            + TimeDelta::microseconds(123_456);
        let marker = FreshnessMarker::at(instant);

        let parsed = FreshnessMarker::parse(&marker.render()).unwrap();
        assert_eq!(parsed, marker);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(FreshnessMarker::parse("not a timestamp").is_err());
        assert!(FreshnessMarker::parse("").is_err());
    }

    #[test]
    fn test_age_is_symmetric() {
        let now = Utc::now();
        let past = marker_at_offset(now, -1_500);
        let future = marker_at_offset(now, 1_500);
        assert_eq!(past.age(now), future.age(now));
    }
}
