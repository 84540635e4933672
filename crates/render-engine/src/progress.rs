//! Session progress reporting.

/// Highest value reported while rendering; 100 is reserved for success.
pub const IN_FLIGHT_CAP: u8 = 99;

/// Percentage of `position` through `duration`, rounded and clamped to
/// `[0, 100]`. Unknown or zero durations report 0.
pub fn percent(position_secs: f64, duration_secs: f64) -> u8 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 || !position_secs.is_finite() {
        return 0;
    }
    (position_secs / duration_secs * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Monotone progress counter for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressTracker {
    value: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Back to 0 for a new session.
    pub fn reset(&mut self) {
        self.value = 0;
    }

    /// Record a playback position. The result never decreases and stays
    /// below 100 until [`ProgressTracker::complete`].
    pub fn observe(&mut self, position_secs: f64, duration_secs: f64) -> u8 {
        let next = percent(position_secs, duration_secs).min(IN_FLIGHT_CAP);
        self.value = self.value.max(next);
        self.value
    }

    /// Mark successful completion.
    pub fn complete(&mut self) -> u8 {
        self.value = 100;
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds_and_clamps() {
        assert_eq!(percent(0.0, 10.0), 0);
        assert_eq!(percent(2.5, 10.0), 25);
        assert_eq!(percent(0.126, 1.0), 13);
        assert_eq!(percent(12.0, 10.0), 100);
        assert_eq!(percent(-1.0, 10.0), 0);
        assert_eq!(percent(5.0, 0.0), 0);
        assert_eq!(percent(5.0, f64::NAN), 0);
    }

    #[test]
    fn test_tracker_caps_until_complete() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.observe(10.0, 10.0), 99);
        assert_eq!(tracker.complete(), 100);
    }

    #[test]
    fn test_tracker_never_decreases() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.observe(5.0, 10.0), 50);
        assert_eq!(tracker.observe(3.0, 10.0), 50);
        tracker.reset();
        assert_eq!(tracker.value(), 0);
    }
}
