//! Clock and timing utilities for stream synchronization.
//!
//! The captured video stream runs on a fixed frame clock (30 fps by
//! default). This module provides:
//! - A wall clock anchored at session start
//! - A fixed-rate frame clock producing presentation timestamps
//! - Drift measurement between the video and audio streams

use std::time::Instant;

/// A wall clock that provides monotonic timestamps relative to a fixed
/// epoch (the moment the session started).
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant the session started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl SessionClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get nanoseconds elapsed since session start.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Get seconds elapsed since session start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at session start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Convert an elapsed nanosecond value to seconds.
    pub fn ns_to_secs(ns: u64) -> f64 {
        ns as f64 / 1_000_000_000.0
    }

    /// Convert seconds to nanoseconds.
    pub fn secs_to_ns(secs: f64) -> u64 {
        (secs * 1_000_000_000.0) as u64
    }
}

/// Fixed-rate clock for captured frames.
///
/// Frame `n` is presented at `n / fps` seconds regardless of how long the
/// frame took to render.
#[derive(Debug, Clone)]
pub struct FrameClock {
    fps: u32,
    next_frame: u64,
}

impl FrameClock {
    /// Create a clock ticking at `fps` frames per second (minimum 1).
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            next_frame: 0,
        }
    }

    /// Frames per second.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Presentation timestamp of frame `index` in nanoseconds.
    pub fn pts_ns(&self, index: u64) -> u64 {
        (index as u128 * 1_000_000_000u128 / self.fps as u128) as u64
    }

    /// Claim the next frame slot, returning `(index, pts_ns)`.
    pub fn tick(&mut self) -> (u64, u64) {
        let index = self.next_frame;
        self.next_frame += 1;
        (index, self.pts_ns(index))
    }

    /// Number of frames handed out so far.
    pub fn frames_emitted(&self) -> u64 {
        self.next_frame
    }

    /// Media time covered by the frames handed out so far.
    pub fn elapsed_ns(&self) -> u64 {
        self.pts_ns(self.next_frame)
    }

    /// Rewind to frame zero.
    pub fn reset(&mut self) {
        self.next_frame = 0;
    }
}

/// Drift measurement between two streams.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Timestamp in the reference stream (ns).
    pub reference_ns: u64,
    /// Timestamp in the measured stream (ns).
    pub measured_ns: u64,
}

impl DriftMeasurement {
    /// Drift in nanoseconds (positive = measured is ahead).
    pub fn drift_ns(&self) -> i64 {
        self.measured_ns as i64 - self.reference_ns as i64
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_ns() as f64 / 1_000_000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = SessionClock::start();
        assert!(clock.elapsed_ns() < 1_000_000_000); // less than 1 second
    }

    #[test]
    fn test_ns_to_secs_conversion() {
        assert!((SessionClock::ns_to_secs(1_500_000_000) - 1.5).abs() < 1e-9);
        assert_eq!(SessionClock::secs_to_ns(2.0), 2_000_000_000);
    }

    #[test]
    fn test_frame_clock_timestamps() {
        let mut clock = FrameClock::new(30);
        assert_eq!(clock.tick(), (0, 0));
        assert_eq!(clock.tick(), (1, 33_333_333));
        for _ in 2..30 {
            clock.tick();
        }
        assert_eq!(clock.frames_emitted(), 30);
        assert_eq!(clock.elapsed_ns(), 1_000_000_000);

        clock.reset();
        assert_eq!(clock.frames_emitted(), 0);
    }

    #[test]
    fn test_frame_clock_rejects_zero_fps() {
        let clock = FrameClock::new(0);
        assert_eq!(clock.fps(), 1);
    }

    #[test]
    fn test_drift_measurement() {
        let drift = DriftMeasurement {
            reference_ns: 1_000_000_000,
            measured_ns: 1_050_000_000,
        };
        assert_eq!(drift.drift_ns(), 50_000_000);
        assert!((drift.drift_ms() - 50.0).abs() < 1e-9);
        assert!(drift.exceeds_threshold_ms(10.0));
        assert!(!drift.exceeds_threshold_ms(100.0));
    }
}
