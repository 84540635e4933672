//! Frame pacing for the render loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{Interval, MissedTickBehavior};
use vidfx_common::config::FramePacing;

/// Hands out frame slots until cancelled.
///
/// `Realtime` waits for a fixed-rate interval, like a display refresh
/// callback, and reports the wall time elapsed since the previous slot.
/// `Offline` yields to the runtime and reports a fixed `1 / fps` step, so
/// an export runs as fast as the machine allows.
#[derive(Debug)]
pub struct FrameScheduler {
    pacing: FramePacing,
    step: Duration,
    stop_flag: Arc<AtomicBool>,
    interval: Option<Interval>,
    last: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(pacing: FramePacing, fps: u32) -> Self {
        Self {
            pacing,
            step: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            stop_flag: Arc::new(AtomicBool::new(false)),
            interval: None,
            last: None,
        }
    }

    pub fn pacing(&self) -> FramePacing {
        self.pacing
    }

    /// Nominal time between frames.
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Shared flag that cancels scheduling when set.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Cancel pending and future frames.
    pub fn cancel(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    /// Wait for the next frame slot. Returns the elapsed time in seconds
    /// the frame accounts for, or `None` once cancelled.
    pub async fn next_frame(&mut self) -> Option<f64> {
        if self.is_cancelled() {
            return None;
        }
        let dt = match self.pacing {
            FramePacing::Offline => {
                tokio::task::yield_now().await;
                self.step.as_secs_f64()
            }
            FramePacing::Realtime => {
                let step = self.step;
                let interval = self.interval.get_or_insert_with(|| {
                    let mut interval = tokio::time::interval(step);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    interval
                });
                interval.tick().await;
                let now = Instant::now();
                let dt = match self.last {
                    Some(last) => now.duration_since(last).as_secs_f64(),
                    None => step.as_secs_f64(),
                };
                self.last = Some(now);
                dt
            }
        };
        if self.is_cancelled() {
            return None;
        }
        Some(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_steps_are_fixed() {
        let mut scheduler = FrameScheduler::new(FramePacing::Offline, 30);
        for _ in 0..5 {
            let dt = scheduler.next_frame().await.unwrap();
            assert!((dt - 1.0 / 30.0).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_cancel_stops_scheduling() {
        let mut scheduler = FrameScheduler::new(FramePacing::Offline, 30);
        let flag = scheduler.stop_flag();
        assert!(scheduler.next_frame().await.is_some());
        flag.store(true, Ordering::SeqCst);
        assert!(scheduler.next_frame().await.is_none());
        assert!(scheduler.is_cancelled());
    }

    #[tokio::test]
    async fn test_realtime_is_paced() {
        let mut scheduler = FrameScheduler::new(FramePacing::Realtime, 50);
        let start = Instant::now();
        let mut total = 0.0;
        for _ in 0..4 {
            total += scheduler.next_frame().await.unwrap();
        }
        // The first tick fires immediately; three more intervals of 20 ms.
        assert!(start.elapsed() >= Duration::from_millis(55));
        assert!(total >= 0.075);
    }
}
