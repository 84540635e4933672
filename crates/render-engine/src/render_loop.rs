//! Per-frame draw routine as an explicit state machine.
//!
//! ```text
//!          start()                 guard trips
//!   Idle ──────────► Playing ─────────────────► Stopped(reason)
//!                      │  ▲
//!                      └──┘ tick(): flip → filter → frame → noise → lines → progress
//! ```
//!
//! The loop never schedules itself; the owner calls [`RenderLoop::tick`]
//! once per scheduled frame and stops scheduling when it returns
//! [`FrameOutcome::Stopped`].

use vidfx_media_core::{MediaSource, PlaybackState};
use vidfx_settings::Settings;

use crate::filter::ColorFilter;
use crate::overlay::{PixelNoise, RotatingLines};
use crate::progress::ProgressTracker;
use crate::surface::Surface;

/// Why the loop halted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source played to the end.
    Ended,
    /// The source was paused (or never started).
    Paused,
    /// There is no source anymore.
    Detached,
    /// The source reported an error.
    Errored(String),
}

impl StopReason {
    /// Guard verdict for a source state; `None` while it is playing.
    pub fn from_playback(state: &PlaybackState) -> Option<Self> {
        match state {
            PlaybackState::Playing => None,
            PlaybackState::Idle | PlaybackState::Paused => Some(Self::Paused),
            PlaybackState::Ended => Some(Self::Ended),
            PlaybackState::Detached => Some(Self::Detached),
            PlaybackState::Errored(message) => Some(Self::Errored(message.clone())),
        }
    }
}

/// State of the render loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// No active source.
    Idle,
    Playing,
    Stopped(StopReason),
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was drawn; `progress` is the session percentage.
    Drawn { progress: u8 },
    /// The guard tripped; no frame was drawn.
    Stopped(StopReason),
}

/// Draws the effects chain for one session.
#[derive(Debug)]
pub struct RenderLoop {
    settings: Settings,
    filter: ColorFilter,
    noise: Option<PixelNoise>,
    lines: Option<RotatingLines>,
    progress: ProgressTracker,
    state: LoopState,
    frames_drawn: u64,
    last_noise_marks: u64,
}

impl RenderLoop {
    /// A loop for a snapshot of `settings`. Enabled overlays start with
    /// OS-seeded noise and zero phases.
    pub fn new(settings: Settings) -> Self {
        Self {
            filter: ColorFilter::from_settings(&settings),
            noise: settings.enable_pixel_noise.then(PixelNoise::new),
            lines: settings.enable_rotating_lines.then(RotatingLines::new),
            settings,
            progress: ProgressTracker::new(),
            state: LoopState::Idle,
            frames_drawn: 0,
            last_noise_marks: 0,
        }
    }

    /// Replace the noise generator. Ignored when noise is disabled.
    pub fn with_noise(mut self, noise: PixelNoise) -> Self {
        if self.settings.enable_pixel_noise {
            self.noise = Some(noise);
        }
        self
    }

    /// Replace the line phases. Ignored when the lines are disabled.
    pub fn with_lines(mut self, lines: RotatingLines) -> Self {
        if self.settings.enable_rotating_lines {
            self.lines = Some(lines);
        }
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Progress reported so far.
    pub fn progress(&self) -> u8 {
        self.progress.value()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Marks scattered by the noise overlay on the last drawn frame.
    pub fn last_noise_marks(&self) -> u64 {
        self.last_noise_marks
    }

    /// Current rotating-line phases, when the overlay is enabled.
    pub fn line_phases(&self) -> Option<(f64, f64)> {
        self.lines.as_ref().map(RotatingLines::phases)
    }

    /// Enter `Playing` with progress reset to 0.
    pub fn start(&mut self) {
        self.progress.reset();
        self.frames_drawn = 0;
        self.state = LoopState::Playing;
        tracing::debug!(settings = ?self.settings, "Render loop started");
    }

    /// Halt without drawing further frames.
    pub fn stop(&mut self, reason: StopReason) {
        if self.state == LoopState::Playing {
            tracing::debug!(?reason, frames = self.frames_drawn, "Render loop stopped");
        }
        self.state = LoopState::Stopped(reason);
    }

    /// Report successful completion (progress 100).
    pub fn complete(&mut self) -> u8 {
        self.progress.complete()
    }

    /// Draw one frame, or report why the loop has stopped.
    pub fn tick(&mut self, source: Option<&dyn MediaSource>, surface: &mut Surface) -> FrameOutcome {
        match &self.state {
            LoopState::Idle => return FrameOutcome::Stopped(StopReason::Detached),
            LoopState::Stopped(reason) => return FrameOutcome::Stopped(reason.clone()),
            LoopState::Playing => {}
        }

        let Some(source) = source else {
            self.stop(StopReason::Detached);
            return FrameOutcome::Stopped(StopReason::Detached);
        };
        if let Some(reason) = StopReason::from_playback(&source.state()) {
            self.stop(reason.clone());
            return FrameOutcome::Stopped(reason);
        }

        surface.save();
        if self.settings.flip_horizontal {
            surface.translate(f64::from(surface.width()), 0.0);
            surface.scale(-1.0, 1.0);
        }
        surface.set_filter(self.filter.clone());
        if let Some(frame) = source.current_frame() {
            surface.draw_frame(frame);
        }
        surface.restore();

        self.last_noise_marks = match self.noise.as_mut() {
            Some(noise) => noise.draw(surface),
            None => 0,
        };
        if let Some(lines) = self.lines.as_mut() {
            lines.draw(surface);
        }

        self.frames_drawn += 1;
        let progress = self
            .progress
            .observe(source.current_time(), source.info().duration_secs);
        FrameOutcome::Drawn { progress }
    }
}
