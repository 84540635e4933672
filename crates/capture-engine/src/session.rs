//! Render session: one source, one surface, one audio graph, one encoder.

use std::time::Duration;

use tokio::sync::watch;
use vidfx_audio_graph::{apply_playback, build_route, AudioContext, AudioRoute};
use vidfx_common::clock::{DriftMeasurement, FrameClock, SessionClock};
use vidfx_common::config::{ExportDefaults, FramePacing};
use vidfx_common::error::{VidfxError, VidfxResult};
use vidfx_media_core::MediaSource;
use vidfx_render_engine::{FrameOutcome, LoopState, RenderLoop, StopReason, Surface};
use vidfx_settings::Settings;

use crate::blob::{Blob, ChunkBuffer};
use crate::encoder::{
    ensure_supported, AudioFormat, EncoderConfig, EncoderEvent, EncoderFactory, EncoderFormat,
    MediaEncoder, RecorderState,
};
use crate::scheduler::FrameScheduler;

/// How long a stopping encoder may take to deliver its last chunks.
const STOP_DEADLINE: Duration = Duration::from_secs(10);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Drift between the video and audio tracks worth a warning.
const DRIFT_THRESHOLD_MS: f64 = 100.0;

/// Parameters of a render session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub format: EncoderFormat,
    /// Capture frame rate of the surface.
    pub fps: u32,
    pub pacing: FramePacing,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
}

impl SessionConfig {
    /// Build from the `export` section of the application config.
    pub fn from_export(export: &ExportDefaults) -> VidfxResult<Self> {
        Ok(Self {
            format: export.format.parse()?,
            fps: export.fps.max(1),
            pacing: export.pacing,
            audio_sample_rate: export.audio_sample_rate,
            audio_channels: export.audio_channels,
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            format: EncoderFormat::default(),
            fps: 30,
            pacing: FramePacing::Offline,
            audio_sample_rate: 48_000,
            audio_channels: 2,
        }
    }
}

/// What a successful session produced.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// The encoded container.
    pub blob: Blob,
    /// Frames submitted to the encoder.
    pub frames: u64,
    /// Media time covered by those frames.
    pub video_secs: f64,
    /// Routed audio delivered to the encoder, when the source had audio.
    pub audio_secs: Option<f64>,
}

/// Owns every transient resource of one processing request.
///
/// Resources are held as `Option`s so that [`RenderSession::teardown`] can
/// release each one exactly once, whichever path ends the session.
pub struct RenderSession {
    config: SessionConfig,
    settings: Settings,
    scheduler: FrameScheduler,
    render: RenderLoop,
    frame_clock: FrameClock,
    source: Option<Box<dyn MediaSource>>,
    surface: Option<Surface>,
    audio: Option<AudioContext>,
    route: Option<AudioRoute>,
    encoder: Option<Box<dyn MediaEncoder>>,
    chunks: ChunkBuffer,
    audio_frames: u64,
    progress: watch::Sender<u8>,
}

impl RenderSession {
    /// Acquire everything the session needs, in order: format check,
    /// surface, audio context, playback settings, audio route, encoder.
    ///
    /// Any failure tears down what was already acquired. A failing audio
    /// route only drops the session to video-only.
    pub fn open(
        source: Box<dyn MediaSource>,
        settings: Settings,
        config: SessionConfig,
        factory: &dyn EncoderFactory,
        progress: watch::Sender<u8>,
    ) -> VidfxResult<Self> {
        let settings = settings.clamped();
        let mut session = Self {
            scheduler: FrameScheduler::new(config.pacing, config.fps),
            render: RenderLoop::new(settings),
            frame_clock: FrameClock::new(config.fps),
            source: Some(source),
            surface: None,
            audio: None,
            route: None,
            encoder: None,
            chunks: ChunkBuffer::new(),
            audio_frames: 0,
            progress,
            config,
            settings,
        };
        if let Err(e) = session.acquire(factory) {
            tracing::warn!(error = %e, "Render session setup failed");
            session.teardown();
            return Err(e);
        }
        Ok(session)
    }

    fn acquire(&mut self, factory: &dyn EncoderFactory) -> VidfxResult<()> {
        ensure_supported(factory, self.config.format)?;

        let source = self
            .source
            .as_deref_mut()
            .ok_or_else(|| VidfxError::playback("No source attached"))?;
        let info = source.info();
        self.surface = Some(Surface::new(info.width, info.height)?);

        let ctx = AudioContext::new(self.config.audio_sample_rate, self.config.audio_channels)?;
        apply_playback(source, &self.settings);
        self.route = build_route(&ctx, source, &self.settings);

        let encoder_config = EncoderConfig {
            format: self.config.format,
            width: info.width,
            height: info.height,
            fps: self.config.fps,
            audio: self.route.as_ref().map(|_| AudioFormat {
                sample_rate: ctx.sample_rate(),
                channels: ctx.channels(),
            }),
        };
        self.audio = Some(ctx);
        self.encoder = Some(factory.create(&encoder_config)?);

        tracing::info!(
            format = %self.config.format,
            width = info.width,
            height = info.height,
            duration_secs = info.duration_secs,
            fps = self.config.fps,
            pacing = ?self.config.pacing,
            audio = self.route.is_some(),
            encoder = factory.name(),
            "Render session ready"
        );
        Ok(())
    }

    /// Settings snapshot this session renders with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether an audio route feeds the encoder.
    pub fn has_audio(&self) -> bool {
        self.route.is_some()
    }

    /// Flag that cancels the session at its next frame slot.
    pub fn cancel_flag(&self) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
        self.scheduler.stop_flag()
    }

    /// Whether every resource has been released.
    pub fn is_torn_down(&self) -> bool {
        self.source.is_none()
            && self.surface.is_none()
            && self.audio.is_none()
            && self.route.is_none()
            && self.encoder.is_none()
            && self.chunks.is_empty()
    }

    /// Render until the source stops, then finalize the recording.
    ///
    /// Teardown runs before this returns, on success and on failure.
    pub async fn run(mut self) -> VidfxResult<RenderOutput> {
        let result = self.drive().await;
        if let Err(e) = &result {
            if e.is_cancelled() {
                tracing::info!("Render session cancelled");
            } else {
                tracing::error!(error = %e, "Render session failed");
            }
        }
        self.teardown();
        result
    }

    async fn drive(&mut self) -> VidfxResult<RenderOutput> {
        let clock = SessionClock::start();
        self.progress.send_replace(0);
        self.render.start();

        self.encoder_mut()?.start()?;
        self.source
            .as_deref_mut()
            .ok_or_else(|| VidfxError::playback("No source attached"))?
            .play()?;
        tracing::info!(started_at = clock.epoch_wall(), "Rendering");

        loop {
            let Some(dt) = self.scheduler.next_frame().await else {
                return Err(VidfxError::cancelled("Superseded by a newer request"));
            };
            if self.render_frame(dt)? {
                break;
            }
        }

        self.finish(&clock).await
    }

    /// One scheduled frame. Returns `true` once the loop has stopped
    /// naturally.
    fn render_frame(&mut self, dt: f64) -> VidfxResult<bool> {
        let surface = self
            .surface
            .as_mut()
            .ok_or_else(|| VidfxError::surface_unavailable("Surface was released"))?;

        match self.render.tick(self.source.as_deref(), surface) {
            FrameOutcome::Drawn { progress } => {
                self.progress.send_if_modified(|current| {
                    let changed = *current != progress;
                    *current = progress;
                    changed
                });

                let (_, pts_ns) = self.frame_clock.tick();
                let frame = surface.snapshot(pts_ns);
                self.encoder_mut()?.write_video(&frame)?;
                self.forward_audio()?;

                if let Some(source) = self.source.as_deref_mut() {
                    source.advance(dt)?;
                }
                if self.drain_events()? {
                    return Err(VidfxError::encoder("Encoder stopped unexpectedly"));
                }
                Ok(false)
            }
            FrameOutcome::Stopped(StopReason::Errored(message)) => {
                Err(VidfxError::playback(message))
            }
            FrameOutcome::Stopped(reason) => {
                tracing::info!(
                    ?reason,
                    frames = self.render.frames_drawn(),
                    "Render loop halted"
                );
                self.scheduler.cancel();
                Ok(true)
            }
        }
    }

    /// Move pending source audio through the route into the encoder.
    fn forward_audio(&mut self) -> VidfxResult<()> {
        let (Some(route), Some(source)) = (self.route.as_mut(), self.source.as_deref_mut()) else {
            return Ok(());
        };
        route.pump(source);
        let Some(chunk) = route.track().take() else {
            return Ok(());
        };
        self.audio_frames += chunk.frames() as u64;
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| VidfxError::encoder("Encoder was released"))?;
        encoder.write_audio(&chunk)
    }

    /// Collect encoder events. Returns whether `Stopped` was seen.
    fn drain_events(&mut self) -> VidfxResult<bool> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(false);
        };
        let mut stopped = false;
        for event in encoder.poll_events() {
            match event {
                EncoderEvent::Data(chunk) => {
                    self.chunks.push(chunk);
                }
                EncoderEvent::Error(fault) => {
                    return Err(VidfxError::encoder_fault(fault.as_ref()));
                }
                EncoderEvent::Stopped => stopped = true,
            }
        }
        Ok(stopped)
    }

    async fn finish(&mut self, clock: &SessionClock) -> VidfxResult<RenderOutput> {
        self.forward_audio()?;
        self.encoder_mut()?.stop()?;

        let deadline = tokio::time::Instant::now() + STOP_DEADLINE;
        while !self.drain_events()? {
            if tokio::time::Instant::now() >= deadline {
                return Err(VidfxError::encoder(
                    "Encoder did not finish within 10s of stopping",
                ));
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }

        let mime_type = self.encoder_mut()?.mime_type().to_string();
        let blob = self.chunks.take_blob(&mime_type);
        let done = self.render.complete();
        self.progress.send_replace(done);

        let frames = self.frame_clock.frames_emitted();
        let video_ns = self.frame_clock.elapsed_ns();
        let audio_secs = self.audio.as_ref().filter(|_| self.route.is_some()).map(|ctx| {
            self.audio_frames as f64 / f64::from(ctx.sample_rate())
        });
        self.log_clock_drift_check(video_ns, audio_secs);

        tracing::info!(
            frames,
            bytes = blob.size(),
            mime = blob.mime_type(),
            elapsed_secs = clock.elapsed_secs(),
            "Render session complete"
        );
        Ok(RenderOutput {
            blob,
            frames,
            video_secs: SessionClock::ns_to_secs(video_ns),
            audio_secs,
        })
    }

    fn encoder_mut(&mut self) -> VidfxResult<&mut Box<dyn MediaEncoder>> {
        self.encoder
            .as_mut()
            .ok_or_else(|| VidfxError::encoder("Encoder was released"))
    }

    fn log_clock_drift_check(&self, video_ns: u64, audio_secs: Option<f64>) {
        let Some(audio_secs) = audio_secs else {
            return;
        };
        let measurement = DriftMeasurement {
            reference_ns: video_ns,
            measured_ns: SessionClock::secs_to_ns(audio_secs),
        };
        let drift_ms = measurement.drift_ms();
        if measurement.exceeds_threshold_ms(DRIFT_THRESHOLD_MS) {
            tracing::warn!(stream = "audio", drift_ms, "Clock drift exceeds 100ms");
        } else {
            tracing::info!(stream = "audio", drift_ms, "Clock drift within threshold");
        }
    }

    /// Release every resource. Safe to call any number of times.
    pub fn teardown(&mut self) {
        self.scheduler.cancel();

        let mut released = false;
        if let Some(mut encoder) = self.encoder.take() {
            if encoder.state() == RecorderState::Recording {
                if let Err(e) = encoder.stop() {
                    tracing::warn!(error = %e, "Failed to stop encoder during teardown");
                }
            }
            released = true;
        }
        if let Some(mut source) = self.source.take() {
            source.pause();
            source.detach();
            released = true;
        }
        released |= self.surface.take().is_some();
        released |= self.route.take().is_some();
        if let Some(mut ctx) = self.audio.take() {
            ctx.close();
            released = true;
        }
        self.chunks.clear();
        if self.render.state() == &LoopState::Playing {
            self.render.stop(StopReason::Detached);
        }

        if released {
            tracing::debug!("Render session resources released");
        }
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_export_defaults() {
        let config = SessionConfig::from_export(&ExportDefaults::default()).unwrap();
        assert_eq!(config.format, EncoderFormat::WebmVp8Opus);
        assert_eq!(config.fps, 30);
    }

    #[test]
    fn test_config_rejects_unknown_format() {
        let export = ExportDefaults {
            format: "ogg-theora".to_string(),
            ..ExportDefaults::default()
        };
        let err = SessionConfig::from_export(&export).unwrap_err();
        assert!(matches!(err, VidfxError::UnsupportedFormat { .. }));
    }
}
