//! Deterministic in-memory source.
//!
//! Produces a fixed test pattern (left half red, right half blue) and an
//! optional sine tone. Used by tests and by the capability check, where no
//! decodable file is available.

use std::f64::consts::TAU;

use image::{Rgba, RgbaImage};
use vidfx_common::clock::SessionClock;
use vidfx_common::error::{VidfxError, VidfxResult};

use crate::audio::{AudioChunk, RateResampler};
use crate::frame::VideoFrame;
use crate::source::{AudioPresence, MediaSource, PlaybackState, SourceInfo};

/// Colour of the left half of the test pattern.
pub const PATTERN_LEFT: [u8; 4] = [255, 0, 0, 255];

/// Colour of the right half of the test pattern.
pub const PATTERN_RIGHT: [u8; 4] = [0, 0, 255, 255];

#[derive(Debug, Clone, Copy)]
struct Tone {
    freq_hz: f64,
    sample_rate: u32,
    channels: u16,
}

impl Tone {
    fn samples(&self, from: u64, to: u64, freq_hz: f64) -> Vec<f32> {
        let ch = usize::from(self.channels.max(1));
        let mut out = Vec::with_capacity((to.saturating_sub(from)) as usize * ch);
        for n in from..to {
            let t = n as f64 / f64::from(self.sample_rate);
            let v = (0.5 * (TAU * freq_hz * t).sin()) as f32;
            out.extend(std::iter::repeat(v).take(ch));
        }
        out
    }
}

/// A synthetic [`MediaSource`].
#[derive(Debug)]
pub struct SyntheticSource {
    info: SourceInfo,
    state: PlaybackState,
    position: f64,
    wall_elapsed: f64,
    rate: f64,
    preserves_pitch: bool,
    time_stretch: bool,
    frame: Option<VideoFrame>,
    tone: Option<Tone>,
    resampler: Option<RateResampler>,
    media_samples: u64,
    output_samples: u64,
    pending_audio: Vec<f32>,
    fail_at: Option<f64>,
    fail_play: Option<String>,
    fail_audio_lookup: Option<String>,
}

impl SyntheticSource {
    /// A silent source of the given size and duration at 30 fps.
    pub fn new(width: u32, height: u32, duration_secs: f64) -> Self {
        Self {
            info: SourceInfo {
                width,
                height,
                duration_secs: duration_secs.max(0.0),
                frame_rate: Some(30.0),
            },
            state: PlaybackState::Idle,
            position: 0.0,
            wall_elapsed: 0.0,
            rate: 1.0,
            preserves_pitch: true,
            time_stretch: true,
            frame: None,
            tone: None,
            resampler: None,
            media_samples: 0,
            output_samples: 0,
            pending_audio: Vec::new(),
            fail_at: None,
            fail_play: None,
            fail_audio_lookup: None,
        }
    }

    /// Add a sine tone audio track.
    pub fn with_tone(mut self, freq_hz: f64, sample_rate: u32, channels: u16) -> Self {
        self.tone = Some(Tone {
            freq_hz,
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
        });
        self
    }

    /// Report a decode error once playback reaches `secs`.
    pub fn failing_at(mut self, secs: f64) -> Self {
        self.fail_at = Some(secs);
        self
    }

    /// Refuse to start playback.
    pub fn failing_play(mut self, message: impl Into<String>) -> Self {
        self.fail_play = Some(message.into());
        self
    }

    /// Fail the audio track lookup.
    pub fn failing_audio_lookup(mut self, message: impl Into<String>) -> Self {
        self.fail_audio_lookup = Some(message.into());
        self
    }

    /// Drop time-stretch support: rate changes always shift pitch.
    pub fn without_time_stretch(mut self) -> Self {
        self.time_stretch = false;
        self
    }

    /// Current playback rate.
    pub fn playback_rate(&self) -> f64 {
        self.rate
    }

    /// Whether pitch is currently being preserved.
    pub fn preserves_pitch(&self) -> bool {
        self.preserves_pitch && self.time_stretch
    }

    fn pattern(&self) -> VideoFrame {
        let (w, h) = (self.info.width, self.info.height);
        let half = w / 2;
        let image = RgbaImage::from_fn(w, h, |x, _| {
            if x < half {
                Rgba(PATTERN_LEFT)
            } else {
                Rgba(PATTERN_RIGHT)
            }
        });
        VideoFrame::new(image, 0)
    }

    fn produce_audio(&mut self) {
        let Some(tone) = self.tone else {
            return;
        };
        let rate = f64::from(tone.sample_rate);

        if self.preserves_pitch() {
            // Time-stretched: output runs on wall time at the original pitch.
            let target = (self.wall_elapsed * rate).floor() as u64;
            let chunk = tone.samples(self.output_samples, target, tone.freq_hz);
            self.output_samples = target.max(self.output_samples);
            self.pending_audio.extend(chunk);
        } else {
            // Resampled: media-time audio squeezed into wall time.
            let target = (self.position * rate).floor() as u64;
            let chunk = tone.samples(self.media_samples, target, tone.freq_hz);
            self.media_samples = target.max(self.media_samples);
            let ratio = self.rate;
            let resampler = self
                .resampler
                .get_or_insert_with(|| RateResampler::new(tone.channels, ratio));
            if (resampler.ratio() - ratio).abs() > f64::EPSILON {
                *resampler = RateResampler::new(tone.channels, ratio);
            }
            let out = resampler.process(&chunk);
            self.pending_audio.extend(out);
        }
    }
}

impl MediaSource for SyntheticSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn state(&self) -> PlaybackState {
        self.state.clone()
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn current_frame(&self) -> Option<&VideoFrame> {
        self.frame.as_ref()
    }

    fn inspect_audio(&self) -> VidfxResult<AudioPresence> {
        if let Some(message) = &self.fail_audio_lookup {
            return Err(VidfxError::audio_route(message.clone()));
        }
        Ok(match self.tone {
            Some(t) => AudioPresence::Present {
                sample_rate: t.sample_rate,
                channels: t.channels,
            },
            None => AudioPresence::Absent,
        })
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.rate = rate;
        }
    }

    fn set_preserves_pitch(&mut self, preserve: bool) -> bool {
        self.preserves_pitch = preserve;
        self.time_stretch
    }

    fn play(&mut self) -> VidfxResult<()> {
        if let Some(message) = &self.fail_play {
            return Err(VidfxError::playback(message.clone()));
        }
        match &self.state {
            PlaybackState::Detached => Err(VidfxError::playback("Source has been detached")),
            PlaybackState::Errored(message) => Err(VidfxError::playback(message.clone())),
            PlaybackState::Ended => Ok(()),
            _ => {
                if self.frame.is_none() {
                    self.frame = Some(self.pattern());
                }
                self.state = PlaybackState::Playing;
                tracing::debug!(
                    width = self.info.width,
                    height = self.info.height,
                    duration = self.info.duration_secs,
                    "Synthetic source playing"
                );
                Ok(())
            }
        }
    }

    fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    fn advance(&mut self, wall_secs: f64) -> VidfxResult<()> {
        if self.state != PlaybackState::Playing || wall_secs <= 0.0 {
            return Ok(());
        }

        let step = wall_secs * self.rate;
        let mut next = self.position + step;
        let ended = next >= self.info.duration_secs;
        if ended {
            next = self.info.duration_secs;
            self.wall_elapsed += (next - self.position) / self.rate;
        } else {
            self.wall_elapsed += wall_secs;
        }
        self.position = next;
        self.produce_audio();

        if let Some(frame) = self.frame.as_mut() {
            frame.pts_ns = SessionClock::secs_to_ns(self.position);
        }

        if let Some(fail_at) = self.fail_at {
            if self.position >= fail_at {
                let message = format!("Synthetic decode failure at {fail_at:.2}s");
                self.state = PlaybackState::Errored(message.clone());
                return Err(VidfxError::playback(message));
            }
        }
        if ended {
            self.state = PlaybackState::Ended;
        }
        Ok(())
    }

    fn take_audio(&mut self) -> Option<AudioChunk> {
        let tone = self.tone?;
        if self.pending_audio.is_empty() {
            return None;
        }
        Some(AudioChunk::new(
            tone.sample_rate,
            tone.channels,
            std::mem::take(&mut self.pending_audio),
        ))
    }

    fn detach(&mut self) {
        self.state = PlaybackState::Detached;
        self.frame = None;
        self.pending_audio.clear();
        self.resampler = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    fn run(source: &mut SyntheticSource, steps: usize, dt: f64) -> Vec<f32> {
        let mut audio = Vec::new();
        for _ in 0..steps {
            source.advance(dt).unwrap();
            if let Some(chunk) = source.take_audio() {
                audio.extend(chunk.samples);
            }
        }
        audio
    }

    #[test]
    fn test_pattern_halves() {
        let mut source = SyntheticSource::new(8, 2, 1.0);
        assert!(source.current_frame().is_none());
        source.play().unwrap();
        let frame = source.current_frame().unwrap();
        assert_eq!(frame.pixel(0, 0), PATTERN_LEFT);
        assert_eq!(frame.pixel(7, 1), PATTERN_RIGHT);
    }

    #[test]
    fn test_reaches_end() {
        let mut source = SyntheticSource::new(4, 4, 1.0);
        source.play().unwrap();
        run(&mut source, 29, 1.0 / 30.0);
        assert_eq!(source.state(), PlaybackState::Playing);
        run(&mut source, 2, 1.0 / 30.0);
        assert_eq!(source.state(), PlaybackState::Ended);
        assert!((source.current_time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_scales_position() {
        let mut source = SyntheticSource::new(4, 4, 10.0);
        source.set_playback_rate(2.0);
        source.play().unwrap();
        run(&mut source, 30, 1.0 / 30.0);
        assert!((source.current_time() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_advance_ignored_while_paused() {
        let mut source = SyntheticSource::new(4, 4, 10.0);
        source.play().unwrap();
        source.pause();
        source.advance(1.0).unwrap();
        assert_eq!(source.current_time(), 0.0);
        assert_eq!(source.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_pitch_preserved_at_double_speed() {
        let mut source = SyntheticSource::new(4, 4, 10.0).with_tone(440.0, 48_000, 1);
        source.set_playback_rate(2.0);
        assert!(source.set_preserves_pitch(true));
        source.play().unwrap();
        let audio = run(&mut source, 30, 1.0 / 30.0);
        // One wall second of output at the original pitch.
        let secs = audio.len() as f64 / 48_000.0;
        let hz = zero_crossings(&audio) as f64 / 2.0 / secs;
        assert!((hz - 440.0).abs() < 10.0, "got {hz} Hz");
    }

    #[test]
    fn test_pitch_shifted_when_not_preserved() {
        let mut source = SyntheticSource::new(4, 4, 10.0).with_tone(440.0, 48_000, 1);
        source.set_playback_rate(2.0);
        source.set_preserves_pitch(false);
        source.play().unwrap();
        let audio = run(&mut source, 30, 1.0 / 30.0);
        let secs = audio.len() as f64 / 48_000.0;
        assert!((secs - 1.0).abs() < 0.01);
        let hz = zero_crossings(&audio) as f64 / 2.0 / secs;
        assert!((hz - 880.0).abs() < 15.0, "got {hz} Hz");
    }

    #[test]
    fn test_without_time_stretch_ignores_preserve_request() {
        let mut source = SyntheticSource::new(4, 4, 10.0)
            .with_tone(440.0, 48_000, 1)
            .without_time_stretch();
        assert!(!source.set_preserves_pitch(true));
        assert!(!source.preserves_pitch());
    }

    #[test]
    fn test_failure_sets_errored_state() {
        let mut source = SyntheticSource::new(4, 4, 10.0).failing_at(0.5);
        source.play().unwrap();
        let mut failed = false;
        for _ in 0..30 {
            if source.advance(1.0 / 30.0).is_err() {
                failed = true;
                break;
            }
        }
        assert!(failed);
        assert!(matches!(source.state(), PlaybackState::Errored(_)));
        assert!(source.play().is_err());
    }

    #[test]
    fn test_audio_lookup() {
        let silent = SyntheticSource::new(4, 4, 1.0);
        assert_eq!(silent.inspect_audio().unwrap(), AudioPresence::Absent);
        let toned = SyntheticSource::new(4, 4, 1.0).with_tone(220.0, 44_100, 2);
        assert_eq!(
            toned.inspect_audio().unwrap(),
            AudioPresence::Present {
                sample_rate: 44_100,
                channels: 2
            }
        );
        let broken = SyntheticSource::new(4, 4, 1.0).failing_audio_lookup("no demuxer");
        assert!(broken.inspect_audio().is_err());
    }

    #[test]
    fn test_detach_releases_frame() {
        let mut source = SyntheticSource::new(4, 4, 1.0);
        source.play().unwrap();
        source.detach();
        assert!(source.current_frame().is_none());
        assert_eq!(source.state(), PlaybackState::Detached);
        assert!(source.play().is_err());
    }
}
