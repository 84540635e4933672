//! Nodes of the audio route and the route itself.

use std::sync::{Arc, Mutex, MutexGuard};

use vidfx_common::error::{VidfxError, VidfxResult};
use vidfx_media_core::{remix_channels, AudioChunk, AudioPresence, MediaSource, RateResampler};
use vidfx_settings::Settings;

use crate::context::AudioContext;

#[derive(Debug)]
struct TrackQueue {
    samples: Vec<f32>,
    frames_total: u64,
}

/// Destination of a route: a shared queue of interleaved samples in the
/// context's format. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    sample_rate: u32,
    channels: u16,
    queue: Arc<Mutex<TrackQueue>>,
}

impl AudioTrack {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            queue: Arc::new(Mutex::new(TrackQueue {
                samples: Vec::new(),
                frames_total: 0,
            })),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn lock(&self) -> MutexGuard<'_, TrackQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append interleaved samples.
    pub fn push(&self, samples: &[f32]) {
        let mut queue = self.lock();
        queue.samples.extend_from_slice(samples);
        queue.frames_total += (samples.len() / usize::from(self.channels)) as u64;
    }

    /// Take everything queued so far.
    pub fn take(&self) -> Option<AudioChunk> {
        let mut queue = self.lock();
        if queue.samples.is_empty() {
            return None;
        }
        Some(AudioChunk::new(
            self.sample_rate,
            self.channels,
            std::mem::take(&mut queue.samples),
        ))
    }

    /// Frames waiting to be taken.
    pub fn queued_frames(&self) -> usize {
        self.lock().samples.len() / usize::from(self.channels)
    }

    /// Frames pushed over the track's lifetime.
    pub fn frames_total(&self) -> u64 {
        self.lock().frames_total
    }
}

/// Entry node: converts the source's audio to the context format.
#[derive(Debug)]
pub struct ElementSourceNode {
    in_rate: u32,
    in_channels: u16,
    out_rate: u32,
    out_channels: u16,
    resampler: Option<RateResampler>,
}

impl ElementSourceNode {
    pub fn new(in_rate: u32, in_channels: u16, out_rate: u32, out_channels: u16) -> Self {
        let mut node = Self {
            in_rate,
            in_channels,
            out_rate,
            out_channels,
            resampler: None,
        };
        node.rebuild();
        node
    }

    fn rebuild(&mut self) {
        self.resampler = (self.in_rate != self.out_rate).then(|| {
            RateResampler::new(
                self.out_channels,
                f64::from(self.in_rate) / f64::from(self.out_rate),
            )
        });
    }

    /// Convert one chunk. A format change mid-stream restarts conversion.
    pub fn process(&mut self, chunk: &AudioChunk) -> Vec<f32> {
        if chunk.sample_rate != self.in_rate || chunk.channels != self.in_channels {
            tracing::debug!(
                from_rate = self.in_rate,
                to_rate = chunk.sample_rate,
                from_channels = self.in_channels,
                to_channels = chunk.channels,
                "Source audio format changed"
            );
            self.in_rate = chunk.sample_rate;
            self.in_channels = chunk.channels;
            self.rebuild();
        }
        let remixed = remix_channels(&chunk.samples, self.in_channels, self.out_channels);
        match self.resampler.as_mut() {
            Some(resampler) => resampler.process(&remixed),
            None => remixed,
        }
    }
}

/// Multiplies every sample by a constant gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainNode {
    gain: f32,
}

impl GainNode {
    /// Gain is clamped to `[0, 1]`; non-finite values mean unity.
    pub fn new(gain: f64) -> Self {
        let gain = if gain.is_finite() {
            gain.clamp(0.0, 1.0)
        } else {
            1.0
        };
        Self { gain: gain as f32 }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn process(&self, samples: &mut [f32]) {
        if (self.gain - 1.0).abs() < f32::EPSILON {
            return;
        }
        for s in samples.iter_mut() {
            *s *= self.gain;
        }
    }
}

/// A connected source → gain → track route.
#[derive(Debug)]
pub struct AudioRoute {
    source: ElementSourceNode,
    gain: GainNode,
    track: AudioTrack,
}

impl AudioRoute {
    /// Connect the source's audio to a new track.
    ///
    /// `Ok(None)` when the source has no audio track; `Err` when the lookup
    /// fails or the context is already closed.
    pub fn connect(
        ctx: &AudioContext,
        source: &dyn MediaSource,
        settings: &Settings,
    ) -> VidfxResult<Option<Self>> {
        if ctx.is_closed() {
            return Err(VidfxError::audio_route("audio context is closed"));
        }
        let (in_rate, in_channels) = match source.inspect_audio()? {
            AudioPresence::Absent => return Ok(None),
            AudioPresence::Present {
                sample_rate,
                channels,
            } => (sample_rate, channels),
        };
        if in_rate == 0 || in_channels == 0 {
            return Err(VidfxError::audio_route(format!(
                "source reported an unusable audio format ({in_rate} Hz, {in_channels} channels)"
            )));
        }

        let route = Self {
            source: ElementSourceNode::new(in_rate, in_channels, ctx.sample_rate(), ctx.channels()),
            gain: GainNode::new(settings.gain()),
            track: AudioTrack::new(ctx.sample_rate(), ctx.channels()),
        };
        tracing::debug!(
            in_rate,
            in_channels,
            out_rate = ctx.sample_rate(),
            out_channels = ctx.channels(),
            gain = route.gain.gain(),
            "Audio route connected"
        );
        Ok(Some(route))
    }

    /// The destination track the encoder reads from.
    pub fn track(&self) -> AudioTrack {
        self.track.clone()
    }

    pub fn gain(&self) -> GainNode {
        self.gain
    }

    /// Move pending source audio through the route. Returns frames pushed.
    pub fn pump(&mut self, source: &mut dyn MediaSource) -> usize {
        let Some(chunk) = source.take_audio() else {
            return 0;
        };
        let mut samples = self.source.process(&chunk);
        self.gain.process(&mut samples);
        self.track.push(&samples);
        samples.len() / usize::from(self.track.channels())
    }
}

/// Connect a route, degrading to `None` (video only) on any failure.
pub fn build_route(
    ctx: &AudioContext,
    source: &dyn MediaSource,
    settings: &Settings,
) -> Option<AudioRoute> {
    match AudioRoute::connect(ctx, source, settings) {
        Ok(Some(route)) => Some(route),
        Ok(None) => {
            tracing::info!("Source has no audio track; recording video only");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Audio routing failed; recording video only");
            None
        }
    }
}

/// Apply playback speed and the pitch policy to the source.
pub fn apply_playback(source: &mut dyn MediaSource, settings: &Settings) {
    source.set_playback_rate(settings.playback_speed);
    let supported = source.set_preserves_pitch(settings.audio_preserves_pitch);
    if !supported {
        tracing::debug!(
            preserve = settings.audio_preserves_pitch,
            "Source cannot time-stretch; pitch follows playback speed"
        );
    }
}
