//! Decoded audio buffers and streaming resampling.

/// A block of interleaved `f32` PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Samples per second per channel.
    pub sample_rate: u32,

    /// Number of interleaved channels.
    pub channels: u16,

    /// Interleaved samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
}

impl AudioChunk {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Duration covered by this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Streaming linear-interpolation resampler.
///
/// `ratio` is input frames consumed per output frame: `2.0` plays the input
/// twice as fast (and an octave higher), `48000 / 44100` converts 48 kHz
/// input to 44.1 kHz output. Fractional position and the unconsumed tail
/// carry over between calls, so chunk boundaries are seamless.
#[derive(Debug, Clone)]
pub struct RateResampler {
    channels: usize,
    ratio: f64,
    pos: f64,
    pending: Vec<f32>,
}

impl RateResampler {
    pub fn new(channels: u16, ratio: f64) -> Self {
        let ratio = if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            1.0
        };
        Self {
            channels: usize::from(channels.max(1)),
            ratio,
            pos: 0.0,
            pending: Vec::new(),
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Feed interleaved input and return the interleaved output it yields.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let ch = self.channels;
        self.pending.extend_from_slice(input);
        let pending_frames = self.pending.len() / ch;

        let mut out = Vec::with_capacity(((input.len() / ch) as f64 / self.ratio) as usize * ch + ch);
        while self.pos + 1.0 < pending_frames as f64 {
            let frame0 = self.pos.floor() as usize;
            let frac = (self.pos - frame0 as f64) as f32;
            let i0 = frame0 * ch;
            let i1 = i0 + ch;
            for c in 0..ch {
                let a = self.pending[i0 + c];
                let b = self.pending[i1 + c];
                out.push(a + (b - a) * frac);
            }
            self.pos += self.ratio;
        }

        let consumed = (self.pos.floor() as usize).min(pending_frames.saturating_sub(1));
        self.pending.drain(..consumed * ch);
        self.pos -= consumed as f64;
        out
    }

    /// Drop any buffered input.
    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.pending.clear();
    }
}

/// Convert interleaved samples between channel layouts.
///
/// Mono is duplicated to every output channel; downmixing to mono averages
/// the inputs; other conversions copy matching channels and zero-fill the
/// rest.
pub fn remix_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let from = usize::from(from.max(1));
    let to = usize::from(to.max(1));
    if from == to {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        if from == 1 {
            out.extend(std::iter::repeat(frame[0]).take(to));
        } else if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            for c in 0..to {
                out.push(frame.get(c).copied().unwrap_or(0.0));
            }
        }
    }
    out
}
