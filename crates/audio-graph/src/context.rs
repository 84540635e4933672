//! The audio processing context.

use vidfx_common::error::{VidfxError, VidfxResult};

/// Lowest accepted context sample rate.
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Highest accepted context sample rate.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Lifecycle of an [`AudioContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Closed,
}

/// Owns the output format shared by every node of a route.
#[derive(Debug)]
pub struct AudioContext {
    sample_rate: u32,
    channels: u16,
    state: ContextState,
}

impl AudioContext {
    /// Create a running context.
    ///
    /// Fails with `AudioUnavailable` when the requested format cannot be
    /// served (sample rate outside 8–192 kHz, or other than 1–2 channels).
    pub fn new(sample_rate: u32, channels: u16) -> VidfxResult<Self> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(VidfxError::audio_unavailable(format!(
                "sample rate {sample_rate} Hz is outside {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE}"
            )));
        }
        if !(1..=2).contains(&channels) {
            return Err(VidfxError::audio_unavailable(format!(
                "{channels} output channels requested; only mono and stereo are supported"
            )));
        }
        tracing::debug!(sample_rate, channels, "Audio context created");
        Ok(Self {
            sample_rate,
            channels,
            state: ContextState::Running,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ContextState::Closed
    }

    /// Close the context. Returns `true` if this call closed it; closing
    /// again is a no-op.
    pub fn close(&mut self) -> bool {
        if self.state == ContextState::Closed {
            return false;
        }
        self.state = ContextState::Closed;
        tracing::debug!("Audio context closed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unservable_formats() {
        assert!(matches!(
            AudioContext::new(4_000, 2),
            Err(VidfxError::AudioUnavailable { .. })
        ));
        assert!(matches!(
            AudioContext::new(48_000, 6),
            Err(VidfxError::AudioUnavailable { .. })
        ));
        assert!(AudioContext::new(44_100, 1).is_ok());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut ctx = AudioContext::new(48_000, 2).unwrap();
        assert_eq!(ctx.state(), ContextState::Running);
        assert!(ctx.close());
        assert!(!ctx.close());
        assert!(ctx.is_closed());
    }
}
