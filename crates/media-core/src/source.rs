//! The playback element a render session decodes from.

use vidfx_common::error::VidfxResult;

use crate::audio::AudioChunk;
use crate::frame::VideoFrame;

/// Static properties of an opened source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    /// Native frame width in pixels.
    pub width: u32,

    /// Native frame height in pixels.
    pub height: u32,

    /// Total media duration in seconds.
    pub duration_secs: f64,

    /// Native frame rate, when known.
    pub frame_rate: Option<f64>,
}

/// Playback state of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    /// Opened, not yet playing.
    Idle,
    /// Advancing.
    Playing,
    /// Paused by the owner.
    Paused,
    /// Reached the end of the media.
    Ended,
    /// Decoding or playback failed.
    Errored(String),
    /// The source reference was released.
    Detached,
}

impl PlaybackState {
    /// Whether this state ends playback for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ended | PlaybackState::Errored(_) | PlaybackState::Detached
        )
    }
}

/// Result of probing a source for audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioPresence {
    /// The source carries decodable audio in this format.
    Present { sample_rate: u32, channels: u16 },
    /// No positive audio signal was found.
    Absent,
}

/// A decoding playback element.
///
/// Time only moves through [`MediaSource::advance`]: the owner passes the
/// wall-clock time elapsed since the previous frame and the source moves
/// its position forward by `wall_secs * playback_rate`. Audio produced by
/// an advance is already at output speed: time-stretched when pitch is
/// preserved and the source supports it, resampled (pitch-shifted)
/// otherwise.
pub trait MediaSource: Send {
    /// Dimensions, duration and rate.
    fn info(&self) -> SourceInfo;

    /// Current playback state.
    fn state(&self) -> PlaybackState;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// The frame at the current position, once one has been decoded.
    fn current_frame(&self) -> Option<&VideoFrame>;

    /// Look for an audio track. Errors mean the lookup itself failed.
    fn inspect_audio(&self) -> VidfxResult<AudioPresence>;

    /// Set the playback rate multiplier.
    fn set_playback_rate(&mut self, rate: f64);

    /// Request pitch preservation; returns `false` when the source has no
    /// time-stretch capability (the request then has no effect).
    fn set_preserves_pitch(&mut self, preserve: bool) -> bool;

    /// Start or resume playback.
    fn play(&mut self) -> VidfxResult<()>;

    /// Pause playback.
    fn pause(&mut self);

    /// Move playback forward by `wall_secs` of wall-clock time.
    fn advance(&mut self, wall_secs: f64) -> VidfxResult<()>;

    /// Audio produced since the previous call, if any.
    fn take_audio(&mut self) -> Option<AudioChunk>;

    /// Release the underlying media. The source is unusable afterwards.
    fn detach(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PlaybackState::Ended.is_terminal());
        assert!(PlaybackState::Errored("x".into()).is_terminal());
        assert!(PlaybackState::Detached.is_terminal());
        assert!(!PlaybackState::Paused.is_terminal());
        assert!(!PlaybackState::Playing.is_terminal());
    }
}
