//! The settings value object and its documented ranges.

use serde::{Deserialize, Serialize};

/// Inclusive range and default for a numeric setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl NumericRange {
    /// Clamp `value` into the range. Non-finite values become the default.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }

    /// Whether `value` lies within the range.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Brightness percent (100 = unchanged).
pub const BRIGHTNESS: NumericRange = NumericRange {
    min: 0.0,
    max: 200.0,
    default: 100.0,
};

/// Contrast percent (100 = unchanged).
pub const CONTRAST: NumericRange = NumericRange {
    min: 0.0,
    max: 200.0,
    default: 100.0,
};

/// Saturation percent (100 = unchanged).
pub const SATURATION: NumericRange = NumericRange {
    min: 0.0,
    max: 200.0,
    default: 100.0,
};

/// Playback speed multiplier.
pub const PLAYBACK_SPEED: NumericRange = NumericRange {
    min: 0.5,
    max: 2.0,
    default: 1.0,
};

/// Output volume percent.
pub const VOLUME: NumericRange = NumericRange {
    min: 0.0,
    max: 100.0,
    default: 100.0,
};

/// All adjustable parameters of a render pass.
///
/// Equality is field-wise. Values coming from trusted controls are used
/// as-is; untrusted producers go through [`crate::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Brightness percent, 0–200.
    pub brightness: f64,

    /// Contrast percent, 0–200.
    pub contrast: f64,

    /// Saturation percent, 0–200.
    pub saturation: f64,

    /// Playback rate multiplier, 0.5–2.0.
    pub playback_speed: f64,

    /// Volume percent, 0–100.
    pub volume: f64,

    /// Mirror the frame around the vertical center axis.
    pub flip_horizontal: bool,

    /// Draw the two counter-rotating diagonal lines.
    pub enable_rotating_lines: bool,

    /// Scatter translucent single-pixel noise over each frame.
    pub enable_pixel_noise: bool,

    /// Keep audio pitch constant when the playback rate changes.
    pub audio_preserves_pitch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brightness: BRIGHTNESS.default,
            contrast: CONTRAST.default,
            saturation: SATURATION.default,
            playback_speed: PLAYBACK_SPEED.default,
            volume: VOLUME.default,
            flip_horizontal: false,
            enable_rotating_lines: false,
            enable_pixel_noise: false,
            audio_preserves_pitch: true,
        }
    }
}

impl Settings {
    /// Replace every field with its documented default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Copy of these settings with every numeric field clamped to its range.
    pub fn clamped(self) -> Self {
        Self {
            brightness: BRIGHTNESS.clamp(self.brightness),
            contrast: CONTRAST.clamp(self.contrast),
            saturation: SATURATION.clamp(self.saturation),
            playback_speed: PLAYBACK_SPEED.clamp(self.playback_speed),
            volume: VOLUME.clamp(self.volume),
            ..self
        }
    }

    /// Whether every numeric field lies within its documented range.
    pub fn is_within_ranges(&self) -> bool {
        BRIGHTNESS.contains(self.brightness)
            && CONTRAST.contains(self.contrast)
            && SATURATION.contains(self.saturation)
            && PLAYBACK_SPEED.contains(self.playback_speed)
            && VOLUME.contains(self.volume)
    }

    /// Linear gain applied to the audio path (`volume / 100`).
    pub fn gain(&self) -> f64 {
        VOLUME.clamp(self.volume) / 100.0
    }
}
