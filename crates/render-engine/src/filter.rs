//! Colour filter with CSS Filter Effects semantics.
//!
//! `brightness()`, `contrast()` and `saturate()` are applied in that order,
//! each clamped to the displayable range before the next one runs.

use vidfx_settings::Settings;

/// Rec. 709 luminance weights used by `saturate()`.
const LUMA: [f32; 3] = [0.213, 0.715, 0.072];

/// A brightness/contrast/saturation filter expressed as multipliers
/// (`1.0` leaves the image unchanged).
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFilter {
    brightness: f32,
    contrast: f32,
    saturate: f32,
    tone: [f32; 256],
    matrix: [[f32; 3]; 3],
}

impl Default for ColorFilter {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

impl ColorFilter {
    /// Build a filter from multipliers. Negative or non-finite input is
    /// treated as `0.0` / `1.0` respectively.
    pub fn new(brightness: f64, contrast: f64, saturate: f64) -> Self {
        let sane = |v: f64| {
            if v.is_finite() {
                v.max(0.0) as f32
            } else {
                1.0
            }
        };
        let (brightness, contrast, saturate) = (sane(brightness), sane(contrast), sane(saturate));

        // brightness and contrast act per channel, so they fold into one
        // lookup table over the 8-bit input.
        let mut tone = [0.0f32; 256];
        for (i, slot) in tone.iter_mut().enumerate() {
            let v = i as f32 / 255.0;
            let v = (v * brightness).clamp(0.0, 1.0);
            let v = (v * contrast + (0.5 - 0.5 * contrast)).clamp(0.0, 1.0);
            *slot = v;
        }

        let s = saturate;
        let matrix = if s == 1.0 {
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
        } else {
            [
                [
                    LUMA[0] + (1.0 - LUMA[0]) * s,
                    LUMA[1] - LUMA[1] * s,
                    LUMA[2] - LUMA[2] * s,
                ],
                [
                    LUMA[0] - LUMA[0] * s,
                    LUMA[1] + (1.0 - LUMA[1]) * s,
                    LUMA[2] - LUMA[2] * s,
                ],
                [
                    LUMA[0] - LUMA[0] * s,
                    LUMA[1] - LUMA[1] * s,
                    LUMA[2] + (1.0 - LUMA[2]) * s,
                ],
            ]
        };

        Self {
            brightness,
            contrast,
            saturate,
            tone,
            matrix,
        }
    }

    /// Filter for the percent values of a settings object.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.brightness / 100.0,
            settings.contrast / 100.0,
            settings.saturation / 100.0,
        )
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn contrast(&self) -> f32 {
        self.contrast
    }

    pub fn saturate(&self) -> f32 {
        self.saturate
    }

    /// Whether the filter leaves every colour unchanged.
    pub fn is_identity(&self) -> bool {
        self.brightness == 1.0 && self.contrast == 1.0 && self.saturate == 1.0
    }

    /// Filter one RGB triple. Alpha is not affected by these filters.
    pub fn apply(&self, rgb: [u8; 3]) -> [u8; 3] {
        if self.is_identity() {
            return rgb;
        }
        let r = self.tone[usize::from(rgb[0])];
        let g = self.tone[usize::from(rgb[1])];
        let b = self.tone[usize::from(rgb[2])];
        let mut out = [0u8; 3];
        for (o, row) in out.iter_mut().zip(&self.matrix) {
            let v = row[0] * r + row[1] * g + row[2] * b;
            *o = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        out
    }

    /// Filter an RGBA pixel in place.
    pub fn apply_rgba(&self, px: &mut [u8; 4]) {
        let [r, g, b] = self.apply([px[0], px[1], px[2]]);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_identity() {
        let filter = ColorFilter::from_settings(&Settings::default());
        assert!(filter.is_identity());
        assert_eq!(filter.apply([12, 130, 250]), [12, 130, 250]);
    }

    #[test]
    fn test_brightness_is_linear_and_clamped() {
        let filter = ColorFilter::new(2.0, 1.0, 1.0);
        assert_eq!(filter.apply([50, 100, 200]), [100, 200, 255]);
        let dark = ColorFilter::new(0.0, 1.0, 1.0);
        assert_eq!(dark.apply([50, 100, 200]), [0, 0, 0]);
    }

    #[test]
    fn test_zero_contrast_is_mid_grey() {
        let filter = ColorFilter::new(1.0, 0.0, 1.0);
        assert_eq!(filter.apply([0, 77, 255]), [128, 128, 128]);
    }

    #[test]
    fn test_zero_saturation_is_luminance() {
        let filter = ColorFilter::new(1.0, 1.0, 0.0);
        let [r, g, b] = filter.apply([255, 0, 0]);
        assert_eq!(r, g);
        assert_eq!(g, b);
        // 0.213 * 255
        assert_eq!(r, 54);
    }

    #[test]
    fn test_brightness_applies_before_contrast() {
        // brightness(0) then contrast(2): black stays black
        // (0 * 2 + 0.5 - 1.0 clamps to 0).
        let filter = ColorFilter::new(0.0, 2.0, 1.0);
        assert_eq!(filter.apply([200, 200, 200]), [0, 0, 0]);
    }

    #[test]
    fn test_alpha_untouched() {
        let filter = ColorFilter::new(1.5, 1.0, 1.0);
        let mut px = [100, 100, 100, 42];
        filter.apply_rgba(&mut px);
        assert_eq!(px, [150, 150, 150, 42]);
    }
}
