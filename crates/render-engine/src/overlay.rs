//! Procedural overlays drawn after the base frame.

use std::f64::consts::{FRAC_PI_2, TAU};

use kurbo::Point;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::surface::{Paint, Surface};

/// Seconds for one full turn of a rotating line.
pub const ROTATION_PERIOD_SECS: f64 = 30.0;

/// Frame rate the rotation increment is derived from.
pub const OVERLAY_FPS: f64 = 30.0;

/// Per-frame phase change of the rotating lines.
pub const PHASE_INCREMENT: f64 = TAU / (ROTATION_PERIOD_SECS * OVERLAY_FPS);

/// Stroke width of the rotating lines in pixels.
pub const LINE_WIDTH: f64 = 2.0;

/// Opacity of the rotating lines.
pub const LINE_ALPHA: f32 = 0.3;

/// Fraction of the surface's pixels marked by the noise overlay each frame.
pub const NOISE_DENSITY: f64 = 0.001;

/// Bright mark intensity.
pub const NOISE_BRIGHT: u8 = 220;

/// Dark mark intensity.
pub const NOISE_DARK: u8 = 30;

/// Wrap an angle into `[0, 2π)`.
pub fn wrap_phase(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative input.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Sparse translucent single-pixel noise.
pub struct PixelNoise {
    rng: Box<dyn RngCore + Send>,
}

impl std::fmt::Debug for PixelNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelNoise").finish_non_exhaustive()
    }
}

impl Default for PixelNoise {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelNoise {
    /// Noise seeded from the operating system; not reproducible.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Noise driven by the given generator.
    pub fn with_rng(rng: impl RngCore + Send + 'static) -> Self {
        Self { rng: Box::new(rng) }
    }

    /// Reproducible noise.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Marks drawn per frame on a `width` x `height` surface.
    pub fn mark_count(width: u32, height: u32) -> u64 {
        (f64::from(width) * f64::from(height) * NOISE_DENSITY).floor() as u64
    }

    /// Scatter one frame's worth of marks. Returns the number drawn.
    pub fn draw(&mut self, surface: &mut Surface) -> u64 {
        let (w, h) = (surface.width(), surface.height());
        let count = Self::mark_count(w, h);
        for _ in 0..count {
            let value = if self.rng.random_bool(0.5) {
                NOISE_BRIGHT
            } else {
                NOISE_DARK
            };
            let alpha: f32 = self.rng.random_range(0.02..0.07);
            let x = self.rng.random_range(0..w);
            let y = self.rng.random_range(0..h);
            surface.fill_rect(
                f64::from(x),
                f64::from(y),
                1.0,
                1.0,
                Paint::grey(value, alpha),
            );
        }
        count
    }
}

/// Two full-diagonal lines turning in opposite directions.
///
/// Line A starts horizontal and advances its phase; line B starts vertical
/// and retreats its phase.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatingLines {
    phase_a: f64,
    phase_b: f64,
}

impl Default for RotatingLines {
    fn default() -> Self {
        Self::new()
    }
}

impl RotatingLines {
    pub fn new() -> Self {
        Self::with_phases(0.0, 0.0)
    }

    /// Start from explicit phases (wrapped into `[0, 2π)`).
    pub fn with_phases(phase_a: f64, phase_b: f64) -> Self {
        Self {
            phase_a: wrap_phase(phase_a),
            phase_b: wrap_phase(phase_b),
        }
    }

    /// Current `(advancing, retreating)` phases.
    pub fn phases(&self) -> (f64, f64) {
        (self.phase_a, self.phase_b)
    }

    /// Step both phases by one frame.
    pub fn advance(&mut self) {
        self.phase_a = wrap_phase(self.phase_a + PHASE_INCREMENT);
        self.phase_b = wrap_phase(self.phase_b - PHASE_INCREMENT);
    }

    /// Draw both lines at the current phases, then advance.
    pub fn draw(&mut self, surface: &mut Surface) {
        let (w, h) = (f64::from(surface.width()), f64::from(surface.height()));
        let half = 0.5 * w.hypot(h);
        let paint = Paint::new([255, 255, 255], LINE_ALPHA);

        for angle in [self.phase_a, FRAC_PI_2 + self.phase_b] {
            surface.save();
            surface.translate(0.5 * w, 0.5 * h);
            surface.rotate(angle);
            surface.stroke_line(
                Point::new(-half, 0.0),
                Point::new(half, 0.0),
                LINE_WIDTH,
                paint,
            );
            surface.restore();
        }

        self.advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidfx_media_core::VideoFrame;

    fn black(w: u32, h: u32) -> Surface {
        let mut surface = Surface::new(w, h).unwrap();
        surface.draw_frame(&VideoFrame::solid(w, h, [0, 0, 0, 255], 0));
        surface
    }

    #[test]
    fn test_mark_count() {
        assert_eq!(PixelNoise::mark_count(1000, 1000), 1000);
        assert_eq!(PixelNoise::mark_count(1920, 1080), 2073);
        assert_eq!(PixelNoise::mark_count(10, 10), 0);
    }

    #[test]
    fn test_noise_draws_faint_grey_marks() {
        let mut surface = black(200, 100);
        let mut noise = PixelNoise::seeded(7);
        assert_eq!(noise.draw(&mut surface), 20);

        let touched: Vec<[u8; 4]> = surface
            .image()
            .pixels()
            .map(|p| p.0)
            .filter(|p| p[0] != 0)
            .collect();
        assert!(!touched.is_empty());
        for p in touched {
            assert_eq!(p[0], p[1]);
            assert_eq!(p[1], p[2]);
            // At most 0.07 of 220 per mark, with a few overlapping.
            assert!(p[0] <= 40, "mark too strong: {p:?}");
        }
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let mut a = black(100, 100);
        let mut b = black(100, 100);
        PixelNoise::seeded(42).draw(&mut a);
        PixelNoise::seeded(42).draw(&mut b);
        assert_eq!(a.image(), b.image());
    }

    #[test]
    fn test_phases_advance_in_opposite_directions() {
        let mut lines = RotatingLines::new();
        lines.advance();
        let (a, b) = lines.phases();
        assert!((a - PHASE_INCREMENT).abs() < 1e-12);
        assert!((b - (TAU - PHASE_INCREMENT)).abs() < 1e-12);
    }

    #[test]
    fn test_full_period_returns_to_start() {
        let mut lines = RotatingLines::new();
        for _ in 0..900 {
            lines.advance();
        }
        let (a, b) = lines.phases();
        let near_zero = |v: f64| v < 1e-9 || TAU - v < 1e-9;
        assert!(near_zero(a), "a = {a}");
        assert!(near_zero(b), "b = {b}");
    }

    #[test]
    fn test_lines_draw_through_center_and_restore_transform() {
        let mut surface = black(64, 48);
        let mut lines = RotatingLines::new();
        lines.draw(&mut surface);
        assert_eq!(surface.save_depth(), 0);
        assert_eq!(surface.transform(), kurbo::Affine::IDENTITY);

        // Line A is horizontal through the centre, line B vertical.
        assert!(surface.pixel(2, 23)[0] > 0);
        assert!(surface.pixel(31, 2)[0] > 0);
        assert_eq!(surface.pixel(2, 2), [0, 0, 0, 255]);
        assert_eq!(lines.phases().0, PHASE_INCREMENT);
    }

    #[test]
    fn test_wrap_phase() {
        assert_eq!(wrap_phase(0.0), 0.0);
        assert!((wrap_phase(-0.5) - (TAU - 0.5)).abs() < 1e-12);
        assert!((wrap_phase(TAU + 1.0) - 1.0).abs() < 1e-12);
        assert!(wrap_phase(-1e-20) < TAU);
    }
}
