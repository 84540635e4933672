//! CPU drawing surface with a canvas-style transform stack.
//!
//! The surface is sized to the source's native dimensions. Draw calls are
//! issued in user space and mapped to pixels through the current transform
//! (`translate`/`scale`/`rotate` post-multiply, as on an HTML canvas).
//! `save()`/`restore()` push and pop the transform together with the colour
//! filter.

use image::{Rgba, RgbaImage};
use kurbo::{Affine, Point, Rect, Vec2};
use vidfx_common::error::{VidfxError, VidfxResult};
use vidfx_media_core::VideoFrame;

use crate::filter::ColorFilter;

/// Largest accepted surface edge in pixels.
pub const MAX_DIMENSION: u32 = 16_384;

/// A straight-alpha colour used for fills and strokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub rgb: [u8; 3],
    /// Opacity in `[0, 1]`.
    pub alpha: f32,
}

impl Paint {
    pub fn new(rgb: [u8; 3], alpha: f32) -> Self {
        Self {
            rgb,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    /// A grey with the same value on every channel.
    pub fn grey(value: u8, alpha: f32) -> Self {
        Self::new([value; 3], alpha)
    }
}

#[derive(Debug, Clone)]
struct DrawState {
    transform: Affine,
    filter: ColorFilter,
}

/// The drawing surface a render loop paints into.
#[derive(Debug)]
pub struct Surface {
    image: RgbaImage,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl Surface {
    /// Allocate a transparent surface.
    pub fn new(width: u32, height: u32) -> VidfxResult<Self> {
        if width == 0 || height == 0 {
            return Err(VidfxError::surface_unavailable(format!(
                "cannot create a {width}x{height} surface"
            )));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(VidfxError::surface_unavailable(format!(
                "{width}x{height} exceeds the {MAX_DIMENSION} pixel limit"
            )));
        }
        Ok(Self {
            image: RgbaImage::new(width, height),
            state: DrawState {
                transform: Affine::IDENTITY,
                filter: ColorFilter::default(),
            },
            stack: Vec::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Current pixel contents.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Pixel at `(x, y)`; panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Copy the current contents into a frame stamped with `pts_ns`.
    pub fn snapshot(&self, pts_ns: u64) -> VideoFrame {
        VideoFrame::new(self.image.clone(), pts_ns)
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        for px in self.image.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    /// Push the current transform and filter.
    pub fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    /// Pop the most recently saved state; no-op when nothing is saved.
    pub fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    /// Depth of the save stack.
    pub fn save_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.state.transform = self.state.transform * Affine::translate((dx, dy));
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.state.transform = self.state.transform * Affine::scale_non_uniform(sx, sy);
    }

    /// Rotate clockwise (y axis pointing down) by `radians`.
    pub fn rotate(&mut self, radians: f64) {
        self.state.transform = self.state.transform * Affine::rotate(radians);
    }

    pub fn transform(&self) -> Affine {
        self.state.transform
    }

    pub fn set_filter(&mut self, filter: ColorFilter) {
        self.state.filter = filter;
    }

    pub fn filter(&self) -> &ColorFilter {
        &self.state.filter
    }

    /// Draw `frame` stretched over the full surface bounds in user space,
    /// through the current transform and filter.
    pub fn draw_frame(&mut self, frame: &VideoFrame) {
        let (w, h) = (self.width(), self.height());
        let (fw, fh) = (frame.width(), frame.height());
        if fw == 0 || fh == 0 {
            return;
        }
        let transform = self.state.transform;
        let filter = &self.state.filter;

        if (fw, fh) == (w, h) {
            if transform == Affine::IDENTITY {
                copy_rows(&mut self.image, frame, filter, false);
                return;
            }
            if transform == Affine::new([-1.0, 0.0, 0.0, 1.0, f64::from(w), 0.0]) {
                copy_rows(&mut self.image, frame, filter, true);
                return;
            }
        }

        let det = transform.determinant();
        if det.abs() < f64::EPSILON {
            return;
        }
        let inverse = transform.inverse();
        let dest = Rect::new(0.0, 0.0, f64::from(w), f64::from(h));
        let bbox = transform.transform_rect_bbox(dest).intersect(dest);
        let (x0, y0, x1, y1) = pixel_span(bbox, w, h);
        let sx = f64::from(fw) / f64::from(w);
        let sy = f64::from(fh) / f64::from(h);

        for y in y0..y1 {
            for x in x0..x1 {
                let p = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if p.x < 0.0 || p.y < 0.0 || p.x >= f64::from(w) || p.y >= f64::from(h) {
                    continue;
                }
                let fx = ((p.x * sx) as u32).min(fw - 1);
                let fy = ((p.y * sy) as u32).min(fh - 1);
                let mut src = frame.pixel(fx, fy);
                filter.apply_rgba(&mut src);
                let dst = self.image.get_pixel_mut(x, y);
                if src[3] == 255 {
                    *dst = Rgba(src);
                } else {
                    blend(
                        dst,
                        Paint::new([src[0], src[1], src[2]], f32::from(src[3]) / 255.0),
                    );
                }
            }
        }
    }

    /// Fill an axis-aligned user-space rectangle. Under a rotating
    /// transform the filled area is the rectangle's bounding box.
    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, paint: Paint) {
        let (w, h) = (self.width(), self.height());
        let rect = self
            .state
            .transform
            .transform_rect_bbox(Rect::new(x, y, x + width, y + height));
        let (x0, y0, x1, y1) = pixel_span(rect, w, h);
        for py in y0..y1 {
            for px in x0..x1 {
                blend(self.image.get_pixel_mut(px, py), paint);
            }
        }
    }

    /// Stroke a straight segment with butt caps.
    pub fn stroke_line(&mut self, from: Point, to: Point, width: f64, paint: Paint) {
        let transform = self.state.transform;
        let a = transform * from;
        let b = transform * to;
        let half = 0.5 * width * transform.determinant().abs().sqrt();
        let along = b - a;
        let len = along.hypot();
        if len < f64::EPSILON || half <= 0.0 {
            return;
        }
        let dir = along / len;
        let normal = Vec2::new(-dir.y, dir.x);

        let (w, h) = (self.width(), self.height());
        let ymin = (a.y.min(b.y) - half).floor().max(0.0) as u32;
        let ymax = ((a.y.max(b.y) + half).ceil().max(0.0) as u32).min(h);

        for y in ymin..ymax {
            let cy = f64::from(y) + 0.5;
            // Pixel centre (cx, cy) is covered when its distance across the
            // line is within `half` and its projection along it is within
            // the segment; both constraints are linear in cx.
            let across = solve_interval(
                normal.x,
                normal.y * (cy - a.y) - normal.x * a.x,
                -half,
                half,
            );
            let span = solve_interval(dir.x, dir.y * (cy - a.y) - dir.x * a.x, 0.0, len);
            let Some((lo, hi)) = intersect(across, span) else {
                continue;
            };
            let first = (lo - 0.5).ceil().max(0.0);
            let last = (hi - 0.5).floor();
            if last < first {
                continue;
            }
            let first = first as u32;
            let last = (last as u32).min(w - 1);
            for x in first..=last {
                blend(self.image.get_pixel_mut(x, y), paint);
            }
        }
    }
}

/// Solve `lo <= a * x + b <= hi` for `x`.
fn solve_interval(a: f64, b: f64, lo: f64, hi: f64) -> Option<(f64, f64)> {
    if a.abs() < 1e-12 {
        return (lo..=hi)
            .contains(&b)
            .then_some((f64::NEG_INFINITY, f64::INFINITY));
    }
    let x1 = (lo - b) / a;
    let x2 = (hi - b) / a;
    Some((x1.min(x2), x1.max(x2)))
}

fn intersect(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<(f64, f64)> {
    let (a, b) = (a?, b?);
    let lo = a.0.max(b.0);
    let hi = a.1.min(b.1);
    (lo <= hi).then_some((lo, hi))
}

/// Pixels whose centres fall inside `rect`, clipped to the surface.
fn pixel_span(rect: Rect, w: u32, h: u32) -> (u32, u32, u32, u32) {
    let clip = |v: f64, max: u32| v.max(0.0).min(f64::from(max)) as u32;
    (
        clip((rect.x0 - 0.5).ceil(), w),
        clip((rect.y0 - 0.5).ceil(), h),
        clip((rect.x1 - 0.5).ceil(), w),
        clip((rect.y1 - 0.5).ceil(), h),
    )
}

/// Same-size copy, optionally mirrored horizontally.
fn copy_rows(dst: &mut RgbaImage, frame: &VideoFrame, filter: &ColorFilter, mirror: bool) {
    let row_len = dst.width() as usize * 4;
    let identity = filter.is_identity();
    for (dst_row, src_row) in dst
        .chunks_exact_mut(row_len)
        .zip(frame.as_bytes().chunks_exact(row_len))
    {
        if !mirror && identity {
            dst_row.copy_from_slice(src_row);
            continue;
        }
        let last = row_len / 4 - 1;
        for (i, s) in src_row.chunks_exact(4).enumerate() {
            let mut px = [s[0], s[1], s[2], s[3]];
            filter.apply_rgba(&mut px);
            let at = (if mirror { last - i } else { i }) * 4;
            dst_row[at..at + 4].copy_from_slice(&px);
        }
    }
}

/// Source-over composite of `paint` onto `dst`.
fn blend(dst: &mut Rgba<u8>, paint: Paint) {
    let a = paint.alpha;
    if a <= 0.0 {
        return;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = a + da * (1.0 - a);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let s = f32::from(paint.rgb[c]);
        let d = f32::from(dst[c]);
        let v = (s * a + d * da * (1.0 - a)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn halves(w: u32, h: u32) -> VideoFrame {
        let image = RgbaImage::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        VideoFrame::new(image, 0)
    }

    #[test]
    fn test_zero_size_surface_is_unavailable() {
        assert!(matches!(
            Surface::new(0, 10),
            Err(VidfxError::SurfaceUnavailable { .. })
        ));
        assert!(Surface::new(MAX_DIMENSION + 1, 10).is_err());
    }

    #[test]
    fn test_draw_frame_identity() {
        let mut surface = Surface::new(8, 4).unwrap();
        surface.draw_frame(&halves(8, 4));
        assert_eq!(surface.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(surface.pixel(7, 3), [0, 0, 255, 255]);
    }

    #[test]
    fn test_flip_mirrors_frame() {
        let mut surface = Surface::new(8, 4).unwrap();
        surface.save();
        surface.translate(8.0, 0.0);
        surface.scale(-1.0, 1.0);
        surface.draw_frame(&halves(8, 4));
        surface.restore();
        assert_eq!(surface.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(surface.pixel(7, 3), [255, 0, 0, 255]);
        assert_eq!(surface.transform(), Affine::IDENTITY);
    }

    #[test]
    fn test_frame_is_stretched_to_bounds() {
        let mut surface = Surface::new(16, 8).unwrap();
        surface.draw_frame(&halves(4, 2));
        assert_eq!(surface.pixel(7, 0), [255, 0, 0, 255]);
        assert_eq!(surface.pixel(8, 7), [0, 0, 255, 255]);
    }

    #[test]
    fn test_flip_on_scaled_frame_uses_general_path() {
        let mut surface = Surface::new(16, 8).unwrap();
        surface.translate(16.0, 0.0);
        surface.scale(-1.0, 1.0);
        surface.draw_frame(&halves(4, 2));
        assert_eq!(surface.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(surface.pixel(15, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn test_filter_saved_and_restored() {
        let mut surface = Surface::new(2, 2).unwrap();
        surface.save();
        surface.set_filter(ColorFilter::new(0.0, 1.0, 1.0));
        surface.draw_frame(&VideoFrame::solid(2, 2, [200, 200, 200, 255], 0));
        surface.restore();
        assert!(surface.filter().is_identity());
        assert_eq!(surface.pixel(1, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn test_restore_without_save_is_noop() {
        let mut surface = Surface::new(2, 2).unwrap();
        surface.translate(1.0, 1.0);
        surface.restore();
        assert_eq!(surface.transform(), Affine::translate((1.0, 1.0)));
        assert_eq!(surface.save_depth(), 0);
    }

    #[test]
    fn test_fill_rect_single_pixel_blends() {
        let mut surface = Surface::new(4, 4).unwrap();
        surface.draw_frame(&VideoFrame::solid(4, 4, [0, 0, 0, 255], 0));
        surface.fill_rect(2.0, 1.0, 1.0, 1.0, Paint::grey(220, 0.5));
        assert_eq!(surface.pixel(2, 1), [110, 110, 110, 255]);
        assert_eq!(surface.pixel(1, 1), [0, 0, 0, 255]);
        assert_eq!(surface.pixel(3, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn test_horizontal_stroke_covers_expected_rows() {
        let mut surface = Surface::new(10, 10).unwrap();
        surface.stroke_line(
            Point::new(0.0, 5.0),
            Point::new(10.0, 5.0),
            2.0,
            Paint::new([255, 255, 255], 1.0),
        );
        for x in 0..10 {
            assert_eq!(surface.pixel(x, 4)[3], 255);
            assert_eq!(surface.pixel(x, 5)[3], 255);
            assert_eq!(surface.pixel(x, 3)[3], 0);
            assert_eq!(surface.pixel(x, 6)[3], 0);
        }
    }

    #[test]
    fn test_rotated_stroke_is_vertical() {
        let mut surface = Surface::new(10, 10).unwrap();
        surface.translate(5.0, 5.0);
        surface.rotate(std::f64::consts::FRAC_PI_2);
        surface.stroke_line(
            Point::new(-10.0, 0.0),
            Point::new(10.0, 0.0),
            2.0,
            Paint::new([255, 255, 255], 1.0),
        );
        for y in 0..10 {
            assert_eq!(surface.pixel(4, y)[3], 255);
            assert_eq!(surface.pixel(5, y)[3], 255);
            assert_eq!(surface.pixel(2, y)[3], 0);
        }
    }
}
