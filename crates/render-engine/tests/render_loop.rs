use proptest::prelude::*;
use std::f64::consts::TAU;

use vidfx_media_core::{MediaSource, SyntheticSource};
use vidfx_render_engine::{
    FrameOutcome, LoopState, PixelNoise, RenderLoop, RotatingLines, StopReason, Surface,
    PHASE_INCREMENT,
};
use vidfx_settings::Settings;

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn playing(w: u32, h: u32, secs: f64) -> SyntheticSource {
    let mut source = SyntheticSource::new(w, h, secs);
    source.play().unwrap();
    source
}

#[test]
fn test_default_settings_draw_frame_unchanged() {
    let source = playing(16, 8, 1.0);
    let mut surface = Surface::new(16, 8).unwrap();
    let mut render = RenderLoop::new(Settings::default());
    render.start();

    let outcome = render.tick(Some(&source), &mut surface);
    assert_eq!(outcome, FrameOutcome::Drawn { progress: 0 });
    assert_eq!(surface.pixel(0, 0), RED);
    assert_eq!(surface.pixel(15, 7), BLUE);
    assert_eq!(surface.save_depth(), 0);
}

#[test]
fn test_flip_mirrors_frame_only() {
    let source = playing(16, 8, 1.0);
    let mut surface = Surface::new(16, 8).unwrap();
    let settings = Settings {
        flip_horizontal: true,
        ..Settings::default()
    };
    let mut render = RenderLoop::new(settings);
    render.start();
    render.tick(Some(&source), &mut surface);

    assert_eq!(surface.pixel(0, 0), BLUE);
    assert_eq!(surface.pixel(15, 0), RED);
    assert_eq!(surface.transform(), kurbo::Affine::IDENTITY);
}

#[test]
fn test_filter_applies_to_frame() {
    let source = playing(4, 4, 1.0);
    let mut surface = Surface::new(4, 4).unwrap();
    let settings = Settings {
        brightness: 0.0,
        ..Settings::default()
    };
    let mut render = RenderLoop::new(settings);
    render.start();
    render.tick(Some(&source), &mut surface);
    assert_eq!(surface.pixel(0, 0), [0, 0, 0, 255]);
    assert!(surface.filter().is_identity());
}

#[test]
fn test_guard_stops_on_missing_or_inactive_source() {
    let mut surface = Surface::new(4, 4).unwrap();

    let mut render = RenderLoop::new(Settings::default());
    render.start();
    assert_eq!(
        render.tick(None, &mut surface),
        FrameOutcome::Stopped(StopReason::Detached)
    );
    assert_eq!(render.state(), &LoopState::Stopped(StopReason::Detached));

    let mut paused = playing(4, 4, 1.0);
    paused.pause();
    let mut render = RenderLoop::new(Settings::default());
    render.start();
    assert_eq!(
        render.tick(Some(&paused), &mut surface),
        FrameOutcome::Stopped(StopReason::Paused)
    );

    let mut errored = playing(4, 4, 1.0).failing_at(0.0);
    let _ = errored.advance(0.1);
    let mut render = RenderLoop::new(Settings::default());
    render.start();
    assert!(matches!(
        render.tick(Some(&errored), &mut surface),
        FrameOutcome::Stopped(StopReason::Errored(_))
    ));
}

#[test]
fn test_idle_loop_draws_nothing() {
    let source = playing(4, 4, 1.0);
    let mut surface = Surface::new(4, 4).unwrap();
    let mut render = RenderLoop::new(Settings::default());
    assert!(matches!(
        render.tick(Some(&source), &mut surface),
        FrameOutcome::Stopped(_)
    ));
    assert_eq!(surface.pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(render.frames_drawn(), 0);
}

#[test]
fn test_progress_monotone_and_capped_until_complete() {
    let mut source = playing(4, 4, 1.0);
    let mut surface = Surface::new(4, 4).unwrap();
    let mut render = RenderLoop::new(Settings::default());
    render.start();
    assert_eq!(render.progress(), 0);

    let mut last = 0;
    loop {
        match render.tick(Some(&source), &mut surface) {
            FrameOutcome::Drawn { progress } => {
                assert!(progress >= last);
                assert!(progress < 100);
                last = progress;
            }
            FrameOutcome::Stopped(reason) => {
                assert_eq!(reason, StopReason::Ended);
                break;
            }
        }
        source.advance(1.0 / 30.0).unwrap();
    }
    // The last drawn frame sits just short of the end.
    assert!(last >= 96, "last progress {last}");
    assert_eq!(render.complete(), 100);
}

#[test]
fn test_noise_marks_per_frame_on_1000_square() {
    let source = playing(1000, 1000, 1.0);
    let mut surface = Surface::new(1000, 1000).unwrap();
    let settings = Settings {
        enable_pixel_noise: true,
        ..Settings::default()
    };
    let mut render = RenderLoop::new(settings).with_noise(PixelNoise::seeded(3));
    render.start();
    for _ in 0..3 {
        render.tick(Some(&source), &mut surface);
        assert_eq!(render.last_noise_marks(), 1000);
    }
}

#[test]
fn test_disabled_overlays_ignore_injection() {
    let render = RenderLoop::new(Settings::default())
        .with_noise(PixelNoise::seeded(1))
        .with_lines(RotatingLines::with_phases(1.0, 2.0));
    assert!(render.line_phases().is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_line_phases_offset_by_twice_the_increment(frames in 0usize..200) {
        let source = playing(8, 8, 100.0);
        let mut surface = Surface::new(8, 8).unwrap();
        let settings = Settings { enable_rotating_lines: true, ..Settings::default() };
        let mut render = RenderLoop::new(settings);
        render.start();

        for _ in 0..frames {
            render.tick(Some(&source), &mut surface);
            let (a, b) = render.line_phases().unwrap();
            prop_assert!((0.0..TAU).contains(&a));
            prop_assert!((0.0..TAU).contains(&b));
        }

        let (a, b) = render.line_phases().unwrap();
        let expected = (2.0 * frames as f64 * PHASE_INCREMENT).rem_euclid(TAU);
        let diff = (a - b).rem_euclid(TAU);
        let err = (diff - expected).abs();
        prop_assert!(err < 1e-9 || (TAU - err) < 1e-9, "diff {} expected {}", diff, expected);
    }
}
