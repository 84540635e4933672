//! Check media capabilities.

use vidfx_audio_graph::AudioContext;
use vidfx_capture_engine::encoder::EncoderFactory;
use vidfx_capture_engine::pipeline::{has_time_stretch, init_gstreamer, missing_elements, DECODE_ELEMENTS};
use vidfx_capture_engine::{EncoderFormat, GstEncoderFactory};
use vidfx_common::config::AppConfig;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("vidfx System Check");
    println!("{}", "=".repeat(50));

    if let Err(e) = init_gstreamer() {
        println!("[FAIL] GStreamer: {e}");
        println!();
        println!("GStreamer is required. Install it and its base plugins.");
        return Ok(());
    }
    println!("[OK] GStreamer initialised");

    let missing = missing_elements(DECODE_ELEMENTS);
    let decode_ok = missing.is_empty();
    if decode_ok {
        println!("[OK] Decoding elements present");
    } else {
        println!("[FAIL] Missing decoding elements: {}", missing.join(", "));
    }

    if has_time_stretch() {
        println!("[OK] Pitch-preserving speed change (scaletempo)");
    } else {
        println!("[WARN] scaletempo missing; speed changes will shift pitch");
    }

    let factory = GstEncoderFactory::new();
    let mut any_format = false;
    for format in EncoderFormat::ALL {
        if factory.is_supported(format) {
            any_format = true;
            println!("[OK] Target format: {format} ({})", format.mime_type());
        } else {
            println!(
                "[WARN] Target format unavailable: {format} (needs {})",
                format.required_elements().join(", ")
            );
        }
    }

    let export = &config.export;
    match AudioContext::new(export.audio_sample_rate, export.audio_channels) {
        Ok(mut ctx) => {
            println!(
                "[OK] Audio context: {} Hz, {} channel(s)",
                ctx.sample_rate(),
                ctx.channels()
            );
            ctx.close();
        }
        Err(e) => println!("[WARN] Audio context: {e}; output will be video-only"),
    }

    println!();
    if decode_ok && any_format {
        println!("vidfx is ready.");
    } else {
        println!("Some required capabilities are missing. See above.");
    }
    Ok(())
}
