//! Render a video through the effect pipeline.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use vidfx_capture_engine::{GstEncoderFactory, GstMediaSource, SessionConfig, SessionManager};
use vidfx_common::config::{AppConfig, FramePacing};
use vidfx_settings::{Settings, SettingsStore};

use crate::SettingsArgs;

pub struct ProcessArgs {
    pub input: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub format: Option<String>,
    pub realtime: bool,
    pub use_saved: bool,
    pub settings: SettingsArgs,
}

pub async fn run(config: &AppConfig, args: ProcessArgs) -> anyhow::Result<()> {
    let store = SettingsStore::new(&config.storage.settings_path);
    let base = if args.use_saved {
        store.load()
    } else {
        Settings::default()
    };
    let settings = args.settings.apply(base);

    let mut session_config = SessionConfig::from_export(&config.export)?;
    if let Some(format) = &args.format {
        session_config.format = format.parse()?;
    }
    if args.realtime {
        session_config.pacing = FramePacing::Realtime;
    }
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| config.export.output_dir.clone());

    println!("Processing: {}", args.input.display());
    println!("  Format: {}", session_config.format);
    println!("  Pacing: {:?}", session_config.pacing);
    println!(
        "  Effects: brightness {}%, contrast {}%, saturation {}%, speed {}x, volume {}%",
        settings.brightness,
        settings.contrast,
        settings.saturation,
        settings.playback_speed,
        settings.volume
    );

    let source = GstMediaSource::open(&args.input)?;
    let mut manager = SessionManager::new(Arc::new(GstEncoderFactory::new()), session_config);
    let mut progress = manager
        .start(Box::new(source), settings, &args.input)
        .await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let value = *progress.borrow_and_update();
                print!("\r  Progress: {value:>3}%  ");
                let _ = std::io::stdout().flush();
            }
            _ = &mut ctrl_c => {
                manager.cancel().await;
                println!();
                anyhow::bail!("Interrupted; render cancelled");
            }
        }
    }
    println!();

    let result = manager.wait().await.context("Processing failed")?;

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let output_path = output_dir.join(&result.file_name);
    result.blob.write_to(&output_path)?;

    if let Err(e) = store.save(&settings) {
        tracing::warn!(error = %e, "Failed to persist settings");
    }

    println!("Done: {}", output_path.display());
    println!(
        "  {} frames, {:.2}s video, {}, {} bytes ({})",
        result.frames,
        result.video_secs,
        match result.audio_secs {
            Some(secs) => format!("{secs:.2}s audio"),
            None => "no audio".to_string(),
        },
        result.blob.size(),
        result.blob.mime_type()
    );
    Ok(())
}
