//! vidfx CLI: command-line interface for effect rendering and settings.
//!
//! Usage:
//!   vidfx process <INPUT> [OPTIONS]   Render a video with the current effects
//!   vidfx suggest <TEXT> [--apply]    Ask the assistant for settings
//!   vidfx settings show|reset|set     Inspect or edit the saved settings
//!   vidfx check                       Check media capabilities

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vidfx_settings::Settings;

mod commands;

#[derive(Parser)]
#[command(
    name = "vidfx",
    about = "Real-time video effects with an AI settings assistant",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a video through the effect pipeline
    Process {
        /// Input video file
        input: PathBuf,

        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Target format: webm-vp8-opus, webm-vp9-opus or mp4-h264-aac
        #[arg(long)]
        format: Option<String>,

        /// Pace frames at the display rate instead of as fast as possible
        #[arg(long)]
        realtime: bool,

        /// Start from the saved settings instead of the defaults
        #[arg(long)]
        use_saved: bool,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Ask the assistant for settings matching a description
    Suggest {
        /// Free-text description of the edit
        text: String,

        /// Save the suggestion as the current settings
        #[arg(long)]
        apply: bool,
    },

    /// Inspect or edit the saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Check media capabilities
    Check,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the saved settings as JSON
    Show,
    /// Restore every field to its default
    Reset,
    /// Change individual fields
    Set {
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

/// Per-field overrides; unset flags keep the base value.
#[derive(Args, Debug, Default, Clone)]
pub struct SettingsArgs {
    /// Brightness percent [0, 200]
    #[arg(long)]
    brightness: Option<f64>,

    /// Contrast percent [0, 200]
    #[arg(long)]
    contrast: Option<f64>,

    /// Saturation percent [0, 200]
    #[arg(long)]
    saturation: Option<f64>,

    /// Playback speed multiplier [0.5, 2]
    #[arg(long)]
    speed: Option<f64>,

    /// Volume percent [0, 100]
    #[arg(long)]
    volume: Option<f64>,

    /// Mirror the picture horizontally
    #[arg(long)]
    flip: Option<bool>,

    /// Draw the rotating line overlay
    #[arg(long)]
    rotating_lines: Option<bool>,

    /// Draw the pixel noise overlay
    #[arg(long)]
    pixel_noise: Option<bool>,

    /// Keep the audio pitch when the speed changes
    #[arg(long)]
    preserve_pitch: Option<bool>,
}

impl SettingsArgs {
    /// Apply the given overrides to `base`, clamping numeric values.
    pub fn apply(&self, base: Settings) -> Settings {
        let mut settings = base;
        if let Some(v) = self.brightness {
            settings.brightness = v;
        }
        if let Some(v) = self.contrast {
            settings.contrast = v;
        }
        if let Some(v) = self.saturation {
            settings.saturation = v;
        }
        if let Some(v) = self.speed {
            settings.playback_speed = v;
        }
        if let Some(v) = self.volume {
            settings.volume = v;
        }
        if let Some(v) = self.flip {
            settings.flip_horizontal = v;
        }
        if let Some(v) = self.rotating_lines {
            settings.enable_rotating_lines = v;
        }
        if let Some(v) = self.pixel_noise {
            settings.enable_pixel_noise = v;
        }
        if let Some(v) = self.preserve_pitch {
            settings.audio_preserves_pitch = v;
        }
        settings.clamped()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = vidfx_common::config::AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    vidfx_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Process {
            input,
            output_dir,
            format,
            realtime,
            use_saved,
            settings,
        } => {
            commands::process::run(
                &config,
                commands::process::ProcessArgs {
                    input,
                    output_dir,
                    format,
                    realtime,
                    use_saved,
                    settings,
                },
            )
            .await
        }
        Commands::Suggest { text, apply } => commands::suggest::run(&config, text, apply).await,
        Commands::Settings { action } => match action {
            SettingsAction::Show => commands::settings::show(&config),
            SettingsAction::Reset => commands::settings::reset(&config),
            SettingsAction::Set { settings } => commands::settings::set(&config, &settings),
        },
        Commands::Check => commands::check::run(&config),
    }
}
