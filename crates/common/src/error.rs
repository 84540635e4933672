//! Error types shared across vidfx crates.

use std::path::PathBuf;

/// Top-level error type for vidfx operations.
///
/// The variants follow the failure taxonomy of a render session: setup
/// failures (`SurfaceUnavailable`, `AudioUnavailable`), capability failures
/// (`UnsupportedFormat`), runtime failures (`EncoderInit`, `Encoder`,
/// `Playback`) and suggestion failures (`Suggestion`).
#[derive(Debug, thiserror::Error)]
pub enum VidfxError {
    #[error("Drawing surface unavailable: {message}")]
    SurfaceUnavailable { message: String },

    #[error("Audio subsystem unavailable: {message}")]
    AudioUnavailable { message: String },

    #[error("Unsupported output format: {message}")]
    UnsupportedFormat { message: String },

    #[error("Failed to create encoder: {message}")]
    EncoderInit { message: String },

    #[error("Encoder error: {message}")]
    Encoder { message: String },

    #[error("Source playback error: {message}")]
    Playback { message: String },

    #[error("Audio routing error: {message}")]
    AudioRoute { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Suggestion error: {message}")]
    Suggestion { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Processing cancelled: {message}")]
    Cancelled { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VidfxError.
pub type VidfxResult<T> = Result<T, VidfxError>;

/// A structured failure reported by a media runtime component.
///
/// Mirrors what encoders and decoders hand back on failure: an optional
/// error name (domain/kind) and an optional human-readable message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFault {
    pub name: Option<String>,
    pub message: Option<String>,
}

impl MediaFault {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: Some(message.into()),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: Some(message.into()),
        }
    }
}

/// Normalize an optional fault into one descriptive message.
///
/// Prefers `name: message`, then whichever of the two is present, then the
/// supplied generic fallback.
pub fn describe_fault(fault: Option<&MediaFault>, fallback: &str) -> String {
    fn non_empty(s: &Option<String>) -> Option<&str> {
        s.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
    match fault {
        Some(f) => match (non_empty(&f.name), non_empty(&f.message)) {
            (Some(name), Some(message)) => format!("{name}: {message}"),
            (None, Some(message)) => message.to_string(),
            (Some(name), None) => name.to_string(),
            (None, None) => fallback.to_string(),
        },
        None => fallback.to_string(),
    }
}

impl VidfxError {
    pub fn surface_unavailable(msg: impl Into<String>) -> Self {
        Self::SurfaceUnavailable {
            message: msg.into(),
        }
    }

    pub fn audio_unavailable(msg: impl Into<String>) -> Self {
        Self::AudioUnavailable {
            message: msg.into(),
        }
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: msg.into(),
        }
    }

    pub fn encoder_init(msg: impl Into<String>) -> Self {
        Self::EncoderInit {
            message: msg.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder {
            message: msg.into(),
        }
    }

    /// Runtime encoder failure built from a structured fault.
    pub fn encoder_fault(fault: Option<&MediaFault>) -> Self {
        Self::encoder(describe_fault(
            fault,
            "An unknown error occurred while recording",
        ))
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback {
            message: msg.into(),
        }
    }

    pub fn audio_route(msg: impl Into<String>) -> Self {
        Self::AudioRoute {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn suggestion(msg: impl Into<String>) -> Self {
        Self::Suggestion {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled {
            message: msg.into(),
        }
    }

    /// Whether this error was caused by a newer request superseding the session.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_fault_prefers_name_and_message() {
        let fault = MediaFault::new("NotSupportedError", "codec rejected");
        assert_eq!(
            describe_fault(Some(&fault), "generic"),
            "NotSupportedError: codec rejected"
        );
    }

    #[test]
    fn test_describe_fault_falls_back() {
        assert_eq!(describe_fault(None, "generic"), "generic");
        let empty = MediaFault {
            name: Some("  ".into()),
            message: None,
        };
        assert_eq!(describe_fault(Some(&empty), "generic"), "generic");
        assert_eq!(
            describe_fault(Some(&MediaFault::message("boom")), "generic"),
            "boom"
        );
    }

    #[test]
    fn test_encoder_fault_message() {
        let err = VidfxError::encoder_fault(None);
        assert_eq!(
            err.to_string(),
            "Encoder error: An unknown error occurred while recording"
        );
    }
}
