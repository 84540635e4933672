//! Recorder contracts: target formats, encoder lifecycle and events.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use vidfx_common::error::{MediaFault, VidfxError, VidfxResult};
use vidfx_media_core::{AudioChunk, VideoFrame};

/// Closed set of container/codec pairs an export can target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EncoderFormat {
    /// WebM with VP8 video and Opus audio.
    #[default]
    WebmVp8Opus,
    /// WebM with VP9 video and Opus audio.
    WebmVp9Opus,
    /// Fragmented MP4 with H.264 video and AAC audio.
    Mp4H264Aac,
}

impl EncoderFormat {
    /// Every supported format, default first.
    pub const ALL: [EncoderFormat; 3] = [
        EncoderFormat::WebmVp8Opus,
        EncoderFormat::WebmVp9Opus,
        EncoderFormat::Mp4H264Aac,
    ];

    /// Short identifier used in configuration and on the command line.
    pub fn id(&self) -> &'static str {
        match self {
            EncoderFormat::WebmVp8Opus => "webm-vp8-opus",
            EncoderFormat::WebmVp9Opus => "webm-vp9-opus",
            EncoderFormat::Mp4H264Aac => "mp4-h264-aac",
        }
    }

    /// MIME type the resulting blob is tagged with.
    pub fn mime_type(&self) -> &'static str {
        match self {
            EncoderFormat::WebmVp8Opus => "video/webm;codecs=vp8,opus",
            EncoderFormat::WebmVp9Opus => "video/webm;codecs=vp9,opus",
            EncoderFormat::Mp4H264Aac => "video/mp4;codecs=avc1,mp4a",
        }
    }

    /// File extension of the container.
    pub fn extension(&self) -> &'static str {
        match self {
            EncoderFormat::WebmVp8Opus | EncoderFormat::WebmVp9Opus => "webm",
            EncoderFormat::Mp4H264Aac => "mp4",
        }
    }

    /// GStreamer elements the encode pipeline for this format needs.
    pub fn required_elements(&self) -> &'static [&'static str] {
        match self {
            EncoderFormat::WebmVp8Opus => &["vp8enc", "opusenc", "webmmux"],
            EncoderFormat::WebmVp9Opus => &["vp9enc", "opusenc", "webmmux"],
            EncoderFormat::Mp4H264Aac => &["x264enc", "h264parse", "avenc_aac", "mp4mux"],
        }
    }
}

impl fmt::Display for EncoderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EncoderFormat {
    type Err = VidfxError;

    /// Accepts the short identifier or the MIME type, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(' ', "");
        EncoderFormat::ALL
            .into_iter()
            .find(|f| f.id() == wanted || f.mime_type() == wanted)
            .ok_or_else(|| {
                VidfxError::unsupported_format(format!(
                    "'{s}' is not a known target (expected one of: {})",
                    EncoderFormat::ALL.map(|f| f.id()).join(", ")
                ))
            })
    }
}

/// Derived download name: `modified_<input stem>.<ext>`.
pub fn output_file_name(input: &Path, format: EncoderFormat) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());
    format!("modified_{stem}.{}", format.extension())
}

/// Audio layout fed to an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Parameters of one encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub format: EncoderFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// `None` records video only.
    pub audio: Option<AudioFormat>,
}

/// Recorder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
    Stopped,
    Errored,
}

/// Asynchronous notifications from an encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderEvent {
    /// A chunk of encoded container bytes (may be empty).
    Data(Vec<u8>),
    /// The encoder failed; the fault may be missing details.
    Error(Option<MediaFault>),
    /// Stop completed and every chunk has been delivered.
    Stopped,
}

/// A running recorder fed with rendered frames and routed audio.
pub trait MediaEncoder: Send {
    /// MIME type of the produced container.
    fn mime_type(&self) -> &str;

    /// Current lifecycle state.
    fn state(&self) -> RecorderState;

    /// Begin accepting data.
    fn start(&mut self) -> VidfxResult<()>;

    /// Submit one captured frame.
    fn write_video(&mut self, frame: &VideoFrame) -> VidfxResult<()>;

    /// Submit routed audio.
    fn write_audio(&mut self, chunk: &AudioChunk) -> VidfxResult<()>;

    /// Collect events raised since the previous call.
    fn poll_events(&mut self) -> Vec<EncoderEvent>;

    /// Flush and finish. Remaining data, then [`EncoderEvent::Stopped`],
    /// are delivered through [`MediaEncoder::poll_events`].
    fn stop(&mut self) -> VidfxResult<()>;
}

/// Creates encoders and reports which formats it can produce.
pub trait EncoderFactory: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Whether `format` can be encoded on this system.
    fn is_supported(&self, format: EncoderFormat) -> bool;

    /// Construct an encoder for `config`.
    fn create(&self, config: &EncoderConfig) -> VidfxResult<Box<dyn MediaEncoder>>;
}

/// Fail with an error naming the combination when `format` cannot be encoded.
pub fn ensure_supported(factory: &dyn EncoderFactory, format: EncoderFormat) -> VidfxResult<()> {
    if factory.is_supported(format) {
        return Ok(());
    }
    Err(VidfxError::unsupported_format(format!(
        "{} ({}) is not supported by the {} encoder",
        format.id(),
        format.mime_type(),
        factory.name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_and_mime() {
        assert_eq!(
            "webm-vp8-opus".parse::<EncoderFormat>().unwrap(),
            EncoderFormat::WebmVp8Opus
        );
        assert_eq!(
            "Video/WebM; codecs=vp9,opus".parse::<EncoderFormat>().unwrap(),
            EncoderFormat::WebmVp9Opus
        );
        let err = "avi".parse::<EncoderFormat>().unwrap_err();
        assert!(matches!(err, VidfxError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("webm-vp8-opus"));
    }

    #[test]
    fn test_default_format() {
        assert_eq!(EncoderFormat::default(), EncoderFormat::WebmVp8Opus);
        assert_eq!(EncoderFormat::default().extension(), "webm");
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(Path::new("/videos/holiday.mov"), EncoderFormat::WebmVp8Opus),
            "modified_holiday.webm"
        );
        assert_eq!(
            output_file_name(Path::new("clip"), EncoderFormat::Mp4H264Aac),
            "modified_clip.mp4"
        );
        assert_eq!(
            output_file_name(Path::new("/"), EncoderFormat::WebmVp9Opus),
            "modified_output.webm"
        );
    }

    struct NoFormats;

    impl EncoderFactory for NoFormats {
        fn name(&self) -> &str {
            "none"
        }

        fn is_supported(&self, _format: EncoderFormat) -> bool {
            false
        }

        fn create(&self, _config: &EncoderConfig) -> VidfxResult<Box<dyn MediaEncoder>> {
            Err(VidfxError::encoder_init("unreachable"))
        }
    }

    #[test]
    fn test_unsupported_format_names_combination() {
        let err = ensure_supported(&NoFormats, EncoderFormat::Mp4H264Aac).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("mp4-h264-aac"));
        assert!(message.contains("video/mp4;codecs=avc1,mp4a"));
    }
}
