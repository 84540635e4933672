//! Parsing model output into settings.

use vidfx_common::error::{VidfxError, VidfxResult};
use vidfx_settings::{ingest_value, Settings};

/// User-visible notice for a suggestion with fields reset to defaults.
pub const PARTIAL_WARNING: &str = "Suggestion partially applied; invalid fields were reset to defaults";

/// A validated suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// Settings to apply; every numeric field is within range.
    pub settings: Settings,

    /// Present when any field was missing or had the wrong type.
    pub warning: Option<String>,

    /// Keys that fell back to their defaults.
    pub rejected: Vec<&'static str>,

    /// Keys whose values were clamped into range.
    pub clamped: Vec<&'static str>,
}

/// Remove one surrounding Markdown code fence (```` ``` ```` or
/// ```` ```json ````), if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    let body = match rest.split_once('\n') {
        Some((tag, body)) if !tag.contains('{') && !tag.contains('[') => body,
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim()
}

/// Parse model output into a suggestion.
///
/// Text that is not a JSON object (after fence stripping) is an error.
/// Individual bad fields only produce a warning.
pub fn parse_suggestion(text: &str) -> VidfxResult<Suggestion> {
    let body = strip_code_fence(text);
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        VidfxError::suggestion(format!("Response is not valid JSON: {e}"))
    })?;
    let ingested = ingest_value(&value)?;

    let warning = ingested
        .is_partial()
        .then(|| format!("{PARTIAL_WARNING} ({})", ingested.rejected.join(", ")));
    if let Some(warning) = &warning {
        tracing::warn!(%warning, "Suggestion partially applied");
    }
    if !ingested.clamped.is_empty() {
        tracing::debug!(clamped = ?ingested.clamped, "Suggested values clamped into range");
    }

    Ok(Suggestion {
        settings: ingested.settings,
        warning,
        rejected: ingested.rejected,
        clamped: ingested.clamped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FULL: &str = r#"{
        "brightness": 120,
        "contrast": 90,
        "saturation": 150,
        "playbackSpeed": 1.5,
        "volume": 80,
        "flipHorizontal": true,
        "enableRotatingLines": false,
        "enablePixelNoise": true,
        "audioPreservesPitch": false
    }"#;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json {\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_full_response_applies_cleanly() {
        let suggestion = parse_suggestion(FULL).unwrap();
        assert!(suggestion.warning.is_none());
        assert_eq!(suggestion.settings.brightness, 120.0);
        assert_eq!(suggestion.settings.playback_speed, 1.5);
        assert!(suggestion.settings.flip_horizontal);
        assert!(!suggestion.settings.audio_preserves_pitch);
    }

    #[test]
    fn test_out_of_range_and_mistyped_fields() {
        let text = FULL
            .replace("\"brightness\": 120", "\"brightness\": 500")
            .replace("\"contrast\": 90", "\"contrast\": \"high\"");
        let suggestion = parse_suggestion(&format!("```json\n{text}\n```")).unwrap();

        assert_eq!(suggestion.settings.brightness, 200.0);
        assert_eq!(suggestion.settings.contrast, 100.0);
        assert_eq!(suggestion.settings.saturation, 150.0);
        assert_eq!(suggestion.rejected, vec!["contrast"]);
        assert_eq!(suggestion.clamped, vec!["brightness"]);
        let warning = suggestion.warning.unwrap();
        assert!(warning.starts_with(PARTIAL_WARNING));
        assert!(warning.contains("contrast"));
    }

    #[test]
    fn test_invalid_json_is_a_hard_failure() {
        let err = parse_suggestion("Sure! Here are your settings.").unwrap_err();
        assert!(matches!(err, VidfxError::Suggestion { .. }));

        let err = parse_suggestion("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, VidfxError::Suggestion { .. }));
    }

    proptest! {
        #[test]
        fn prop_numeric_fields_always_in_range(
            brightness in -1.0e6f64..1.0e6,
            speed in -100.0f64..100.0,
            volume in -1.0e4f64..1.0e4,
            flip in any::<bool>(),
        ) {
            let text = format!(
                r#"{{"brightness": {brightness}, "playbackSpeed": {speed}, "volume": {volume}, "flipHorizontal": {flip}}}"#
            );
            let suggestion = parse_suggestion(&text).unwrap();
            prop_assert!(suggestion.settings.is_within_ranges());
            prop_assert_eq!(suggestion.settings.flip_horizontal, flip);
            prop_assert!(suggestion.warning.is_some());
        }
    }
}
