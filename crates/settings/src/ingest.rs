//! Per-field ingestion of untrusted settings JSON.
//!
//! Each field is judged on its own: a present value whose basic JSON type
//! (number vs boolean) matches the default's type is accepted, with numbers
//! clamped to their range. Anything else falls back to the default and is
//! recorded as rejected.

use serde_json::{Map, Value};
use vidfx_common::error::{VidfxError, VidfxResult};

use crate::settings::{
    NumericRange, Settings, BRIGHTNESS, CONTRAST, PLAYBACK_SPEED, SATURATION, VOLUME,
};

enum FieldKind {
    Number(NumericRange, fn(&mut Settings, f64)),
    Flag(fn(&mut Settings, bool)),
}

struct Field {
    key: &'static str,
    kind: FieldKind,
}

const FIELDS: &[Field] = &[
    Field {
        key: "brightness",
        kind: FieldKind::Number(BRIGHTNESS, |s, v| s.brightness = v),
    },
    Field {
        key: "contrast",
        kind: FieldKind::Number(CONTRAST, |s, v| s.contrast = v),
    },
    Field {
        key: "saturation",
        kind: FieldKind::Number(SATURATION, |s, v| s.saturation = v),
    },
    Field {
        key: "playbackSpeed",
        kind: FieldKind::Number(PLAYBACK_SPEED, |s, v| s.playback_speed = v),
    },
    Field {
        key: "volume",
        kind: FieldKind::Number(VOLUME, |s, v| s.volume = v),
    },
    Field {
        key: "flipHorizontal",
        kind: FieldKind::Flag(|s, v| s.flip_horizontal = v),
    },
    Field {
        key: "enableRotatingLines",
        kind: FieldKind::Flag(|s, v| s.enable_rotating_lines = v),
    },
    Field {
        key: "enablePixelNoise",
        kind: FieldKind::Flag(|s, v| s.enable_pixel_noise = v),
    },
    Field {
        key: "audioPreservesPitch",
        kind: FieldKind::Flag(|s, v| s.audio_preserves_pitch = v),
    },
];

/// Serialized keys of every settings field, in declaration order.
pub fn field_keys() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|f| f.key)
}

/// Outcome of ingesting an untrusted settings object.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    /// Validated settings; every numeric field is within range.
    pub settings: Settings,

    /// Keys that were missing or had the wrong type and fell back to defaults.
    pub rejected: Vec<&'static str>,

    /// Keys whose numeric value was accepted but clamped into range.
    pub clamped: Vec<&'static str>,
}

impl Ingested {
    /// Whether any field fell back to its default.
    pub fn is_partial(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// Ingest a JSON object field by field.
pub fn ingest_object(object: &Map<String, Value>) -> Ingested {
    let mut settings = Settings::default();
    let mut rejected = Vec::new();
    let mut clamped = Vec::new();

    for field in FIELDS {
        let value = object.get(field.key);
        match (&field.kind, value) {
            (FieldKind::Number(range, set), Some(Value::Number(n))) => match n.as_f64() {
                Some(raw) => {
                    let v = range.clamp(raw);
                    if v != raw {
                        clamped.push(field.key);
                    }
                    set(&mut settings, v);
                }
                None => rejected.push(field.key),
            },
            (FieldKind::Flag(set), Some(Value::Bool(b))) => set(&mut settings, *b),
            _ => rejected.push(field.key),
        }
    }

    Ingested {
        settings,
        rejected,
        clamped,
    }
}

/// Ingest a JSON value that must be an object.
pub fn ingest_value(value: &Value) -> VidfxResult<Ingested> {
    match value {
        Value::Object(object) => Ok(ingest_object(object)),
        other => Err(VidfxError::suggestion(format!(
            "Expected a JSON object with settings fields, got {}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_valid_object_is_accepted() {
        let value = json!({
            "brightness": 120,
            "contrast": 80.5,
            "saturation": 0,
            "playbackSpeed": 1.5,
            "volume": 30,
            "flipHorizontal": true,
            "enableRotatingLines": true,
            "enablePixelNoise": false,
            "audioPreservesPitch": false
        });
        let ingested = ingest_value(&value).unwrap();
        assert!(!ingested.is_partial());
        assert!(ingested.clamped.is_empty());
        assert_eq!(ingested.settings.brightness, 120.0);
        assert_eq!(ingested.settings.contrast, 80.5);
        assert_eq!(ingested.settings.playback_speed, 1.5);
        assert!(ingested.settings.flip_horizontal);
        assert!(!ingested.settings.audio_preserves_pitch);
    }

    #[test]
    fn test_out_of_range_clamped_and_type_mismatch_defaulted() {
        let value = json!({
            "brightness": 500,
            "contrast": "high",
            "saturation": 100,
            "playbackSpeed": 1.0,
            "volume": 100,
            "flipHorizontal": false,
            "enableRotatingLines": false,
            "enablePixelNoise": false,
            "audioPreservesPitch": true
        });
        let ingested = ingest_value(&value).unwrap();
        assert_eq!(ingested.settings.brightness, 200.0);
        assert_eq!(ingested.settings.contrast, 100.0);
        assert_eq!(ingested.rejected, vec!["contrast"]);
        assert_eq!(ingested.clamped, vec!["brightness"]);
        assert!(ingested.is_partial());
    }

    #[test]
    fn test_boolean_given_as_number_is_rejected() {
        let value = json!({ "flipHorizontal": 1, "volume": true });
        let ingested = ingest_value(&value).unwrap();
        assert!(!ingested.settings.flip_horizontal);
        assert_eq!(ingested.settings.volume, 100.0);
        assert!(ingested.rejected.contains(&"flipHorizontal"));
        assert!(ingested.rejected.contains(&"volume"));
    }

    #[test]
    fn test_missing_fields_are_rejected_with_defaults() {
        let ingested = ingest_value(&json!({})).unwrap();
        assert_eq!(ingested.settings, Settings::default());
        assert_eq!(ingested.rejected.len(), field_keys().count());
    }

    #[test]
    fn test_non_object_is_an_error() {
        let err = ingest_value(&json!([1, 2, 3])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }
}
