use proptest::prelude::*;
use serde_json::{json, Map, Value};
use vidfx_settings::{field_keys, ingest_object, Settings};

fn arb_json_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1.0e9f64..1.0e9f64).prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(Value::String),
        Just(json!([1, 2])),
    ]
}

fn arb_object() -> impl Strategy<Value = Map<String, Value>> {
    let keys: Vec<&'static str> = field_keys().collect();
    proptest::collection::vec(proptest::option::of(arb_json_value()), keys.len()).prop_map(
        move |values| {
            keys.iter()
                .zip(values)
                .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn ingested_settings_are_always_within_ranges(object in arb_object()) {
        let ingested = ingest_object(&object);
        prop_assert!(ingested.settings.is_within_ranges());
    }

    #[test]
    fn rejected_fields_hold_their_defaults(object in arb_object()) {
        let ingested = ingest_object(&object);
        let defaults = serde_json::to_value(Settings::default()).unwrap();
        let actual = serde_json::to_value(ingested.settings).unwrap();
        for key in &ingested.rejected {
            prop_assert_eq!(&actual[*key], &defaults[*key]);
        }
    }

    #[test]
    fn reset_always_yields_defaults(brightness in -1000.0f64..1000.0, speed in -5.0f64..5.0, flip in any::<bool>()) {
        let mut settings = Settings {
            brightness,
            playback_speed: speed,
            flip_horizontal: flip,
            ..Settings::default()
        };
        settings.reset();
        prop_assert_eq!(settings, Settings::default());
    }
}
