//! GStreamer adapters for the source and encoder contracts.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use gst::prelude::*;
use gstreamer as gst;
use vidfx_common::error::{MediaFault, VidfxError, VidfxResult};

pub mod encoder;
pub mod source;

pub use encoder::{GstEncoder, GstEncoderFactory};
pub use source::GstMediaSource;

/// Elements every decode pipeline needs.
pub const DECODE_ELEMENTS: &[&str] = &[
    "filesrc",
    "decodebin",
    "videoconvert",
    "audioconvert",
    "audioresample",
    "appsink",
];

/// Elements every encode pipeline needs besides the format's own.
pub const ENCODE_ELEMENTS: &[&str] = &[
    "appsrc",
    "appsink",
    "videoconvert",
    "audioconvert",
    "audioresample",
    "queue",
];

/// Initialise GStreamer once per process.
pub fn init_gstreamer() -> VidfxResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(VidfxError::encoder_init(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Names from `elements` with no registered factory.
pub fn missing_elements(elements: &[&str]) -> Vec<String> {
    if init_gstreamer().is_err() {
        return elements.iter().map(|e| e.to_string()).collect();
    }
    elements
        .iter()
        .filter(|name| gst::ElementFactory::find(name).is_none())
        .map(|name| name.to_string())
        .collect()
}

/// Whether a time-stretching element is installed.
pub fn has_time_stretch() -> bool {
    missing_elements(&["scaletempo"]).is_empty()
}

fn fault_from_message(err: &gst::message::Error) -> MediaFault {
    let name = err
        .src()
        .map(|s| s.name().to_string())
        .unwrap_or_else(|| "gstreamer".to_string());
    MediaFault::new(name, err.error().to_string())
}

/// First error waiting on the bus, if any.
fn pop_error(pipeline: &gst::Pipeline) -> Option<MediaFault> {
    let bus = pipeline.bus()?;
    let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
    match msg.view() {
        gst::MessageView::Error(err) => Some(fault_from_message(err)),
        _ => None,
    }
}

/// Wait for `state`. The error describes why the change failed.
fn wait_for_state(pipeline: &gst::Pipeline, name: &str, state: gst::State) -> Result<(), String> {
    match pipeline.state(gst::ClockTime::from_seconds(10)) {
        (Ok(_), current, _) if current == state => Ok(()),
        (Ok(_), current, _) => {
            tracing::warn!(
                pipeline = name,
                ?current,
                wanted = ?state,
                "Pipeline did not reach target state within timeout"
            );
            Ok(())
        }
        (Err(e), _, _) => {
            let detail = pop_error(pipeline)
                .map(|f| vidfx_common::error::describe_fault(Some(&f), "state change failed"))
                .unwrap_or_else(|| format!("{e:?}"));
            Err(format!("{name} pipeline failed to reach {state:?}: {detail}"))
        }
    }
}

/// How long a stopping pipeline may take to drain EOS.
const EOS_DRAIN_DEADLINE: Duration = Duration::from_secs(10);

/// Fault reported when EOS does not drain in time; the output is truncated.
fn drain_timeout_fault(name: &str) -> MediaFault {
    tracing::warn!(pipeline = name, "EOS drain timed out after 10s");
    MediaFault::new(name, "EOS drain timed out after 10s")
}

/// Block until EOS has drained through the pipeline. Returns the fault that
/// ended the drain, if any, including a timeout after 10s.
fn drain_eos(pipeline: &gst::Pipeline, name: &str) -> Option<MediaFault> {
    let Some(bus) = pipeline.bus() else {
        return Some(MediaFault::new(name, "pipeline has no bus"));
    };
    let deadline = EOS_DRAIN_DEADLINE;
    let start = Instant::now();
    loop {
        let elapsed = start.elapsed();
        if elapsed >= deadline {
            return Some(drain_timeout_fault(name));
        }
        let remaining = gst::ClockTime::from_nseconds((deadline - elapsed).as_nanos() as u64);
        match bus.timed_pop(remaining) {
            Some(msg) => match msg.view() {
                gst::MessageView::Eos(_) => {
                    tracing::debug!(pipeline = name, "EOS received; pipeline drained");
                    return None;
                }
                gst::MessageView::Error(e) => {
                    tracing::warn!(
                        pipeline = name,
                        error = %e.error(),
                        "Pipeline error during EOS drain"
                    );
                    return Some(fault_from_message(e));
                }
                _ => {}
            },
            None => return Some(drain_timeout_fault(name)),
        }
    }
}

/// Pull one sample from an `appsink`, waiting at most `timeout`.
fn try_pull(appsink: &gst::Element, signal: &str, timeout: gst::ClockTime) -> Option<gst::Sample> {
    appsink.emit_by_name::<Option<gst::Sample>>(signal, &[&timeout.nseconds()])
}

/// Integer field of the first caps structure of a sample.
fn caps_int(sample: &gst::Sample, field: &str) -> Option<i32> {
    sample.caps()?.structure(0)?.get::<i32>(field).ok()
}

fn launch_pipeline(launch: &str) -> VidfxResult<gst::Pipeline> {
    let element = gst::parse::launch(launch)
        .map_err(|e| VidfxError::encoder_init(format!("Failed to build pipeline: {e}")))?;
    element
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| VidfxError::encoder_init("Launch string did not produce a pipeline"))
}

fn element_by_name(pipeline: &gst::Pipeline, name: &str) -> VidfxResult<gst::Element> {
    pipeline
        .by_name(name)
        .ok_or_else(|| VidfxError::encoder_init(format!("Pipeline has no element named '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_timeout_is_reported_as_fault() {
        let fault = drain_timeout_fault("encoder");
        assert_eq!(
            vidfx_common::error::describe_fault(Some(&fault), "unused"),
            "encoder: EOS drain timed out after 10s"
        );
    }

    #[test]
    fn test_missing_elements_reports_unknown_names() {
        let missing = missing_elements(&["vidfx-no-such-element"]);
        assert_eq!(missing, vec!["vidfx-no-such-element".to_string()]);
    }
}
