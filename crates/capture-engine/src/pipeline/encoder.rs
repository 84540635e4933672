//! Encoding pipeline: `appsrc` video and audio into a muxer drained by an `appsink`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use gst::prelude::*;
use gstreamer as gst;
use vidfx_common::error::{describe_fault, MediaFault, VidfxError, VidfxResult};
use vidfx_media_core::{AudioChunk, VideoFrame};

use super::{
    drain_eos, element_by_name, init_gstreamer, launch_pipeline, missing_elements, pop_error,
    try_pull, wait_for_state, ENCODE_ELEMENTS,
};
use crate::encoder::{
    AudioFormat, EncoderConfig, EncoderEvent, EncoderFactory, EncoderFormat, MediaEncoder,
    RecorderState,
};

/// Encoder branch of the launch line for `format`.
fn video_encoder(format: EncoderFormat, fps: u32) -> String {
    // One keyframe every 2 seconds.
    let keyint = fps.saturating_mul(2).max(2);
    match format {
        EncoderFormat::WebmVp8Opus => {
            format!("vp8enc deadline=1 cpu-used=4 keyframe-max-dist={keyint}")
        }
        EncoderFormat::WebmVp9Opus => {
            format!("vp9enc deadline=1 cpu-used=4 keyframe-max-dist={keyint}")
        }
        EncoderFormat::Mp4H264Aac => format!(
            "x264enc tune=zerolatency speed-preset=veryfast key-int-max={keyint} ! h264parse"
        ),
    }
}

fn audio_encoder(format: EncoderFormat) -> &'static str {
    match format {
        EncoderFormat::WebmVp8Opus | EncoderFormat::WebmVp9Opus => "opusenc",
        EncoderFormat::Mp4H264Aac => "avenc_aac",
    }
}

fn muxer(format: EncoderFormat) -> &'static str {
    match format {
        EncoderFormat::WebmVp8Opus | EncoderFormat::WebmVp9Opus => "webmmux streamable=true",
        EncoderFormat::Mp4H264Aac => "mp4mux fragment-duration=1000 streamable=true",
    }
}

/// Raw video frames an `appsrc` may hold before writes wait.
const QUEUED_FRAMES: u64 = 8;

/// Seconds of raw audio an `appsrc` may hold before writes wait.
const QUEUED_AUDIO_SECS: u64 = 2;

/// Longest a write may wait for room in a full input queue.
const QUEUE_STALL_DEADLINE: Duration = Duration::from_secs(10);
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(5);

fn video_queue_bytes(config: &EncoderConfig) -> u64 {
    u64::from(config.width) * u64::from(config.height) * 4 * QUEUED_FRAMES
}

fn audio_queue_bytes(audio: &AudioFormat) -> u64 {
    u64::from(audio.sample_rate) * u64::from(audio.channels) * 4 * QUEUED_AUDIO_SECS
}

/// gst-launch description of the encode pipeline for `config`.
///
/// Each `appsrc` queue is capped with `max-bytes`; writers wait for room
/// before pushing.
pub fn launch_line(config: &EncoderConfig) -> String {
    let EncoderConfig {
        format,
        width,
        height,
        fps,
        audio,
    } = *config;
    let video_bytes = video_queue_bytes(config);
    let mut launch = format!(
        "appsrc name=vsrc format=time max-bytes={video_bytes} caps=video/x-raw,format=RGBA,width={width},height={height},framerate={fps}/1 \
         ! videoconvert ! queue ! {venc} ! {mux} name=mux ! appsink name=out sync=false",
        venc = video_encoder(format, fps),
        mux = muxer(format),
    );
    if let Some(audio) = audio {
        let audio_bytes = audio_queue_bytes(&audio);
        launch.push_str(&format!(
            " appsrc name=asrc format=time max-bytes={audio_bytes} caps=audio/x-raw,format=F32LE,layout=interleaved,rate={rate},channels={channels} \
             ! audioconvert ! audioresample ! queue ! {aenc} ! mux.",
            rate = audio.sample_rate,
            channels = audio.channels,
            aenc = audio_encoder(format),
        ));
    }
    launch
}

/// Final state and event once the EOS drain ended with `fault`.
fn settle(fault: Option<MediaFault>) -> (RecorderState, EncoderEvent) {
    match fault {
        Some(fault) => (RecorderState::Errored, EncoderEvent::Error(Some(fault))),
        None => (RecorderState::Stopped, EncoderEvent::Stopped),
    }
}

/// A running GStreamer recorder.
pub struct GstEncoder {
    config: EncoderConfig,
    pipeline: gst::Pipeline,
    video_src: gst::Element,
    audio_src: Option<gst::Element>,
    sink: gst::Element,
    state: RecorderState,
    events: VecDeque<EncoderEvent>,
    audio_frames: u64,
}

impl GstEncoder {
    pub fn new(config: &EncoderConfig) -> VidfxResult<Self> {
        init_gstreamer()?;
        let launch = launch_line(config);
        tracing::debug!(%launch, "Building encode pipeline");
        let pipeline = launch_pipeline(&launch)?;
        let video_src = element_by_name(&pipeline, "vsrc")?;
        let audio_src = match config.audio {
            Some(_) => Some(element_by_name(&pipeline, "asrc")?),
            None => None,
        };
        let sink = element_by_name(&pipeline, "out")?;
        Ok(Self {
            config: config.clone(),
            pipeline,
            video_src,
            audio_src,
            sink,
            state: RecorderState::Inactive,
            events: VecDeque::new(),
            audio_frames: 0,
        })
    }

    fn ensure_recording(&self) -> VidfxResult<()> {
        match self.state {
            RecorderState::Recording => Ok(()),
            state => Err(VidfxError::encoder(format!(
                "Encoder is not recording (state {state:?})"
            ))),
        }
    }

    /// Wait until `src` holds less than `limit` bytes. A queue that stays
    /// full past the deadline, or a bus error while waiting, fails the
    /// encoder.
    fn wait_for_room(&mut self, src: &gst::Element, limit: u64) -> VidfxResult<()> {
        let start = Instant::now();
        while src.property::<u64>("current-level-bytes") >= limit {
            if let Some(fault) = pop_error(&self.pipeline) {
                self.state = RecorderState::Errored;
                return Err(VidfxError::encoder(describe_fault(Some(&fault), "encoder error")));
            }
            if start.elapsed() >= QUEUE_STALL_DEADLINE {
                self.state = RecorderState::Errored;
                return Err(VidfxError::encoder(format!(
                    "Encoder stalled: input queue stayed full for {}s",
                    QUEUE_STALL_DEADLINE.as_secs()
                )));
            }
            self.collect_output();
            std::thread::sleep(QUEUE_POLL_INTERVAL);
        }
        Ok(())
    }

    fn push(&mut self, src: &gst::Element, buffer: gst::Buffer) -> VidfxResult<()> {
        let flow = src.emit_by_name::<gst::FlowReturn>("push-buffer", &[&buffer]);
        flow.into_result().map(|_| ()).map_err(|e| {
            let fault = pop_error(&self.pipeline);
            self.state = RecorderState::Errored;
            VidfxError::encoder(describe_fault(fault.as_ref(), &format!("push failed: {e:?}")))
        })
    }

    /// Move finished container bytes into the event queue.
    fn collect_output(&mut self) {
        while let Some(sample) = try_pull(&self.sink, "try-pull-sample", gst::ClockTime::ZERO) {
            let Some(buffer) = sample.buffer() else {
                continue;
            };
            if let Ok(map) = buffer.map_readable() {
                self.events.push_back(EncoderEvent::Data(map.as_slice().to_vec()));
            }
        }
    }

    fn raise(&mut self, fault: Option<MediaFault>) {
        tracing::warn!(
            error = %describe_fault(fault.as_ref(), "unknown encoder error"),
            "Encoder reported an error"
        );
        self.state = RecorderState::Errored;
        self.events.push_back(EncoderEvent::Error(fault));
    }
}

impl MediaEncoder for GstEncoder {
    fn mime_type(&self) -> &str {
        self.config.format.mime_type()
    }

    fn state(&self) -> RecorderState {
        self.state
    }

    fn start(&mut self) -> VidfxResult<()> {
        if self.state != RecorderState::Inactive {
            return Err(VidfxError::encoder(format!(
                "Encoder cannot start from {:?}",
                self.state
            )));
        }
        self.pipeline.set_state(gst::State::Playing).map_err(|e| {
            VidfxError::encoder_init(format!("Failed to start encode pipeline: {e:?}"))
        })?;
        wait_for_state(&self.pipeline, "encoder", gst::State::Playing)
            .map_err(VidfxError::encoder_init)?;
        self.state = RecorderState::Recording;
        tracing::info!(
            format = %self.config.format,
            width = self.config.width,
            height = self.config.height,
            audio = self.audio_src.is_some(),
            "Encoder recording"
        );
        Ok(())
    }

    fn write_video(&mut self, frame: &VideoFrame) -> VidfxResult<()> {
        self.ensure_recording()?;
        let duration = gst::ClockTime::from_nseconds(1_000_000_000 / u64::from(self.config.fps.max(1)));
        let mut buffer = gst::Buffer::from_mut_slice(frame.as_bytes().to_vec());
        if let Some(b) = buffer.get_mut() {
            b.set_pts(gst::ClockTime::from_nseconds(frame.pts_ns));
            b.set_duration(duration);
        }
        let src = self.video_src.clone();
        self.wait_for_room(&src, video_queue_bytes(&self.config))?;
        self.push(&src, buffer)
    }

    fn write_audio(&mut self, chunk: &AudioChunk) -> VidfxResult<()> {
        self.ensure_recording()?;
        let Some(src) = self.audio_src.clone() else {
            return Ok(());
        };
        if chunk.is_empty() || chunk.sample_rate == 0 {
            return Ok(());
        }
        let rate = u64::from(chunk.sample_rate);
        let frames = chunk.frames() as u64;
        let pts = self.audio_frames * 1_000_000_000 / rate;
        let duration = frames * 1_000_000_000 / rate;
        self.audio_frames += frames;

        if let Some(audio) = self.config.audio {
            self.wait_for_room(&src, audio_queue_bytes(&audio))?;
        }
        let bytes: Vec<u8> = chunk.samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut buffer = gst::Buffer::from_mut_slice(bytes);
        if let Some(b) = buffer.get_mut() {
            b.set_pts(gst::ClockTime::from_nseconds(pts));
            b.set_duration(gst::ClockTime::from_nseconds(duration));
        }
        self.push(&src, buffer)
    }

    fn poll_events(&mut self) -> Vec<EncoderEvent> {
        if self.state == RecorderState::Recording {
            if let Some(fault) = pop_error(&self.pipeline) {
                self.raise(Some(fault));
            }
            self.collect_output();
        }
        self.events.drain(..).collect()
    }

    fn stop(&mut self) -> VidfxResult<()> {
        if self.state != RecorderState::Recording {
            return Ok(());
        }
        for src in std::iter::once(&self.video_src).chain(self.audio_src.as_ref()) {
            let flow = src.emit_by_name::<gst::FlowReturn>("end-of-stream", &[]);
            if flow != gst::FlowReturn::Ok {
                tracing::warn!(?flow, "Failed to signal end of stream; output may be truncated");
            }
        }

        let fault = drain_eos(&self.pipeline, "encoder");
        self.collect_output();
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to release encode pipeline");
        }
        let (state, event) = settle(fault);
        match &event {
            EncoderEvent::Error(fault) => tracing::warn!(
                error = %describe_fault(fault.as_ref(), "unknown encoder error"),
                "Encoder failed to finalize"
            ),
            _ => tracing::debug!(format = %self.config.format, "Encoder stopped"),
        }
        self.state = state;
        self.events.push_back(event);
        Ok(())
    }
}

impl Drop for GstEncoder {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

/// Creates [`GstEncoder`]s for formats whose elements are installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct GstEncoderFactory;

impl GstEncoderFactory {
    pub fn new() -> Self {
        Self
    }
}

impl EncoderFactory for GstEncoderFactory {
    fn name(&self) -> &str {
        "gstreamer"
    }

    fn is_supported(&self, format: EncoderFormat) -> bool {
        let mut needed: Vec<&str> = ENCODE_ELEMENTS.to_vec();
        needed.extend_from_slice(format.required_elements());
        let missing = missing_elements(&needed);
        if !missing.is_empty() {
            tracing::debug!(format = %format, ?missing, "Format unavailable");
        }
        missing.is_empty()
    }

    fn create(&self, config: &EncoderConfig) -> VidfxResult<Box<dyn MediaEncoder>> {
        Ok(Box::new(GstEncoder::new(config)?))
    }
}
