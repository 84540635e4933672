//! Decoding source: `filesrc ! decodebin` feeding RGBA and F32 app sinks.

use std::path::{Path, PathBuf};

use gst::prelude::*;
use gstreamer as gst;
use vidfx_common::clock::SessionClock;
use vidfx_common::error::{describe_fault, VidfxError, VidfxResult};
use vidfx_media_core::{
    AudioChunk, AudioPresence, MediaSource, PlaybackState, RateResampler, SourceInfo, VideoFrame,
};

use super::{caps_int, has_time_stretch, init_gstreamer, pop_error, try_pull, wait_for_state};

/// How long a pull may block waiting for decoded data.
const PULL_TIMEOUT_MS: u64 = 500;

/// A local video file decoded through GStreamer.
///
/// Decoding is pull-driven: both sinks run with `sync=false` and
/// [`MediaSource::advance`] pulls as many samples as the new position
/// needs. With `scaletempo` installed, pitch-preserving rate changes are
/// applied with a rate seek; otherwise audio is resampled.
pub struct GstMediaSource {
    path: PathBuf,
    pipeline: Option<gst::Pipeline>,
    video_sink: gst::Element,
    audio_sink: Option<gst::Element>,
    info: SourceInfo,
    audio_format: Option<(u32, u16)>,
    state: PlaybackState,
    position: f64,
    wall_elapsed: f64,
    rate: f64,
    preserves_pitch: bool,
    time_stretch: bool,
    rate_applied: bool,
    frame: Option<VideoFrame>,
    lookahead: Option<VideoFrame>,
    output_frames: u64,
    media_frames: u64,
    resampler: Option<RateResampler>,
    pending_audio: Vec<f32>,
}

impl GstMediaSource {
    /// Open and preroll `path`.
    pub fn open(path: &Path) -> VidfxResult<Self> {
        if !path.exists() {
            return Err(VidfxError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        init_gstreamer()?;
        let time_stretch = has_time_stretch();

        let pipeline = gst::Pipeline::new();
        let filesrc = gst::ElementFactory::make("filesrc")
            .property("location", path.to_string_lossy().to_string())
            .build()
            .map_err(|e| VidfxError::playback(format!("Failed to create filesrc: {e}")))?;
        let decode = gst::ElementFactory::make("decodebin")
            .build()
            .map_err(|e| VidfxError::playback(format!("Failed to create decodebin: {e}")))?;

        let video_branch = gst::parse::bin_from_description(
            "queue ! videoconvert ! video/x-raw,format=RGBA ! appsink name=video sync=false max-buffers=8",
            true,
        )
        .map_err(|e| VidfxError::playback(format!("Failed to build video branch: {e}")))?;
        let stretch = if time_stretch { "scaletempo ! audioconvert ! " } else { "" };
        let audio_branch = gst::parse::bin_from_description(
            &format!(
                "queue ! audioconvert ! audioresample ! {stretch}audio/x-raw,format=F32LE,layout=interleaved ! appsink name=audio sync=false"
            ),
            true,
        )
        .map_err(|e| VidfxError::playback(format!("Failed to build audio branch: {e}")))?;

        pipeline
            .add_many([&filesrc, &decode])
            .and_then(|_| filesrc.link(&decode))
            .map_err(|e| VidfxError::playback(format!("Failed to link decoder: {e}")))?;

        let weak = pipeline.downgrade();
        let (video, audio) = (video_branch.clone(), audio_branch.clone());
        decode.connect_pad_added(move |_, pad| {
            let Some(pipeline) = weak.upgrade() else {
                return;
            };
            let media = pad
                .current_caps()
                .and_then(|caps| caps.structure(0).map(|s| s.name().to_string()))
                .unwrap_or_default();
            let branch = if media.starts_with("video/") {
                &video
            } else if media.starts_with("audio/") {
                &audio
            } else {
                return;
            };
            if branch.parent().is_some() {
                return;
            }
            let linked = pipeline
                .add(branch)
                .map_err(|e| e.to_string())
                .and_then(|_| branch.sync_state_with_parent().map_err(|e| e.to_string()))
                .and_then(|_| {
                    let sink = branch
                        .static_pad("sink")
                        .ok_or_else(|| "branch has no sink pad".to_string())?;
                    pad.link(&sink).map(|_| ()).map_err(|e| format!("{e:?}"))
                });
            match linked {
                Ok(()) => tracing::debug!(media = %media, "Decoder stream linked"),
                Err(e) => tracing::warn!(media = %media, error = %e, "Failed to link decoder stream"),
            }
        });

        pipeline
            .set_state(gst::State::Paused)
            .map_err(|e| VidfxError::playback(format!("Failed to preroll {}: {e:?}", path.display())))?;
        wait_for_state(&pipeline, "source", gst::State::Paused).map_err(VidfxError::playback)?;

        if video_branch.parent().is_none() {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(VidfxError::playback(format!(
                "{} has no decodable video stream",
                path.display()
            )));
        }
        let video_sink = video_branch
            .by_name("video")
            .ok_or_else(|| VidfxError::playback("Video branch has no sink"))?;
        let audio_sink = audio_branch
            .parent()
            .and_then(|_| audio_branch.by_name("audio"));

        let preroll = try_pull(&video_sink, "try-pull-preroll", pull_timeout())
            .ok_or_else(|| VidfxError::playback("No video frame could be decoded"))?;
        let width = caps_int(&preroll, "width").unwrap_or(0).max(0) as u32;
        let height = caps_int(&preroll, "height").unwrap_or(0).max(0) as u32;
        let frame_rate = preroll
            .caps()
            .and_then(|c| c.structure(0))
            .and_then(|s| s.get::<gst::Fraction>("framerate").ok())
            .filter(|f| f.numer() > 0 && f.denom() > 0)
            .map(|f| f64::from(f.numer()) / f64::from(f.denom()));
        let duration_secs = pipeline
            .query_duration::<gst::ClockTime>()
            .map(|d| SessionClock::ns_to_secs(d.nseconds()))
            .unwrap_or(0.0);

        let audio_format = audio_sink
            .as_ref()
            .and_then(|sink| try_pull(sink, "try-pull-preroll", pull_timeout()))
            .and_then(|sample| {
                let rate = caps_int(&sample, "rate")?;
                let channels = caps_int(&sample, "channels")?;
                Some((u32::try_from(rate).ok()?, u16::try_from(channels).ok()?))
            });

        let frame = frame_from_sample(&preroll, width, height);
        tracing::info!(
            path = %path.display(),
            width,
            height,
            duration_secs,
            ?frame_rate,
            audio = ?audio_format,
            time_stretch,
            "Source prerolled"
        );

        Ok(Self {
            path: path.to_path_buf(),
            pipeline: Some(pipeline),
            video_sink,
            audio_sink,
            info: SourceInfo {
                width,
                height,
                duration_secs,
                frame_rate,
            },
            audio_format,
            state: PlaybackState::Idle,
            position: 0.0,
            wall_elapsed: 0.0,
            rate: 1.0,
            preserves_pitch: true,
            time_stretch,
            rate_applied: false,
            frame,
            lookahead: None,
            output_frames: 0,
            media_frames: 0,
            resampler: None,
            pending_audio: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stretching(&self) -> bool {
        self.preserves_pitch && self.time_stretch
    }

    fn fail(&mut self, message: String) -> VidfxError {
        self.state = PlaybackState::Errored(message.clone());
        VidfxError::playback(message)
    }

    /// Seek with the playback rate so `scaletempo` stretches audio.
    fn apply_rate_seek(&mut self) -> VidfxResult<()> {
        if self.rate_applied || !self.stretching() || (self.rate - 1.0).abs() < f64::EPSILON {
            return Ok(());
        }
        let Some(pipeline) = self.pipeline.as_ref() else {
            return Ok(());
        };
        pipeline
            .seek(
                self.rate,
                gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
                gst::SeekType::Set,
                gst::ClockTime::ZERO,
                gst::SeekType::None,
                gst::ClockTime::NONE,
            )
            .map_err(|e| VidfxError::playback(format!("Rate seek failed: {e}")))?;
        self.rate_applied = true;
        tracing::debug!(rate = self.rate, "Applied time-stretched playback rate");
        Ok(())
    }

    fn pull_video(&mut self) -> bool {
        let target_ns = SessionClock::secs_to_ns(self.position);
        loop {
            let next = match self.lookahead.take() {
                Some(frame) => frame,
                None => match try_pull(&self.video_sink, "try-pull-sample", pull_timeout()) {
                    Some(sample) => {
                        match frame_from_sample(&sample, self.info.width, self.info.height) {
                            Some(frame) => frame,
                            None => continue,
                        }
                    }
                    None => return self.video_sink.property::<bool>("eos"),
                },
            };
            if next.pts_ns > target_ns {
                self.lookahead = Some(next);
                return false;
            }
            self.frame = Some(next);
        }
    }

    fn pull_audio(&mut self) {
        let Some(sink) = self.audio_sink.clone() else {
            return;
        };
        let Some((sample_rate, channels)) = self.audio_format else {
            return;
        };
        let rate = f64::from(sample_rate);
        let stretching = self.stretching();
        let (target, produced) = if stretching {
            ((self.wall_elapsed * rate).floor() as u64, self.output_frames)
        } else {
            ((self.position * rate).floor() as u64, self.media_frames)
        };

        let mut samples = Vec::new();
        let mut frames = produced;
        while frames < target {
            let Some(sample) = try_pull(&sink, "try-pull-sample", pull_timeout()) else {
                break;
            };
            let Some(chunk) = samples_from_sample(&sample) else {
                continue;
            };
            frames += (chunk.len() / usize::from(channels)) as u64;
            samples.extend(chunk);
        }

        if stretching {
            self.output_frames = frames;
            self.pending_audio.extend(samples);
        } else {
            self.media_frames = frames;
            let ratio = self.rate;
            let resampler = self
                .resampler
                .get_or_insert_with(|| RateResampler::new(channels, ratio));
            if (resampler.ratio() - ratio).abs() > f64::EPSILON {
                *resampler = RateResampler::new(channels, ratio);
            }
            let out = resampler.process(&samples);
            self.pending_audio.extend(out);
        }
    }
}

impl MediaSource for GstMediaSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn state(&self) -> PlaybackState {
        self.state.clone()
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn current_frame(&self) -> Option<&VideoFrame> {
        self.frame.as_ref()
    }

    fn inspect_audio(&self) -> VidfxResult<AudioPresence> {
        if self.pipeline.is_none() {
            return Err(VidfxError::audio_route("Source has been detached"));
        }
        Ok(match self.audio_format {
            Some((sample_rate, channels)) => AudioPresence::Present {
                sample_rate,
                channels,
            },
            None => AudioPresence::Absent,
        })
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 && (rate - self.rate).abs() > f64::EPSILON {
            self.rate = rate;
            self.rate_applied = false;
        }
    }

    fn set_preserves_pitch(&mut self, preserve: bool) -> bool {
        self.preserves_pitch = preserve;
        self.rate_applied = false;
        self.time_stretch
    }

    fn play(&mut self) -> VidfxResult<()> {
        match &self.state {
            PlaybackState::Detached => return Err(VidfxError::playback("Source has been detached")),
            PlaybackState::Errored(message) => return Err(VidfxError::playback(message.clone())),
            PlaybackState::Ended | PlaybackState::Playing => return Ok(()),
            PlaybackState::Idle | PlaybackState::Paused => {}
        }
        let Some(pipeline) = self.pipeline.clone() else {
            return Err(VidfxError::playback("Source has been detached"));
        };
        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let detail = describe_fault(pop_error(&pipeline).as_ref(), &format!("{e:?}"));
            return Err(self.fail(format!("Failed to start playback: {detail}")));
        }
        if let Err(e) = wait_for_state(&pipeline, "source", gst::State::Playing) {
            return Err(self.fail(e));
        }
        self.apply_rate_seek()?;
        self.state = PlaybackState::Playing;
        Ok(())
    }

    fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Some(pipeline) = self.pipeline.as_ref() {
            if let Err(e) = pipeline.set_state(gst::State::Paused) {
                tracing::warn!(error = ?e, "Failed to pause source");
            }
        }
        self.state = PlaybackState::Paused;
    }

    fn advance(&mut self, wall_secs: f64) -> VidfxResult<()> {
        if self.state != PlaybackState::Playing || wall_secs <= 0.0 {
            return Ok(());
        }
        if let Some(fault) = self.pipeline.as_ref().and_then(pop_error) {
            let message = describe_fault(Some(&fault), "Decoding failed");
            return Err(self.fail(message));
        }

        let duration = self.info.duration_secs;
        let mut next = self.position + wall_secs * self.rate;
        let mut ended = duration > 0.0 && next >= duration;
        if ended {
            next = duration;
            self.wall_elapsed += (next - self.position) / self.rate;
        } else {
            self.wall_elapsed += wall_secs;
        }
        self.position = next;

        let video_eos = self.pull_video();
        self.pull_audio();
        ended |= video_eos && self.lookahead.is_none();

        if ended {
            self.state = PlaybackState::Ended;
            tracing::debug!(position = self.position, "Source reached end of media");
        }
        Ok(())
    }

    fn take_audio(&mut self) -> Option<AudioChunk> {
        let (sample_rate, channels) = self.audio_format?;
        if self.pending_audio.is_empty() {
            return None;
        }
        Some(AudioChunk::new(
            sample_rate,
            channels,
            std::mem::take(&mut self.pending_audio),
        ))
    }

    fn detach(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.set_state(gst::State::Null) {
                tracing::warn!(error = ?e, "Failed to release source pipeline");
            }
        }
        self.state = PlaybackState::Detached;
        self.frame = None;
        self.lookahead = None;
        self.pending_audio.clear();
        self.resampler = None;
    }
}

impl Drop for GstMediaSource {
    fn drop(&mut self) {
        self.detach();
    }
}

fn pull_timeout() -> gst::ClockTime {
    gst::ClockTime::from_mseconds(PULL_TIMEOUT_MS)
}

fn frame_from_sample(sample: &gst::Sample, width: u32, height: u32) -> Option<VideoFrame> {
    let buffer = sample.buffer()?;
    let pts_ns = buffer.pts().map(|p| p.nseconds()).unwrap_or(0);
    let map = buffer.map_readable().ok()?;
    let data = map.as_slice();
    let row = width as usize * 4;
    if data.len() < row * height as usize {
        return None;
    }
    VideoFrame::from_raw(width, height, data[..row * height as usize].to_vec(), pts_ns)
}

fn samples_from_sample(sample: &gst::Sample) -> Option<Vec<f32>> {
    let buffer = sample.buffer()?;
    let map = buffer.map_readable().ok()?;
    Some(
        map.as_slice()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}
