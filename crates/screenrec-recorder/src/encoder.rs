//! Encoder fallback chain and the GStreamer Matroska writer behind it.
//!
//! # Encoder priority (highest to lowest)
//!
//! | FourCC | GStreamer branch                  | Notes |
//! |--------|-----------------------------------|-------|
//! | `XVID` | `avenc_mpeg4 ! mpeg4videoparse`   | gst-libav, lossy MPEG-4 Part 2 |
//! | `MJPG` | `jpegenc`                         | gst-plugins-good |
//! | `I420` | `video/x-raw,format=I420`         | uncompressed, terminal fallback |
//!
//! The first candidate that both instantiates and reports ready wins; later
//! candidates are never tried.
//!
//! # Pipeline
//!
//! ```text
//! appsrc (BGR, PTS = n / fps)
//!   → videoconvert
//!   → <codec branch>
//!   → matroskamux
//!   → filesink (recording_<timestamp>.mkv)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use gstreamer_video as gst_video;
use screenrec_core::{
    Codec, EncoderAttempt, EncoderCandidate, FrameBuffer, RecorderError, ENCODER_INPUT_LAYOUT,
};
use tracing::{debug, error, info, warn};

/// How long `close` waits for the muxer to drain after EOS.
const EOS_TIMEOUT_SECS: u64 = 5;
/// How long a freshly started pipeline gets to reach PLAYING.
const READY_TIMEOUT_MS: u64 = 500;

// ── Backend seam ──────────────────────────────────────────────────────────────

/// Where and how a session's video is written.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderTarget {
    pub path:       PathBuf,
    pub frame_rate: f64,
    pub width:      u32,
    pub height:     u32,
}

/// Factory for per-codec frame sinks.
pub trait EncoderBackend {
    type Sink: FrameSink;

    /// Build a sink for `candidate` bound to `target`.
    fn instantiate(&self, candidate: &EncoderCandidate, target: &EncoderTarget) -> anyhow::Result<Self::Sink>;
}

/// An instantiated encoder writing one container file.
pub trait FrameSink {
    /// Whether the sink is actually able to accept frames.
    fn is_ready(&mut self) -> bool;

    /// Append frame number `index` (0-based).
    fn push(&mut self, frame: &FrameBuffer, index: u64) -> anyhow::Result<()>;

    /// Finalise the container and release the output handle.
    fn release(&mut self) -> anyhow::Result<()>;

    /// Tear down a sink that never became ready. Nothing is finalised.
    fn abort(&mut self);
}

/// Result of trying one candidate.
pub enum OpenAttempt<S> {
    Opened(S),
    Failed(String),
}

/// Try a single candidate; a sink that instantiates but is not ready counts
/// as a failure and is aborted before returning.
pub fn try_candidate<B: EncoderBackend>(
    backend: &B,
    candidate: &EncoderCandidate,
    target: &EncoderTarget,
) -> OpenAttempt<B::Sink> {
    match backend.instantiate(candidate, target) {
        Ok(mut sink) => {
            if sink.is_ready() {
                OpenAttempt::Opened(sink)
            } else {
                sink.abort();
                OpenAttempt::Failed("encoder instantiated but not ready".to_owned())
            }
        }
        Err(e) => OpenAttempt::Failed(format!("{e:#}")),
    }
}

/// Walk `candidates` in priority order and return the first encoder that opens.
///
/// When every candidate fails, any file the attempts left at `target.path`
/// is removed and `EncoderExhausted` lists what was tried.
pub fn open_encoder<B: EncoderBackend>(
    backend: &B,
    target: &EncoderTarget,
    candidates: &[EncoderCandidate],
) -> Result<OpenEncoder<B::Sink>, RecorderError> {
    let preexisting = target.path.exists();
    let mut ordered = candidates.to_vec();
    ordered.sort_by_key(|c| c.priority);

    let mut attempts = Vec::with_capacity(ordered.len());
    for candidate in &ordered {
        match try_candidate(backend, candidate, target) {
            OpenAttempt::Opened(sink) => {
                info!(
                    "Using {} encoder with MKV container, framerate: {}fps",
                    candidate.codec, target.frame_rate
                );
                return Ok(OpenEncoder::new(sink, *candidate, target));
            }
            OpenAttempt::Failed(reason) => {
                warn!("Failed to use {} encoder: {}", candidate.codec, reason);
                attempts.push(EncoderAttempt { codec: candidate.codec, reason });
            }
        }
    }

    error!("All encoders failed, cannot record video");
    if !preexisting {
        remove_partial_output(&target.path);
    }
    Err(RecorderError::EncoderExhausted { attempts })
}

fn remove_partial_output(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}

// ── OpenEncoder ───────────────────────────────────────────────────────────────

/// The session's active encoder. Owns the output handle and releases it
/// exactly once, either through [`OpenEncoder::close`] or on drop.
pub struct OpenEncoder<S: FrameSink> {
    sink:           S,
    candidate:      EncoderCandidate,
    width:          u32,
    height:         u32,
    frames_written: u64,
    closed:         bool,
}

impl<S: FrameSink> OpenEncoder<S> {
    fn new(sink: S, candidate: EncoderCandidate, target: &EncoderTarget) -> Self {
        Self {
            sink,
            candidate,
            width: target.width,
            height: target.height,
            frames_written: 0,
            closed: false,
        }
    }

    pub fn codec(&self) -> Codec {
        self.candidate.codec
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Append one frame.
    pub fn write(&mut self, frame: &FrameBuffer) -> Result<(), RecorderError> {
        if self.closed {
            return Err(RecorderError::EncodeWriteFailed { reason: "writer closed".to_owned() });
        }
        if (frame.width, frame.height) != (self.width, self.height) {
            return Err(RecorderError::EncodeWriteFailed {
                reason: format!(
                    "frame is {}x{}, encoder expects {}x{}",
                    frame.width, frame.height, self.width, self.height
                ),
            });
        }
        if frame.layout != ENCODER_INPUT_LAYOUT || !frame.is_well_formed() {
            return Err(RecorderError::EncodeWriteFailed {
                reason: format!("expected packed {} pixels, got {}", ENCODER_INPUT_LAYOUT, frame.layout),
            });
        }

        self.sink
            .push(frame, self.frames_written)
            .map_err(|e| RecorderError::EncodeWriteFailed { reason: format!("{e:#}") })?;
        self.frames_written += 1;
        Ok(())
    }

    /// Release the output handle. Further calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.sink.release() {
            Ok(()) => debug!("{} encoder closed after {} frame(s)", self.candidate.codec, self.frames_written),
            Err(e) => warn!("{} encoder close: {:#}", self.candidate.codec, e),
        }
    }
}

impl<S: FrameSink> Drop for OpenEncoder<S> {
    fn drop(&mut self) {
        self.close();
    }
}

// ── GStreamer backend ─────────────────────────────────────────────────────────

/// Encoder backend writing Matroska files through GStreamer.
pub struct GstEncoderBackend;

impl GstEncoderBackend {
    pub fn new() -> anyhow::Result<Self> {
        gst::init().context("GStreamer init")?;
        Ok(Self)
    }
}

/// Elements a codec branch needs, and the branch's launch-line fragment.
fn codec_branch(codec: Codec) -> (&'static [&'static str], &'static str) {
    match codec {
        Codec::Mpeg4   => (&["avenc_mpeg4", "mpeg4videoparse"], "avenc_mpeg4 ! mpeg4videoparse"),
        Codec::Mjpeg   => (&["jpegenc"], "jpegenc"),
        Codec::RawI420 => (&[], "video/x-raw,format=I420"),
    }
}

const COMMON_ELEMENTS: &[&str] = &["appsrc", "videoconvert", "matroskamux", "filesink"];

impl EncoderBackend for GstEncoderBackend {
    type Sink = GstMkvSink;

    fn instantiate(&self, candidate: &EncoderCandidate, target: &EncoderTarget) -> anyhow::Result<GstMkvSink> {
        let (elements, branch) = codec_branch(candidate.codec);
        for name in COMMON_ELEMENTS.iter().chain(elements) {
            if gst::ElementFactory::find(name).is_none() {
                bail!("GStreamer element '{name}' not found");
            }
        }

        let desc = format!(
            "appsrc name=src is-live=true format=time block=true \
             ! videoconvert \
             ! {branch} \
             ! matroskamux \
             ! filesink name=out"
        );
        debug!("Encoder pipeline ({}): {}", candidate.codec, desc);

        let pipeline = gst::parse::launch(&desc)
            .context("Parsing encoder pipeline")?
            .downcast::<gst::Pipeline>()
            .map_err(|_| anyhow::anyhow!("Expected a Pipeline"))?;

        let appsrc: AppSrc = pipeline
            .by_name("src")
            .context("Finding appsrc 'src'")?
            .downcast::<AppSrc>()
            .map_err(|_| anyhow::anyhow!("Expected AppSrc"))?;

        let caps = gst_video::VideoInfo::builder(gst_video::VideoFormat::Bgr, target.width, target.height)
            .fps(frame_rate_fraction(target.frame_rate))
            .build()
            .context("Building BGR video info")?
            .to_caps()
            .context("Building BGR caps")?;
        appsrc.set_caps(Some(&caps));

        let location = target
            .path
            .to_str()
            .with_context(|| format!("Output path is not UTF-8: {}", target.path.display()))?;
        pipeline
            .by_name("out")
            .context("Finding filesink 'out'")?
            .set_property("location", location);

        let bus = pipeline.bus().context("Encoder pipeline has no bus")?;

        let sink = GstMkvSink {
            pipeline,
            appsrc,
            bus,
            frame_ns: frame_duration_ns(target.frame_rate),
        };
        sink.pipeline
            .set_state(gst::State::Playing)
            .context("Starting encoder pipeline")?;
        Ok(sink)
    }
}

/// `frame_rate` as a GStreamer fraction with millihertz precision.
fn frame_rate_fraction(frame_rate: f64) -> gst::Fraction {
    gst::Fraction::new((frame_rate * 1000.0).round() as i32, 1000)
}

fn frame_duration_ns(frame_rate: f64) -> u64 {
    (1_000_000_000.0 / frame_rate).round() as u64
}

/// A running `appsrc → … → matroskamux → filesink` pipeline.
pub struct GstMkvSink {
    pipeline: gst::Pipeline,
    appsrc:   AppSrc,
    bus:      gst::Bus,
    frame_ns: u64,
}

impl GstMkvSink {
    /// Pop a pending pipeline error without blocking.
    fn pending_error(&self) -> Option<String> {
        let msg = self.bus.pop_filtered(&[gst::MessageType::Error])?;
        match msg.view() {
            gst::MessageView::Error(e) => Some(format!("{} ({:?})", e.error(), e.debug())),
            _ => None,
        }
    }
}

impl FrameSink for GstMkvSink {
    fn is_ready(&mut self) -> bool {
        if let Some(err) = self.pending_error() {
            warn!("Encoder pipeline error during start: {}", err);
            return false;
        }
        let (result, current, _pending) = self
            .pipeline
            .state(gst::ClockTime::from_mseconds(READY_TIMEOUT_MS));
        result.is_ok() && current == gst::State::Playing
    }

    fn abort(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            debug!("Stopping not-ready encoder pipeline: {:?}", e);
        }
    }

    fn push(&mut self, frame: &FrameBuffer, index: u64) -> anyhow::Result<()> {
        if let Some(err) = self.pending_error() {
            bail!("encoder pipeline error: {err}");
        }

        let mut buf = gst::Buffer::from_slice(frame.data.clone());
        {
            let buf_mut = buf.make_mut();
            buf_mut.set_pts(gst::ClockTime::from_nseconds(index * self.frame_ns));
            buf_mut.set_duration(gst::ClockTime::from_nseconds(self.frame_ns));
        }

        self.appsrc
            .push_buffer(buf)
            .map_err(|e| anyhow::anyhow!("appsrc push_buffer: {:?}", e))?;
        Ok(())
    }

    fn release(&mut self) -> anyhow::Result<()> {
        if let Err(e) = self.appsrc.end_of_stream() {
            debug!("appsrc end_of_stream: {:?}", e);
        }

        let msg = self.bus.timed_pop_filtered(
            gst::ClockTime::from_seconds(EOS_TIMEOUT_SECS),
            &[gst::MessageType::Eos, gst::MessageType::Error],
        );
        match msg.as_ref().map(|m| m.view()) {
            Some(gst::MessageView::Eos(_)) => debug!("Encoder pipeline drained"),
            Some(gst::MessageView::Error(e)) => warn!("Encoder pipeline error while draining: {}", e.error()),
            _ => warn!("Encoder pipeline did not drain within {}s", EOS_TIMEOUT_SECS),
        }

        self.pipeline
            .set_state(gst::State::Null)
            .context("Stopping encoder pipeline")?;
        Ok(())
    }
}

impl Drop for GstMkvSink {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
