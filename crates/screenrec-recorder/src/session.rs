//! `Recorder` — one display's capture → convert → encode → preview loop.
//!
//! ```text
//! DisplaySource ─► convert (→ BGR) ─► OpenEncoder (Matroska file)
//!                                 └─► PreviewSurface (window, not saved)
//!        ▲
//!        └── gated every iteration by CancellationSource
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Idle ─► Starting ─┬─► Running ─► Stopping ─► Closed
//!                   └── bad frame rate / EncoderExhausted ─► Closed
//! ```
//!
//! Everything runs on the caller's thread, one frame at a time. Teardown
//! (encoder closed, then preview disposed, then path reported) is owned by
//! [`ActiveSession`] and runs on every exit path, unwinding included.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use screenrec_capture::DisplaySource;
use screenrec_core::{
    convert, frame_interval, Codec, DisplayDescriptor, EncoderCandidate, RecorderError, Resolution,
    ENCODER_CANDIDATES, ENCODER_INPUT_LAYOUT,
};
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationSource;
use crate::encoder::{open_encoder, EncoderBackend, EncoderTarget, FrameSink, OpenEncoder};
use crate::preview::PreviewSurface;

// ── Requests & reports ────────────────────────────────────────────────────────

/// A request to record one display into one file.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub display:     DisplayDescriptor,
    pub output_path: PathBuf,
    pub frame_rate:  f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Closed,
}

/// Why a running session stopped.
#[derive(Debug)]
pub enum StopReason {
    /// The cancellation source (stop key) fired.
    Cancelled,
    /// The operator quit from the preview window.
    PreviewInterrupt,
    /// A capture, conversion or encode step failed; the session was aborted.
    Failed(RecorderError),
}

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    pub path:           PathBuf,
    pub codec:          Codec,
    pub resolution:     Resolution,
    pub frames_written: u64,
    pub stop_reason:    StopReason,
    /// Every state the session passed through, in order.
    pub states:         Vec<SessionState>,
}

impl SessionReport {
    /// Whether the file at `path` is a complete recording.
    pub fn is_success(&self) -> bool {
        !matches!(self.stop_reason, StopReason::Failed(_))
    }
}

// ── Recorder ──────────────────────────────────────────────────────────────────

/// Owns the collaborators a recording needs. Each [`Recorder::record`] call
/// is one independent session.
pub struct Recorder<D, B, C> {
    source:      D,
    backend:     B,
    cancel:      C,
    candidates:  Vec<EncoderCandidate>,
    pace_frames: bool,
}

impl<D, B, C> Recorder<D, B, C>
where
    D: DisplaySource,
    B: EncoderBackend,
    C: CancellationSource,
{
    pub fn new(source: D, backend: B, cancel: C) -> Self {
        Self {
            source,
            backend,
            cancel,
            candidates: ENCODER_CANDIDATES.to_vec(),
            pace_frames: true,
        }
    }

    /// Sleep out the remainder of each frame period (on by default).
    pub fn with_pacing(mut self, pace_frames: bool) -> Self {
        self.pace_frames = pace_frames;
        self
    }

    pub fn source_mut(&mut self) -> &mut D {
        &mut self.source
    }

    /// Run one session to completion.
    ///
    /// Returns `Err` only when the session cannot start: the frame rate has
    /// no usable period (`ConfigurationInvalid`) or no encoder could be
    /// opened (`EncoderExhausted`). The session then never ran and no output
    /// file is left behind. Every other failure ends the session cleanly and
    /// is reported in [`SessionReport::stop_reason`].
    pub fn record<P: PreviewSurface>(
        &mut self,
        request: &StartRequest,
        mut preview: P,
    ) -> Result<SessionReport, RecorderError> {
        let mut states = vec![SessionState::Idle];

        enter(&mut states, SessionState::Starting);
        let display = &request.display;
        let target = EncoderTarget {
            path: request.output_path.clone(),
            frame_rate: request.frame_rate,
            width: display.width,
            height: display.height,
        };

        let opened = frame_interval(request.frame_rate).and_then(|interval| {
            open_encoder(&self.backend, &target, &self.candidates).map(|encoder| (interval, encoder))
        });
        let (interval, encoder) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                preview.dispose();
                enter(&mut states, SessionState::Closed);
                return Err(e);
            }
        };
        let codec = encoder.codec();

        let mut session = ActiveSession::new(encoder, preview, target.path.clone());
        enter(&mut states, SessionState::Running);
        info!(
            "Recording display {} ({}) at {}fps... Press 'Esc' to stop",
            display.index,
            display.resolution(),
            request.frame_rate
        );

        let stop_reason = self.run_frames(&mut session, display, interval);
        match &stop_reason {
            StopReason::Failed(e) => error!("Recording aborted during {}: {}", e.stage(), e),
            reason => info!("Recording stopped: {:?}", reason),
        }

        enter(&mut states, SessionState::Stopping);
        let frames_written = session.teardown(!matches!(stop_reason, StopReason::Failed(_)));
        enter(&mut states, SessionState::Closed);

        Ok(SessionReport {
            path: target.path,
            codec,
            resolution: display.resolution(),
            frames_written,
            stop_reason,
            states,
        })
    }

    fn run_frames<S, P>(
        &mut self,
        session: &mut ActiveSession<S, P>,
        display: &DisplayDescriptor,
        interval: Duration,
    ) -> StopReason
    where
        S: FrameSink,
        P: PreviewSurface,
    {
        loop {
            let started = Instant::now();

            if self.cancel.is_requested() {
                return StopReason::Cancelled;
            }
            if let Err(e) = self.step(session, display) {
                return StopReason::Failed(e);
            }
            if session.preview.poll_interrupt() {
                return StopReason::PreviewInterrupt;
            }

            if self.pace_frames {
                if let Some(rest) = interval.checked_sub(started.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
        }
    }

    /// Capture, convert, encode and preview one frame.
    fn step<S, P>(
        &mut self,
        session: &mut ActiveSession<S, P>,
        display: &DisplayDescriptor,
    ) -> Result<(), RecorderError>
    where
        S: FrameSink,
        P: PreviewSurface,
    {
        let raw = self.source.capture(display)?;
        let frame = convert(&raw, ENCODER_INPUT_LAYOUT)?;
        drop(raw);
        session.encoder.write(&frame)?;
        session.preview.render(&frame);
        Ok(())
    }
}

fn enter(states: &mut Vec<SessionState>, next: SessionState) {
    debug!("Session {:?} → {:?}", states.last(), next);
    states.push(next);
}

// ── ActiveSession ─────────────────────────────────────────────────────────────

/// Resources held while a session is `Running`. Dropping it performs the
/// same teardown as [`ActiveSession::teardown`].
struct ActiveSession<S: FrameSink, P: PreviewSurface> {
    encoder:   OpenEncoder<S>,
    preview:   P,
    path:      PathBuf,
    torn_down: bool,
}

impl<S: FrameSink, P: PreviewSurface> ActiveSession<S, P> {
    fn new(encoder: OpenEncoder<S>, preview: P, path: PathBuf) -> Self {
        Self { encoder, preview, path, torn_down: false }
    }

    /// Close the encoder, dispose the preview, report the path. Only a
    /// `complete` session is reported as saved. Returns the number of frames
    /// written.
    fn teardown(&mut self, complete: bool) -> u64 {
        if !self.torn_down {
            self.torn_down = true;
            self.encoder.close();
            self.preview.dispose();
            if complete {
                info!("Recording saved to: {}", self.path.display());
            } else {
                warn!("Recording incomplete, partial file left at: {}", self.path.display());
            }
        }
        self.encoder.frames_written()
    }
}

impl<S: FrameSink, P: PreviewSurface> Drop for ActiveSession<S, P> {
    fn drop(&mut self) {
        self.teardown(false);
    }
}
