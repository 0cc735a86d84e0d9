//! In-memory stand-ins for the display, encoder, stop-key and preview
//! backends, so the recording pipeline can be exercised without a desktop.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use screenrec_capture::DisplaySource;
use screenrec_core::{
    Codec, DisplayDescriptor, EncoderCandidate, FrameBuffer, PixelLayout, RecorderError,
    ENCODER_CANDIDATES,
};

use crate::cancel::CancellationSource;
use crate::encoder::{EncoderBackend, EncoderTarget, FrameSink};
use crate::preview::PreviewSurface;

// ── Encoder ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `instantiate` returns an error.
    Error,
    /// `instantiate` succeeds but the sink reports not ready.
    NotReady,
    Ready,
}

/// Everything the fake backend observed.
#[derive(Debug, Clone, Default)]
pub struct ProbeLog {
    pub instantiated: Vec<Codec>,
    pub released:     Vec<Codec>,
    pub aborted:      Vec<Codec>,
    /// `(index, width, height)` of every frame pushed, in order.
    pub frames:       Vec<(u64, u32, u32)>,
}

pub struct FakeBackend {
    outcomes:     HashMap<Codec, Outcome>,
    create_files: bool,
    fail_push_at: Option<u64>,
    log:          Rc<RefCell<ProbeLog>>,
}

impl FakeBackend {
    /// Outcomes are given in `ENCODER_CANDIDATES` order.
    pub fn new(outcomes: [Outcome; 3]) -> Self {
        Self {
            outcomes: ENCODER_CANDIDATES.iter().map(|c| c.codec).zip(outcomes).collect(),
            create_files: false,
            fail_push_at: None,
            log: Rc::default(),
        }
    }

    /// Touch the output file on every instantiation, like a real muxer would.
    pub fn creating_files(mut self) -> Self {
        self.create_files = true;
        self
    }

    /// Make the sink reject frame number `index`.
    pub fn failing_push_at(mut self, index: u64) -> Self {
        self.fail_push_at = Some(index);
        self
    }

    pub fn probe(&self) -> ProbeLog {
        self.log.borrow().clone()
    }

    pub fn shared_log(&self) -> Rc<RefCell<ProbeLog>> {
        Rc::clone(&self.log)
    }
}

impl EncoderBackend for FakeBackend {
    type Sink = FakeSink;

    fn instantiate(&self, candidate: &EncoderCandidate, target: &EncoderTarget) -> anyhow::Result<FakeSink> {
        self.log.borrow_mut().instantiated.push(candidate.codec);
        if self.create_files {
            std::fs::write(&target.path, b"")?;
        }
        match self.outcomes.get(&candidate.codec).copied().unwrap_or(Outcome::Error) {
            Outcome::Error => anyhow::bail!("{} unavailable", candidate.codec),
            outcome => Ok(FakeSink {
                codec: candidate.codec,
                ready: outcome == Outcome::Ready,
                fail_push_at: self.fail_push_at,
                log: Rc::clone(&self.log),
            }),
        }
    }
}

pub struct FakeSink {
    codec:        Codec,
    ready:        bool,
    fail_push_at: Option<u64>,
    log:          Rc<RefCell<ProbeLog>>,
}

impl FrameSink for FakeSink {
    fn is_ready(&mut self) -> bool {
        self.ready
    }

    fn push(&mut self, frame: &FrameBuffer, index: u64) -> anyhow::Result<()> {
        if self.fail_push_at == Some(index) {
            anyhow::bail!("writer rejected frame {index}");
        }
        self.log.borrow_mut().frames.push((index, frame.width, frame.height));
        Ok(())
    }

    fn release(&mut self) -> anyhow::Result<()> {
        self.log.borrow_mut().released.push(self.codec);
        Ok(())
    }

    fn abort(&mut self) {
        self.log.borrow_mut().aborted.push(self.codec);
    }
}

// ── Display ───────────────────────────────────────────────────────────────────

/// Produces solid RGBA frames; can be told to lose the display after a
/// number of captures.
pub struct FakeDisplay {
    displays:       Vec<DisplayDescriptor>,
    captures:       u64,
    disconnect_at:  Option<u64>,
}

impl FakeDisplay {
    pub fn new(displays: Vec<DisplayDescriptor>) -> Self {
        Self { displays, captures: 0, disconnect_at: None }
    }

    pub fn single(width: u32, height: u32) -> Self {
        Self::new(vec![DisplayDescriptor::new(1, "fake-0", 0, 0, width, height)])
    }

    pub fn disconnecting_at(mut self, capture: u64) -> Self {
        self.disconnect_at = Some(capture);
        self
    }

    pub fn captures(&self) -> u64 {
        self.captures
    }

    pub fn display(&self, index: usize) -> DisplayDescriptor {
        self.displays[index - 1].clone()
    }
}

impl DisplaySource for FakeDisplay {
    fn list_displays(&mut self) -> Result<Vec<DisplayDescriptor>, RecorderError> {
        Ok(self.displays.clone())
    }

    fn capture(&mut self, display: &DisplayDescriptor) -> Result<FrameBuffer, RecorderError> {
        if self.disconnect_at == Some(self.captures) {
            return Err(RecorderError::CaptureUnavailable {
                display: display.index,
                reason: "display disconnected".to_owned(),
            });
        }
        self.captures += 1;
        let len = FrameBuffer::expected_len(display.width, display.height, PixelLayout::Rgba);
        Ok(FrameBuffer::new(vec![0x80u8; len], display.width, display.height, PixelLayout::Rgba))
    }
}

// ── Stop key ──────────────────────────────────────────────────────────────────

/// Reports a stop request once it has been polled `after` times.
pub struct FakeCancel {
    after: u64,
    polls: Cell<u64>,
}

impl FakeCancel {
    pub fn after(polls: u64) -> Self {
        Self { after: polls, polls: Cell::new(0) }
    }

    pub fn immediately() -> Self {
        Self::after(0)
    }

    pub fn never() -> Self {
        Self::after(u64::MAX)
    }

    pub fn polls(&self) -> u64 {
        self.polls.get()
    }
}

impl CancellationSource for FakeCancel {
    fn is_requested(&self) -> bool {
        let seen = self.polls.get();
        self.polls.set(seen + 1);
        seen >= self.after
    }
}

// ── Preview ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PreviewLog {
    pub rendered: Vec<(u32, u32)>,
    pub disposed: u32,
}

/// Records what it was asked to show; raises its interrupt after a number
/// of renders.
pub struct FakePreview {
    interrupt_after: Option<usize>,
    log:             Rc<RefCell<PreviewLog>>,
}

impl FakePreview {
    pub fn new() -> (Self, Rc<RefCell<PreviewLog>>) {
        let log = Rc::<RefCell<PreviewLog>>::default();
        (Self { interrupt_after: None, log: Rc::clone(&log) }, log)
    }

    pub fn interrupting_after(renders: usize) -> (Self, Rc<RefCell<PreviewLog>>) {
        let (mut preview, log) = Self::new();
        preview.interrupt_after = Some(renders);
        (preview, log)
    }
}

impl PreviewSurface for FakePreview {
    fn render(&mut self, frame: &FrameBuffer) {
        self.log.borrow_mut().rendered.push((frame.width, frame.height));
    }

    fn poll_interrupt(&mut self) -> bool {
        self.interrupt_after
            .map_or(false, |n| self.log.borrow().rendered.len() >= n)
    }

    fn dispose(&mut self) {
        self.log.borrow_mut().disposed += 1;
    }
}

// ── Logs ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` under a subscriber that collects the formatted log output.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let text = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (out, text)
}
