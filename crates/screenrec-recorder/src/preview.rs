//! Live preview window shown while recording.
//!
//! The preview is a convenience for the operator and is never persisted: a
//! preview that fails to start or dies mid-session is logged and switched
//! off, the recording carries on.
//!
//! # Pipeline
//!
//! ```text
//! FrameBuffer ─► downscale (≤ max width, aspect kept)
//!                   │
//!                   ▼
//!   appsrc ─► videoconvert ─► autovideosink
//!                                  │
//!          bus: key-press / window closed ─► poll_interrupt()
//! ```

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use gstreamer_video as gst_video;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel, Rgb, Rgba};
use screenrec_core::{FrameBuffer, PixelLayout};
use tracing::{debug, info, warn};

// ── PreviewSurface ────────────────────────────────────────────────────────────

pub trait PreviewSurface {
    /// Show a (downscaled) copy of `frame`.
    fn render(&mut self, frame: &FrameBuffer);

    /// Whether the operator asked to stop from the preview window.
    fn poll_interrupt(&mut self) -> bool;

    /// Close the window and release its resources. Idempotent.
    fn dispose(&mut self);
}

/// Headless preview: renders nothing and never interrupts.
#[derive(Debug, Default)]
pub struct NoPreview;

impl PreviewSurface for NoPreview {
    fn render(&mut self, _frame: &FrameBuffer) {}

    fn poll_interrupt(&mut self) -> bool {
        false
    }

    fn dispose(&mut self) {}
}

// ── Scaling ───────────────────────────────────────────────────────────────────

/// Preview dimensions for a `width × height` frame capped at `max_width`.
/// Never upscales.
pub fn preview_size(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled_h = (height as u64 * max_width as u64 / width as u64).max(1) as u32;
    (max_width, scaled_h)
}

/// Downscale `frame` to fit `max_width`, keeping its layout.
pub fn downscale(frame: &FrameBuffer, max_width: u32) -> FrameBuffer {
    let (w, h) = preview_size(frame.width, frame.height, max_width);
    if (w, h) == (frame.width, frame.height) {
        return frame.clone();
    }
    let resized = match frame.layout.bytes_per_pixel() {
        3 => resize_packed::<Rgb<u8>>(frame, w, h),
        _ => resize_packed::<Rgba<u8>>(frame, w, h),
    };
    match resized {
        Some(data) => FrameBuffer::new(data, w, h, frame.layout),
        None => frame.clone(),
    }
}

// Channel order is irrelevant to resampling, so BGR(A) goes through the
// RGB(A) pixel types unchanged.
fn resize_packed<P>(frame: &FrameBuffer, w: u32, h: u32) -> Option<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let image = ImageBuffer::<P, &[u8]>::from_raw(frame.width, frame.height, &frame.data[..])?;
    Some(imageops::resize(&image, w, h, FilterType::Triangle).into_raw())
}

fn video_format(layout: PixelLayout) -> gst_video::VideoFormat {
    match layout {
        PixelLayout::Rgba => gst_video::VideoFormat::Rgba,
        PixelLayout::Bgra => gst_video::VideoFormat::Bgra,
        PixelLayout::Rgbx => gst_video::VideoFormat::Rgbx,
        PixelLayout::Bgrx => gst_video::VideoFormat::Bgrx,
        PixelLayout::Rgb  => gst_video::VideoFormat::Rgb,
        PixelLayout::Bgr  => gst_video::VideoFormat::Bgr,
    }
}

// ── GstPreview ────────────────────────────────────────────────────────────────

/// Preview window backed by a GStreamer video sink.
///
/// The pipeline is built on the first rendered frame, once the preview
/// geometry is known.
pub struct GstPreview {
    max_width:   u32,
    quit_key:    String,
    window:      Option<PreviewWindow>,
    failed:      bool,
    interrupted: bool,
    disposed:    bool,
}

struct PreviewWindow {
    pipeline: gst::Pipeline,
    appsrc:   AppSrc,
    bus:      gst::Bus,
}

impl GstPreview {
    pub fn new(max_width: u32, quit_key: impl Into<String>) -> Self {
        Self {
            max_width,
            quit_key: quit_key.into(),
            window: None,
            failed: false,
            interrupted: false,
            disposed: false,
        }
    }

    fn open_window(frame: &FrameBuffer) -> anyhow::Result<PreviewWindow> {
        use anyhow::Context;

        gst::init().context("GStreamer init")?;
        let desc = "appsrc name=src is-live=true format=time do-timestamp=true \
                    ! videoconvert \
                    ! autovideosink sync=false";
        debug!("Preview pipeline: {}", desc);

        let pipeline = gst::parse::launch(desc)
            .context("Parsing preview pipeline")?
            .downcast::<gst::Pipeline>()
            .map_err(|_| anyhow::anyhow!("Expected a Pipeline"))?;

        let appsrc: AppSrc = pipeline
            .by_name("src")
            .context("Finding appsrc 'src'")?
            .downcast::<AppSrc>()
            .map_err(|_| anyhow::anyhow!("Expected AppSrc"))?;

        let caps = gst_video::VideoInfo::builder(video_format(frame.layout), frame.width, frame.height)
            .build()
            .context("Building preview video info")?
            .to_caps()
            .context("Building preview caps")?;
        appsrc.set_caps(Some(&caps));

        let bus = pipeline.bus().context("Preview pipeline has no bus")?;
        pipeline
            .set_state(gst::State::Playing)
            .context("Starting preview pipeline")?;

        info!("Preview window opened at {}x{}", frame.width, frame.height);
        Ok(PreviewWindow { pipeline, appsrc, bus })
    }

    fn disable(&mut self, reason: &str) {
        warn!("Preview disabled: {}", reason);
        self.failed = true;
        if let Some(window) = self.window.take() {
            let _ = window.pipeline.set_state(gst::State::Null);
        }
    }
}

impl PreviewSurface for GstPreview {
    fn render(&mut self, frame: &FrameBuffer) {
        if self.disposed || self.failed {
            return;
        }
        let small = downscale(frame, self.max_width);

        if self.window.is_none() {
            match Self::open_window(&small) {
                Ok(window) => self.window = Some(window),
                Err(e) => return self.disable(&format!("{e:#}")),
            }
        }
        let Some(window) = self.window.as_ref() else { return };

        let buf = gst::Buffer::from_slice(small.data);
        if let Err(e) = window.appsrc.push_buffer(buf) {
            self.disable(&format!("appsrc push_buffer: {e:?}"));
        }
    }

    fn poll_interrupt(&mut self) -> bool {
        if self.interrupted {
            return true;
        }
        let Some(window) = self.window.as_ref() else { return false };

        while let Some(msg) = window.bus.pop() {
            match msg.view() {
                gst::MessageView::Error(e) => {
                    // Closing the sink's window surfaces as a resource error.
                    info!("Preview window closed: {}", e.error());
                    self.interrupted = true;
                }
                gst::MessageView::Element(_) if is_key_press(&msg, &self.quit_key) => {
                    info!("Preview quit key '{}' pressed", self.quit_key);
                    self.interrupted = true;
                }
                _ => {}
            }
        }
        self.interrupted
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(window) = self.window.take() {
            let _ = window.appsrc.end_of_stream();
            if let Err(e) = window.pipeline.set_state(gst::State::Null) {
                warn!("Stopping preview pipeline: {:?}", e);
            }
            debug!("Preview window closed");
        }
    }
}

impl Drop for GstPreview {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Whether `msg` is a navigation key-press for `key` posted by the video sink.
fn is_key_press(msg: &gst::MessageRef, key: &str) -> bool {
    let Some(s) = msg.structure() else { return false };
    if !s.has_name("GstNavigationMessage") {
        return false;
    }
    let Ok(event) = s.get::<gst::Event>("event") else { return false };
    let Some(fields) = event.structure() else { return false };
    fields.get::<&str>("event").ok() == Some("key-press") && fields.get::<&str>("key").ok() == Some(key)
}
