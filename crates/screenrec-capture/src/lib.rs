//! screenrec-capture — Display enumeration and frame capture.
//!
//! # Capture backends
//!
//! | Backend | Platforms | Output |
//! |---------|-----------|--------|
//! | xcap    | X11, Wayland (PipeWire portal), Windows, macOS | RGBA |
//!
//! # Usage
//!
//! ```rust,no_run
//! # fn example() -> Result<(), screenrec_core::RecorderError> {
//! use screenrec_capture::{DisplaySource, XcapSource};
//! let mut source = XcapSource::new();
//! let displays = source.list_displays()?;
//! let frame = source.capture(&displays[0])?;
//! // frame.data: RGBA pixels, exactly displays[0].width × displays[0].height
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! xcap::Monitor::all() ──► DisplayDescriptor (1-based, origin, size)
//!                                   │
//!                                   ▼
//!                 Monitor::capture_image() (RgbaImage)
//!                                   │
//!                  resample if physical != descriptor size
//!                                   │
//!                                   ▼
//!                          FrameBuffer (RGBA)
//! ```

use image::imageops::{self, FilterType};
use image::RgbaImage;
use screenrec_core::{DisplayDescriptor, FrameBuffer, PixelLayout, RecorderError};
use tracing::{debug, info, warn};
use xcap::Monitor;

// ── DisplaySource ─────────────────────────────────────────────────────────────

/// Something that can enumerate displays and grab their pixels on demand.
pub trait DisplaySource {
    /// Capturable displays in enumeration order. Never contains a synthetic
    /// "all displays combined" entry.
    fn list_displays(&mut self) -> Result<Vec<DisplayDescriptor>, RecorderError>;

    /// Grab one frame sized exactly to `display`.
    fn capture(&mut self, display: &DisplayDescriptor) -> Result<FrameBuffer, RecorderError>;
}

// ── XcapSource ────────────────────────────────────────────────────────────────

/// Display source backed by the `xcap` crate.
///
/// The monitor handle is resolved on the first capture and reused for the
/// rest of the session.
#[derive(Default)]
pub struct XcapSource {
    cached: Option<(DisplayDescriptor, Monitor)>,
}

impl XcapSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn monitor_for(&mut self, display: &DisplayDescriptor) -> Result<&Monitor, RecorderError> {
        let stale = !matches!(&self.cached, Some((d, _)) if d == display);
        if stale {
            let monitors = all_monitors(display.index)?;
            let monitor = monitors
                .into_iter()
                .find(|m| matches_descriptor(m, display))
                .ok_or_else(|| RecorderError::CaptureUnavailable {
                    display: display.index,
                    reason: format!("display '{}' is no longer connected", display.name),
                })?;
            debug!("Resolved xcap monitor for display {}", display.index);
            self.cached = Some((display.clone(), monitor));
        }
        match &self.cached {
            Some((_, monitor)) => Ok(monitor),
            None => Err(RecorderError::CaptureUnavailable {
                display: display.index,
                reason: "monitor handle missing".to_owned(),
            }),
        }
    }
}

impl DisplaySource for XcapSource {
    fn list_displays(&mut self) -> Result<Vec<DisplayDescriptor>, RecorderError> {
        let monitors = all_monitors(0)?;
        let geometry = monitors.iter().map(|m| {
            (
                m.name().unwrap_or_default(),
                m.x().unwrap_or(0),
                m.y().unwrap_or(0),
                m.width().unwrap_or(0),
                m.height().unwrap_or(0),
            )
        });
        let displays = descriptors_from_geometry(geometry);
        info!("Found {} display(s)", displays.len());
        Ok(displays)
    }

    fn capture(&mut self, display: &DisplayDescriptor) -> Result<FrameBuffer, RecorderError> {
        let index = display.index;
        let image = self
            .monitor_for(display)?
            .capture_image()
            .map_err(|e| RecorderError::CaptureUnavailable {
                display: index,
                reason: format!("capture_image: {e}"),
            })?;
        Ok(fit_to_descriptor(image, display))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn all_monitors(display: usize) -> Result<Vec<Monitor>, RecorderError> {
    Monitor::all().map_err(|e| RecorderError::CaptureUnavailable {
        display,
        reason: format!("Monitor::all: {e}"),
    })
}

fn matches_descriptor(monitor: &Monitor, display: &DisplayDescriptor) -> bool {
    monitor.x().ok() == Some(display.x)
        && monitor.y().ok() == Some(display.y)
        && monitor.name().map(|n| n == display.name).unwrap_or(true)
}

/// Build 1-based descriptors from `(name, x, y, width, height)` tuples,
/// skipping zero-sized entries.
pub fn descriptors_from_geometry<I>(geometry: I) -> Vec<DisplayDescriptor>
where
    I: IntoIterator<Item = (String, i32, i32, u32, u32)>,
{
    geometry
        .into_iter()
        .filter(|(name, _, _, w, h)| {
            let usable = *w > 0 && *h > 0;
            if !usable {
                warn!("Skipping display '{}' with empty geometry", name);
            }
            usable
        })
        .enumerate()
        .map(|(i, (name, x, y, w, h))| DisplayDescriptor::new(i + 1, name, x, y, w, h))
        .collect()
}

/// Turn a captured image into a frame of exactly the descriptor's size.
///
/// HiDPI backends return physical pixels; those are resampled so the frame
/// geometry stays fixed for the whole session.
pub fn fit_to_descriptor(image: RgbaImage, display: &DisplayDescriptor) -> FrameBuffer {
    let (w, h) = (display.width, display.height);
    let image = if image.dimensions() != (w, h) {
        debug!(
            "Resampling {}x{} capture to {}x{}",
            image.width(),
            image.height(),
            w,
            h
        );
        imageops::resize(&image, w, h, FilterType::Triangle)
    } else {
        image
    };
    FrameBuffer::new(image.into_raw(), w, h, PixelLayout::Rgba)
}
