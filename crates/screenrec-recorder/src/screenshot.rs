//! One-shot screenshot: capture a display, save it as PNG, copy it to the
//! clipboard.
//!
//! ```text
//! DisplaySource::capture ─► convert (→ RGB) ─► <root>/screenshots/screenshot_<ts>.png
//!                        └► convert (→ RGBA) ─► ClipboardSink (best effort)
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::RgbImage;
use screenrec_capture::DisplaySource;
use screenrec_core::{convert, DisplayDescriptor, FrameBuffer, PixelLayout, RecorderError, Resolution};
use tracing::{info, warn};

use crate::storage::{ensure_output_directory, new_output_path, OutputKind};

// ── Clipboard ─────────────────────────────────────────────────────────────────

pub trait ClipboardSink {
    /// Place an RGBA image on the clipboard.
    fn set_image(&mut self, frame: &FrameBuffer) -> Result<(), RecorderError>;
}

/// The desktop clipboard, through `arboard`.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_image(&mut self, frame: &FrameBuffer) -> Result<(), RecorderError> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| RecorderError::Clipboard {
            reason: e.to_string(),
        })?;
        clipboard
            .set_image(arboard::ImageData {
                width:  frame.width as usize,
                height: frame.height as usize,
                bytes:  Cow::Borrowed(&frame.data[..]),
            })
            .map_err(|e| RecorderError::Clipboard { reason: e.to_string() })
    }
}

// ── Screenshot ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ScreenshotOutcome {
    pub path:            PathBuf,
    pub resolution:      Resolution,
    /// `Some` when the image was saved but could not be copied.
    pub clipboard_error: Option<RecorderError>,
}

/// Capture `display` once and save it under `<root>/screenshots/`.
///
/// The file is written before the clipboard is touched, so a clipboard
/// failure never loses the screenshot.
pub fn take_screenshot<D, C>(
    source: &mut D,
    display: &DisplayDescriptor,
    root: &Path,
    clipboard: &mut C,
) -> anyhow::Result<ScreenshotOutcome>
where
    D: DisplaySource,
    C: ClipboardSink,
{
    let raw = source.capture(display)?;
    ensure_output_directory(root, OutputKind::Screenshots).context("Creating screenshots folder")?;
    let path = new_output_path(root, OutputKind::Screenshots);

    let rgb = convert(&raw, PixelLayout::Rgb)?;
    let image = RgbImage::from_raw(rgb.width, rgb.height, rgb.data.to_vec())
        .context("Captured frame does not match its dimensions")?;
    image
        .save(&path)
        .with_context(|| format!("Saving {}", path.display()))?;
    info!("Screenshot saved to: {}", path.display());

    let clipboard_error = match convert(&raw, PixelLayout::Rgba).and_then(|rgba| clipboard.set_image(&rgba)) {
        Ok(()) => {
            info!("Screenshot copied to clipboard");
            None
        }
        Err(e) => {
            warn!("Could not copy screenshot to clipboard: {}", e);
            Some(e)
        }
    };

    Ok(ScreenshotOutcome {
        path,
        resolution: raw.resolution(),
        clipboard_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDisplay;

    #[derive(Default)]
    struct RecordingClipboard {
        fail:   bool,
        images: Vec<(u32, u32, PixelLayout)>,
    }

    impl ClipboardSink for RecordingClipboard {
        fn set_image(&mut self, frame: &FrameBuffer) -> Result<(), RecorderError> {
            if self.fail {
                return Err(RecorderError::Clipboard { reason: "no clipboard owner".to_owned() });
            }
            self.images.push((frame.width, frame.height, frame.layout));
            Ok(())
        }
    }

    #[test]
    fn saves_png_and_copies_rgba() {
        let root = tempfile::tempdir().unwrap();
        let mut source = FakeDisplay::single(40, 30);
        let display = source.display(1);
        let mut clipboard = RecordingClipboard::default();

        let outcome = take_screenshot(&mut source, &display, root.path(), &mut clipboard).unwrap();

        assert!(outcome.clipboard_error.is_none());
        assert_eq!(outcome.resolution, Resolution::new(40, 30));
        assert!(outcome.path.starts_with(root.path().join("screenshots")));
        assert_eq!(outcome.path.extension().and_then(|e| e.to_str()), Some("png"));

        let saved = image::open(&outcome.path).unwrap();
        assert_eq!((saved.width(), saved.height()), (40, 30));
        assert_eq!(clipboard.images, vec![(40, 30, PixelLayout::Rgba)]);
    }

    #[test]
    fn clipboard_failure_keeps_the_file() {
        let root = tempfile::tempdir().unwrap();
        let mut source = FakeDisplay::single(8, 8);
        let display = source.display(1);
        let mut clipboard = RecordingClipboard { fail: true, ..Default::default() };

        let outcome = take_screenshot(&mut source, &display, root.path(), &mut clipboard).unwrap();

        assert!(matches!(outcome.clipboard_error, Some(RecorderError::Clipboard { .. })));
        assert!(outcome.path.is_file());
    }

    #[test]
    fn lost_display_saves_nothing() {
        let root = tempfile::tempdir().unwrap();
        let mut source = FakeDisplay::single(8, 8).disconnecting_at(0);
        let display = source.display(1);

        let err = take_screenshot(&mut source, &display, root.path(), &mut RecordingClipboard::default())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RecorderError>(),
            Some(RecorderError::CaptureUnavailable { .. })
        ));
        assert!(!root.path().join("screenshots").exists());
    }
}
