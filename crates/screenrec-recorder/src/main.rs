//! screenrec — record a display to a Matroska file or grab a screenshot.
//!
//! ```text
//! menu ─┬─ 1 screenshot ─► XcapSource ─► PNG + clipboard
//!       ├─ 2 record     ─► Recorder (xcap → BGR → GStreamer MKV, preview)
//!       ├─ 3/4 clean    ─► screenshots/ or videos/
//!       └─ 5 exit
//! ```
//!
//! Configuration is read from the JSON file named by `SCREENREC_CONFIG`
//! (defaults otherwise). Log verbosity follows `RUST_LOG`.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use screenrec_capture::{DisplaySource, XcapSource};
use screenrec_core::RecorderConfig;
use screenrec_recorder::cancel::StopKey;
use screenrec_recorder::encoder::GstEncoderBackend;
use screenrec_recorder::menu::{MenuChoice, Prompter};
use screenrec_recorder::preview::{GstPreview, NoPreview};
use screenrec_recorder::screenshot::{take_screenshot, SystemClipboard};
use screenrec_recorder::session::{Recorder, StartRequest, StopReason};
use screenrec_recorder::storage::{ensure_output_directory, new_output_path, OutputKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("screenrec v{}", env!("CARGO_PKG_VERSION"));

    let config = RecorderConfig::from_env().context("Loading configuration")?;
    let root = config.resolved_output_root().context("Resolving output root")?;
    for kind in OutputKind::ALL {
        ensure_output_directory(&root, kind)
            .with_context(|| format!("Creating {} folder", kind.dir_name()))?;
    }
    info!("Output root: {}", root.display());

    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
    prompter.say("Welcome to Screen Recorder!")?;

    loop {
        match prompter.choose_action()? {
            MenuChoice::Screenshot => {
                if let Err(e) = screenshot(&mut prompter, &root) {
                    error!("Screenshot failed: {e:#}");
                }
            }
            MenuChoice::Record => {
                if let Err(e) = record(&mut prompter, &config, &root) {
                    error!("Recording failed: {e:#}");
                }
            }
            MenuChoice::Clean(kind) => {
                prompter.clean_folder(&root, kind)?;
            }
            MenuChoice::Exit => break,
        }
    }

    info!("screenrec exiting");
    Ok(())
}

fn screenshot<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>, root: &Path) -> Result<()> {
    let mut source = XcapSource::new();
    let displays = source.list_displays()?;
    let Some(display) = prompter.choose_display(&displays)? else {
        return Ok(());
    };

    let outcome = take_screenshot(&mut source, &display, root, &mut SystemClipboard)?;
    match &outcome.clipboard_error {
        None => prompter.say("Screenshot copied to clipboard")?,
        Some(e) => prompter.say(format!("Failed to copy to clipboard: {e}"))?,
    }
    prompter.say(format!("Screenshot saved to: {}", outcome.path.display()))?;
    Ok(())
}

fn record<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    config: &RecorderConfig,
    root: &Path,
) -> Result<()> {
    let backend = GstEncoderBackend::new()?;
    let mut recorder =
        Recorder::new(XcapSource::new(), backend, StopKey::escape()).with_pacing(config.pace_frames);

    let displays = recorder.source_mut().list_displays()?;
    let Some(display) = prompter.choose_display(&displays)? else {
        return Ok(());
    };
    let request = StartRequest {
        display,
        output_path: new_output_path(root, OutputKind::Videos),
        frame_rate: config.frame_rate,
    };

    prompter.say(format!(
        "Recording started... Press 'Esc' to stop{}",
        if config.preview_enabled {
            format!(" (or '{}' in the preview window)", config.preview_quit_key)
        } else {
            String::new()
        }
    ))?;

    let result = if config.preview_enabled {
        let preview = GstPreview::new(config.preview_max_width, config.preview_quit_key.clone());
        recorder.record(&request, preview)
    } else {
        recorder.record(&request, NoPreview)
    };

    match result {
        Ok(report) => match &report.stop_reason {
            StopReason::Failed(e) => {
                prompter.say(format!("Recording stopped during {}: {}", e.stage(), e))?;
                prompter.say(format!(
                    "Incomplete file ({} frames): {}",
                    report.frames_written,
                    report.path.display()
                ))?;
            }
            _ => {
                prompter.say(format!(
                    "Recording saved to: {} ({} frames, {} {})",
                    report.path.display(),
                    report.frames_written,
                    report.codec,
                    report.resolution
                ))?;
            }
        },
        Err(e) => {
            prompter.say("All encoders failed, cannot record video")?;
            prompter.say(e.to_string())?;
        }
    }
    Ok(())
}
