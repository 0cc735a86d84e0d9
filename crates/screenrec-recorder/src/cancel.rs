//! Stop-request sources polled once per capture iteration.
//!
//! # Sources
//!
//! - [`StopKey`] — global keyboard state (Esc by default) read through evdev.
//!   Works regardless of which window has focus.
//! - [`StopFlag`] — shared atomic flag for programmatic `stop()` requests.
//!
//! # Requirements (StopKey)
//!
//! The process needs read access to `/dev/input/event*`:
//! ```text
//! sudo usermod -aG input $USER
//! ```
//! Without it the stop key is unavailable and only the preview window's
//! quit key stops a recording.

#![cfg_attr(not(target_os = "linux"), allow(dead_code, unused_imports))]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

/// A polled stop condition.
pub trait CancellationSource {
    /// Non-blocking; may be called once per frame.
    fn is_requested(&self) -> bool;
}

// ── StopFlag ──────────────────────────────────────────────────────────────────

/// Cloneable stop flag. All clones share one state.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop at the next poll.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl CancellationSource for StopFlag {
    fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ── StopKey ───────────────────────────────────────────────────────────────────

/// Global stop key backed by the kernel's per-device key state.
pub struct StopKey {
    #[cfg(target_os = "linux")]
    inner: linux::KeyStatePoller,
}

impl StopKey {
    /// Watch the Esc key on every keyboard the process can open.
    pub fn escape() -> Self {
        #[cfg(target_os = "linux")]
        {
            let inner = linux::KeyStatePoller::open(evdev::Key::KEY_ESC);
            if inner.device_count() == 0 {
                warn!(
                    "No readable keyboard devices — Esc stop key disabled. \
                     Add your user to the 'input' group to enable it."
                );
            } else {
                info!("Stop key armed on {} keyboard device(s)", inner.device_count());
            }
            Self { inner }
        }
        #[cfg(not(target_os = "linux"))]
        {
            warn!("StopKey — global key state not supported on this platform");
            Self {}
        }
    }
}

impl CancellationSource for StopKey {
    fn is_requested(&self) -> bool {
        #[cfg(target_os = "linux")]
        return self.inner.is_pressed();
        #[cfg(not(target_os = "linux"))]
        false
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use evdev::{Device, Key};
    use tracing::debug;

    pub(super) struct KeyStatePoller {
        key:     Key,
        devices: Vec<Device>,
    }

    impl KeyStatePoller {
        /// Open every input device that can report `key`.
        pub(super) fn open(key: Key) -> Self {
            let devices: Vec<Device> = evdev::enumerate()
                .filter_map(|(path, device)| {
                    let supports = device
                        .supported_keys()
                        .map_or(false, |keys| keys.contains(key));
                    if supports {
                        debug!(
                            "Watching {} ({}) for {:?}",
                            path.display(),
                            device.name().unwrap_or("unnamed"),
                            key
                        );
                        Some(device)
                    } else {
                        None
                    }
                })
                .collect();
            Self { key, devices }
        }

        pub(super) fn device_count(&self) -> usize {
            self.devices.len()
        }

        /// Query current key state on each device (EVIOCGKEY, no event read).
        pub(super) fn is_pressed(&self) -> bool {
            self.devices.iter().any(|device| match device.get_key_state() {
                Ok(state) => state.contains(self.key),
                Err(e) => {
                    debug!("get_key_state on {}: {}", device.name().unwrap_or("unnamed"), e);
                    false
                }
            })
        }
    }
}
