//! screenrec-recorder — recording sessions, screenshots and the console menu.
//!
//! | Module       | Role |
//! |--------------|------|
//! | `session`    | capture → convert → encode → preview loop with guaranteed teardown |
//! | `encoder`    | MPEG-4 → MJPEG → I420 fallback into Matroska (GStreamer) |
//! | `preview`    | downscaled live preview window, quit-key interrupt |
//! | `cancel`     | polled stop sources (Esc key via evdev, stop flag) |
//! | `screenshot` | single-frame PNG + clipboard copy |
//! | `storage`    | output folders, timestamped names, folder clean-up |
//! | `menu`       | interactive prompts |

pub mod cancel;
pub mod encoder;
pub mod menu;
pub mod preview;
pub mod screenshot;
pub mod session;
pub mod storage;

#[cfg(test)]
mod testing;
