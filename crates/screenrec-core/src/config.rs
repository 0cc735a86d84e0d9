use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::RecorderError;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV: &str = "SCREENREC_CONFIG";

/// Time budget for one capture iteration at `frame_rate`.
///
/// Rejects rates that are not finite and positive, or so small that the
/// period does not fit in a `Duration`.
pub fn frame_interval(frame_rate: f64) -> Result<Duration, RecorderError> {
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return Err(RecorderError::ConfigurationInvalid {
            reason: format!("frame_rate must be positive, got {frame_rate}"),
        });
    }
    Duration::try_from_secs_f64(1.0 / frame_rate).map_err(|e| RecorderError::ConfigurationInvalid {
        reason: format!("frame_rate {frame_rate} has no usable frame period: {e}"),
    })
}

/// Recorder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory holding `screenshots/` and `videos/`. Relative paths are
    /// resolved against the working directory.
    #[serde(alias = "outputRoot")]
    pub output_root: PathBuf,
    #[serde(alias = "frameRate")]
    pub frame_rate: f64,
    #[serde(alias = "previewEnabled")]
    pub preview_enabled: bool,
    #[serde(alias = "previewMaxWidth")]
    pub preview_max_width: u32,
    /// Key that stops the recording from inside the preview window.
    #[serde(alias = "previewQuitKey")]
    pub preview_quit_key: String,
    /// Sleep out the remainder of each frame period.
    #[serde(alias = "paceFrames")]
    pub pace_frames: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            frame_rate: 30.0,
            preview_enabled: true,
            preview_max_width: 800,
            preview_quit_key: "q".to_owned(),
            pace_frames: true,
        }
    }
}

impl RecorderConfig {
    /// Load from the file named by `SCREENREC_CONFIG`, or defaults when unset.
    pub fn from_env() -> Result<Self, RecorderError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, RecorderError> {
        let text = std::fs::read_to_string(path)?;
        let cfg = Self::from_json(&text)?;
        debug!("Loaded config from {}", path.display());
        Ok(cfg)
    }

    pub fn from_json(text: &str) -> Result<Self, RecorderError> {
        let cfg: Self = serde_json::from_str(text).map_err(|e| RecorderError::ConfigurationInvalid {
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        frame_interval(self.frame_rate)?;
        if self.preview_max_width == 0 {
            return Err(RecorderError::ConfigurationInvalid {
                reason: "preview_max_width must be at least 1".to_owned(),
            });
        }
        if self.preview_quit_key.is_empty() {
            return Err(RecorderError::ConfigurationInvalid {
                reason: "preview_quit_key must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    /// `output_root` made absolute against the current working directory.
    pub fn resolved_output_root(&self) -> Result<PathBuf, RecorderError> {
        if self.output_root.is_absolute() {
            return Ok(self.output_root.clone());
        }
        Ok(std::env::current_dir()?.join(&self.output_root))
    }
}
