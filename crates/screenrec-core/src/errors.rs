use thiserror::Error;

use crate::types::Codec;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Capture unavailable on display {display}: {reason}")]
    CaptureUnavailable { display: usize, reason: String },

    #[error("Unsupported pixel layout: {reason}")]
    UnsupportedLayout { reason: String },

    #[error("No encoder could be opened (tried {})", format_attempts(.attempts))]
    EncoderExhausted { attempts: Vec<EncoderAttempt> },

    #[error("Encoder rejected frame: {reason}")]
    EncodeWriteFailed { reason: String },

    #[error("Configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    #[error("Clipboard error: {reason}")]
    Clipboard { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecorderError {
    /// Pipeline stage the error belongs to, for operator-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::CaptureUnavailable { .. }   => "capture",
            Self::UnsupportedLayout { .. }    => "color conversion",
            Self::EncoderExhausted { .. }     => "encoder setup",
            Self::EncodeWriteFailed { .. }    => "encoding",
            Self::ConfigurationInvalid { .. } => "configuration",
            Self::Clipboard { .. }            => "clipboard",
            Self::Io(_)                       => "file system",
        }
    }
}

/// Why one encoder candidate could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderAttempt {
    pub codec:  Codec,
    pub reason: String,
}

fn format_attempts(attempts: &[EncoderAttempt]) -> String {
    if attempts.is_empty() {
        return "no candidates".to_owned();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.codec, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}
