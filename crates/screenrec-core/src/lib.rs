pub mod config;
pub mod convert;
pub mod errors;
pub mod types;

pub use config::{frame_interval, RecorderConfig};
pub use convert::convert;
pub use errors::{EncoderAttempt, RecorderError};
pub use types::*;
