use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::RecorderError;

// MARK: - Resolution

/// Width × height of a display or frame, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// MARK: - DisplayDescriptor

/// One capturable display, as enumerated by a display source.
///
/// Descriptors are query-time snapshots: they are never persisted and a
/// recording session keeps the one it started with for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDescriptor {
    /// 1-based position in the enumeration order.
    pub index:  usize,
    pub name:   String,
    pub x:      i32,
    pub y:      i32,
    pub width:  u32,
    pub height: u32,
}

impl DisplayDescriptor {
    pub fn new(index: usize, name: impl Into<String>, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { index, name: name.into(), x, y, width, height }
    }

    /// The primary display is the one anchored at the desktop origin.
    pub fn is_primary(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

impl std::fmt::Display for DisplayDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Monitor {} - Resolution: {}", self.index, self.resolution())?;
        if self.is_primary() {
            write!(f, " [Primary Monitor]")?;
        }
        Ok(())
    }
}

// MARK: - PixelLayout

/// Channel order of a packed pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    /// Red, Green, Blue, Alpha.
    Rgba,
    /// Blue, Green, Red, Alpha.
    Bgra,
    /// Red, Green, Blue, padding.
    Rgbx,
    /// Blue, Green, Red, padding.
    Bgrx,
    Rgb,
    Bgr,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba | Self::Bgra | Self::Rgbx | Self::Bgrx => 4,
            Self::Rgb | Self::Bgr => 3,
        }
    }

    /// Byte offsets of the red, green and blue channels within one pixel.
    pub(crate) fn rgb_offsets(self) -> [usize; 3] {
        match self {
            Self::Rgba | Self::Rgbx | Self::Rgb => [0, 1, 2],
            Self::Bgra | Self::Bgrx | Self::Bgr => [2, 1, 0],
        }
    }

    pub fn has_fourth_channel(self) -> bool {
        self.bytes_per_pixel() == 4
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rgba => "RGBA",
            Self::Bgra => "BGRA",
            Self::Rgbx => "RGBx",
            Self::Bgrx => "BGRx",
            Self::Rgb  => "RGB",
            Self::Bgr  => "BGR",
        }
    }
}

impl std::fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelLayout {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgba" => Ok(Self::Rgba),
            "bgra" => Ok(Self::Bgra),
            "rgbx" => Ok(Self::Rgbx),
            "bgrx" => Ok(Self::Bgrx),
            "rgb"  => Ok(Self::Rgb),
            "bgr"  => Ok(Self::Bgr),
            _ => Err(RecorderError::UnsupportedLayout {
                reason: format!("unknown pixel layout '{s}'"),
            }),
        }
    }
}

// MARK: - FrameBuffer

/// One captured raster image, tightly packed (no row padding).
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub data:   Bytes,
    pub width:  u32,
    pub height: u32,
    pub layout: PixelLayout,
}

impl FrameBuffer {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, layout: PixelLayout) -> Self {
        Self { data: data.into(), width, height, layout }
    }

    /// Byte length a buffer of this geometry and layout must have.
    pub fn expected_len(width: u32, height: u32, layout: PixelLayout) -> usize {
        width as usize * height as usize * layout.bytes_per_pixel()
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }

    pub fn is_well_formed(&self) -> bool {
        self.data.len() == Self::expected_len(self.width, self.height, self.layout)
    }
}

// MARK: - Codec

/// Video payload codecs the recorder knows how to write into Matroska.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// MPEG-4 Part 2 (XVID-compatible).
    Mpeg4,
    /// Motion JPEG.
    Mjpeg,
    /// Uncompressed planar YUV 4:2:0.
    RawI420,
}

impl Codec {
    /// The FourCC the codec is conventionally known by.
    pub fn fourcc(self) -> &'static str {
        match self {
            Self::Mpeg4   => "XVID",
            Self::Mjpeg   => "MJPG",
            Self::RawI420 => "I420",
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.fourcc())
    }
}

// MARK: - EncoderCandidate

/// One entry of the encoder fallback chain. Lower `priority` is tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncoderCandidate {
    pub priority: u8,
    pub codec:    Codec,
}

/// Fallback chain used for every recording, in the order it is tried.
/// Uncompressed I420 is the terminal fallback.
pub const ENCODER_CANDIDATES: [EncoderCandidate; 3] = [
    EncoderCandidate { priority: 1, codec: Codec::Mpeg4 },
    EncoderCandidate { priority: 2, codec: Codec::Mjpeg },
    EncoderCandidate { priority: 3, codec: Codec::RawI420 },
];

/// Layout every encoder backend is fed with.
pub const ENCODER_INPUT_LAYOUT: PixelLayout = PixelLayout::Bgr;
