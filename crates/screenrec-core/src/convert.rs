//! Pixel layout conversion between packed RGB-family layouts.
//!
//! Capture backends hand out 4-channel buffers (RGBA from xcap, BGRx from
//! most compositors); the encoders are fed 3-channel BGR. Conversion is a
//! per-pixel channel shuffle, so it is exact and deterministic.

use crate::errors::RecorderError;
use crate::types::{FrameBuffer, PixelLayout};

/// Fill value for the fourth channel when widening a 3-channel buffer.
const OPAQUE: u8 = 0xFF;

/// Convert `frame` into `target` layout, returning a new buffer.
///
/// Converting to the frame's own layout returns a cheap clone.
pub fn convert(frame: &FrameBuffer, target: PixelLayout) -> Result<FrameBuffer, RecorderError> {
    if !frame.is_well_formed() {
        return Err(RecorderError::UnsupportedLayout {
            reason: format!(
                "{} buffer of {} bytes does not match {}x{}",
                frame.layout,
                frame.data.len(),
                frame.width,
                frame.height
            ),
        });
    }
    if frame.layout == target {
        return Ok(frame.clone());
    }

    let src_bpp = frame.layout.bytes_per_pixel();
    let dst_bpp = target.bytes_per_pixel();
    let [sr, sg, sb] = frame.layout.rgb_offsets();
    let [dr, dg, db] = target.rgb_offsets();
    let keep_fourth = frame.layout.has_fourth_channel() && target.has_fourth_channel();

    let pixels = frame.width as usize * frame.height as usize;
    let mut out = vec![0u8; pixels * dst_bpp];

    for (src, dst) in frame.data.chunks_exact(src_bpp).zip(out.chunks_exact_mut(dst_bpp)) {
        dst[dr] = src[sr];
        dst[dg] = src[sg];
        dst[db] = src[sb];
        if dst_bpp == 4 {
            dst[3] = if keep_fourth { src[3] } else { OPAQUE };
        }
    }

    Ok(FrameBuffer::new(out, frame.width, frame.height, target))
}
