//! Frame encoding for HTTP transport.
//!
//! Snapshots travel as base64 PNG, full episodes as a base64 looping GIF.
//! Callers bound the GIF length with [`GIF_MAX_FRAMES`] before encoding;
//! this module only converts what it is handed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::png::PngEncoder;
use image::error::{ParameterError, ParameterErrorKind};
use image::{ColorType, Delay, ImageEncoder, ImageError, ImageResult, RgbaImage};
use rollout::Frame;

/// Upper bound on frames in an episode GIF.
pub const GIF_MAX_FRAMES: usize = 120;
/// Display time per GIF frame in milliseconds.
pub const GIF_FRAME_DELAY_MS: u32 = 60;

/// Encodes one frame as a base64 PNG string.
pub fn png_base64(frame: &Frame) -> ImageResult<String> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        &frame.data,
        frame.width,
        frame.height,
        ColorType::Rgb8,
    )?;
    Ok(STANDARD.encode(bytes))
}

/// Encodes frames as a base64 infinite-loop GIF, `None` when there is
/// nothing to animate.
pub fn gif_base64(frames: &[&Frame]) -> ImageResult<Option<String>> {
    if frames.is_empty() {
        return Ok(None);
    }
    let mut bytes = Vec::new();
    {
        // Speed 10 keeps quantization cheap; episode GIFs run to 120 frames.
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, 10);
        encoder.set_repeat(Repeat::Infinite)?;
        for frame in frames {
            let delay = Delay::from_numer_denom_ms(GIF_FRAME_DELAY_MS, 1);
            encoder.encode_frame(image::Frame::from_parts(rgba_image(frame)?, 0, 0, delay))?;
        }
    }
    Ok(Some(STANDARD.encode(bytes)))
}

/// The GIF encoder wants RGBA; frames are tightly packed RGB.
fn rgba_image(frame: &Frame) -> ImageResult<RgbaImage> {
    let mut rgba = Vec::with_capacity(frame.data.len() / 3 * 4);
    for px in frame.data.chunks_exact(3) {
        rgba.extend_from_slice(&[px[0], px[1], px[2], 0xFF]);
    }
    RgbaImage::from_raw(frame.width, frame.height, rgba).ok_or_else(|| {
        ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        ))
    })
}
