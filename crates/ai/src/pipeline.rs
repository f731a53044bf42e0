//! Raw upload bytes in, caption out.

use crate::error::{CaptionError, CaptionResult};
use crate::traits::{Caption, ImageCaption};
use image::{ImageFormat, RgbImage};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CaptionOutput {
    pub caption: Caption,
    /// The decoded upload, coerced to rgb8.
    pub image: RgbImage,
    pub processing_time_ms: u64,
}

/// Decode JPEG or PNG bytes into an rgb8 image.
///
/// The format is detected from the content, a text file named `.png` is
/// rejected here. Grayscale, alpha and 16 bit images are converted.
pub fn decode_image(bytes: &[u8]) -> CaptionResult<RgbImage> {
    let format = image::guess_format(bytes)?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(CaptionError::UnsupportedFormat(format!("{:?}", format)));
    }

    let image = image::load_from_memory_with_format(bytes, format)?;
    debug!(
        "decoded {:?} image {}x{} ({:?})",
        format,
        image.width(),
        image.height(),
        image.color()
    );

    Ok(image.to_rgb8())
}

/// Caption one uploaded image with the given session.
///
/// Blocks until generation is done.
pub fn generate_caption<M>(image_bytes: &[u8], session: &M) -> CaptionResult<CaptionOutput>
where
    M: ImageCaption + ?Sized,
{
    let start = Instant::now();

    let image = decode_image(image_bytes)?;
    let caption = session.caption(&image)?;

    // models are allowed to return anything, the caller is promised a non-empty caption
    if caption.text.trim().is_empty() {
        return Err(CaptionError::EmptyCaption);
    }

    let processing_time_ms = start.elapsed().as_millis() as u64;
    info!(
        "captioned {}x{} image in {}ms: {:?}",
        image.width(),
        image.height(),
        processing_time_ms,
        caption.text
    );

    Ok(CaptionOutput {
        caption,
        image,
        processing_time_ms,
    })
}
