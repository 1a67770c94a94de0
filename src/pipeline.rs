use std::{path::Path, sync::Arc};

use fast_image_resize as fr;
use image::{ExtendedColorType, ImageEncoder, RgbImage, codecs::jpeg::JpegEncoder};
use log::debug;
use strum_macros::{Display, EnumString};

use crate::{decoder::BitmapDecoder, error::DecodeError, video::VideoFrameExtractor};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A compressed thumbnail and the size it was encoded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Largest sample size that still decodes at least `scale` of the source.
/// Up to 8 it is a power of two, past that a multiple of 8.
pub fn compute_sample_size_larger(scale: f32) -> u32 {
    let initial_size = (1.0 / scale).floor();
    if initial_size.is_nan() || initial_size <= 1.0 {
        return 1;
    }

    let initial_size = initial_size as u32;
    if initial_size <= 8 {
        prev_power_of_two(initial_size)
    } else {
        initial_size / 8 * 8
    }
}

fn prev_power_of_two(n: u32) -> u32 {
    debug_assert!(n > 0);
    1 << (u32::BITS - 1 - n.leading_zeros())
}

pub(crate) fn resize_exact(
    bitmap: RgbImage,
    width: u32,
    height: u32,
    algorithm: fr::ResizeAlg,
) -> Result<RgbImage, DecodeError> {
    let (src_width, src_height) = bitmap.dimensions();
    let src_image = fr::images::Image::from_vec_u8(
        src_width,
        src_height,
        bitmap.into_raw(),
        fr::PixelType::U8x3,
    )?;
    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer.resize(
        &src_image,
        &mut dst_image,
        &fr::ResizeOptions::new().resize_alg(algorithm),
    )?;
    // The source buffer goes away here, only the resized copy survives.
    drop(src_image);

    RgbImage::from_raw(width, height, dst_image.into_vec())
        .ok_or(DecodeError::Empty { width, height })
}

/// Smooth scaling to `round(side * scale)` on both axes.
pub fn resize_by_scale(bitmap: RgbImage, scale: f32) -> Result<RgbImage, DecodeError> {
    let width = ((bitmap.width() as f32 * scale).round() as u32).max(1);
    let height = ((bitmap.height() as f32 * scale).round() as u32).max(1);
    if width == bitmap.width() && height == bitmap.height() {
        return Ok(bitmap);
    }
    debug!(
        "Resizing {}x{} to {}x{} (scale {})",
        bitmap.width(),
        bitmap.height(),
        width,
        height,
        scale
    );
    resize_exact(
        bitmap,
        width,
        height,
        fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
    )
}

/// Fits the bitmap inside a `max_length` square. Never upscales.
///
/// The scale is the smaller of the two side ratios, so the larger side lands
/// on `max_length`. Taking the larger ratio, as older versions of this cache
/// did, sizes the smaller side instead and overflows the square.
pub fn resize_down_by_side_length(
    bitmap: RgbImage,
    max_length: u32,
) -> Result<RgbImage, DecodeError> {
    let scale = f32::min(
        max_length as f32 / bitmap.width() as f32,
        max_length as f32 / bitmap.height() as f32,
    );
    if scale >= 1.0 {
        return Ok(bitmap);
    }
    resize_by_scale(bitmap, scale)
}

pub fn compress_to_bytes(bitmap: &RgbImage) -> Result<Vec<u8>, DecodeError> {
    compress_to_bytes_with_quality(bitmap, DEFAULT_JPEG_QUALITY)
}

fn compress_to_bytes_with_quality(bitmap: &RgbImage, quality: u8) -> Result<Vec<u8>, DecodeError> {
    let mut result = Vec::new();
    JpegEncoder::new_with_quality(&mut result, quality).write_image(
        bitmap.as_raw(),
        bitmap.width(),
        bitmap.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(result)
}

pub struct ThumbnailPipeline {
    decoder: Arc<dyn BitmapDecoder>,
    video: VideoFrameExtractor,
}

impl ThumbnailPipeline {
    pub fn new(decoder: Arc<dyn BitmapDecoder>, video: VideoFrameExtractor) -> Self {
        Self { decoder, video }
    }

    /// Decodes at the coarsest sample size that keeps the longer side at or
    /// above `target_size`. The result still needs an exact resize.
    pub fn decode_thumbnail(&self, path: &Path, target_size: u32) -> Result<RgbImage, DecodeError> {
        let (width, height) = self.decoder.decode_bounds(path)?;
        let scale = target_size as f32 / width.max(height) as f32;
        let sample_size = compute_sample_size_larger(scale);
        debug!(
            "Decoding {} ({}x{}) with sample size {}",
            path.display(),
            width,
            height,
            sample_size
        );
        self.decoder.decode_sampled(path, sample_size)
    }

    pub fn create_thumbnail(
        &self,
        path: &Path,
        target_size: u32,
        kind: MediaKind,
    ) -> Result<Thumbnail, DecodeError> {
        let bitmap = match kind {
            MediaKind::Image => self.decode_thumbnail(path, target_size)?,
            MediaKind::Video => self.video.extract(path)?,
        };
        let bitmap = resize_down_by_side_length(bitmap, target_size)?;
        Ok(Thumbnail {
            width: bitmap.width(),
            height: bitmap.height(),
            data: compress_to_bytes(&bitmap)?,
        })
    }
}
