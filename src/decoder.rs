use std::{fs::File, io::BufReader, path::Path};

use fast_image_resize as fr;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, RgbImage};
use jpeg_decoder::PixelFormat;
use log::debug;

use crate::{error::DecodeError, pipeline::resize_exact};

/// Smallest reduction the JPEG DCT can apply while decoding.
const MAX_DCT_SAMPLE_SIZE: u32 = 8;

/// Source of pixel data for the pipeline.
pub trait BitmapDecoder: Send + Sync {
    /// Width and height only, without decoding pixels.
    fn decode_bounds(&self, path: &Path) -> Result<(u32, u32), DecodeError>;

    /// Decodes pixels reduced by an integer `sample_size` on each side.
    fn decode_sampled(&self, path: &Path, sample_size: u32) -> Result<RgbImage, DecodeError>;

    fn decode_bytes(&self, data: &[u8]) -> Result<RgbImage, DecodeError>;
}

/// Decoder backed by `imagesize` for bounds and `image` for pixels.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl BitmapDecoder for ImageCrateDecoder {
    fn decode_bounds(&self, path: &Path) -> Result<(u32, u32), DecodeError> {
        let size = imagesize::size(path)?;
        let (width, height) = (size.width as u32, size.height as u32);
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty { width, height });
        }
        Ok((width, height))
    }

    fn decode_sampled(&self, path: &Path, sample_size: u32) -> Result<RgbImage, DecodeError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        if sample_size > 1 && reader.format() == Some(ImageFormat::Jpeg) {
            match decode_jpeg_scaled(path, sample_size) {
                Ok(bitmap) => return Ok(bitmap),
                Err(e) => debug!(
                    "Scaled decode of {} failed, decoding in full: {}",
                    path.display(),
                    e
                ),
            }
        }

        let bitmap = reader.decode()?.to_rgb8();
        subsample(bitmap, sample_size)
    }

    fn decode_bytes(&self, data: &[u8]) -> Result<RgbImage, DecodeError> {
        let bitmap = image::load_from_memory(data)?.to_rgb8();
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(DecodeError::Empty {
                width: bitmap.width(),
                height: bitmap.height(),
            });
        }
        Ok(bitmap)
    }
}

/// Decodes a JPEG at 1/2, 1/4 or 1/8 scale in the DCT, so the full-resolution
/// pixels are never materialized. Sample sizes past 8 finish with a
/// nearest-neighbour pass over the 1/8 image.
fn decode_jpeg_scaled(path: &Path, sample_size: u32) -> Result<RgbImage, DecodeError> {
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(File::open(path)?));
    decoder.read_info()?;
    let info = decoder
        .info()
        .ok_or(DecodeError::Empty { width: 0, height: 0 })?;
    let (width, height) = (u32::from(info.width), u32::from(info.height));
    if width == 0 || height == 0 {
        return Err(DecodeError::Empty { width, height });
    }

    let dct_sample_size = sample_size.min(MAX_DCT_SAMPLE_SIZE);
    let requested = |side: u32| side.div_ceil(dct_sample_size).min(u16::MAX as u32) as u16;
    decoder.scale(requested(width), requested(height))?;
    let pixels = decoder.decode()?;

    let info = decoder
        .info()
        .ok_or(DecodeError::Empty { width, height })?;
    let (scaled_width, scaled_height) = (u32::from(info.width), u32::from(info.height));
    let bitmap = match info.pixel_format {
        PixelFormat::RGB24 => RgbImage::from_raw(scaled_width, scaled_height, pixels),
        PixelFormat::L8 => GrayImage::from_raw(scaled_width, scaled_height, pixels)
            .map(|gray| DynamicImage::ImageLuma8(gray).to_rgb8()),
        other => return Err(DecodeError::UnsupportedPixelFormat(format!("{:?}", other))),
    }
    .ok_or(DecodeError::Empty {
        width: scaled_width,
        height: scaled_height,
    })?;
    debug!(
        "Decoded {} at {}x{} from {}x{}",
        path.display(),
        scaled_width,
        scaled_height,
        width,
        height
    );

    reduce_to(
        bitmap,
        width.div_ceil(sample_size),
        height.div_ceil(sample_size),
    )
}

/// Integer reduction, rounding up so a side never drops below `side / sample_size`.
fn subsample(bitmap: RgbImage, sample_size: u32) -> Result<RgbImage, DecodeError> {
    if bitmap.width() == 0 || bitmap.height() == 0 {
        return Err(DecodeError::Empty {
            width: bitmap.width(),
            height: bitmap.height(),
        });
    }
    if sample_size <= 1 {
        return Ok(bitmap);
    }

    let width = bitmap.width().div_ceil(sample_size);
    let height = bitmap.height().div_ceil(sample_size);
    reduce_to(bitmap, width, height)
}

fn reduce_to(bitmap: RgbImage, width: u32, height: u32) -> Result<RgbImage, DecodeError> {
    if bitmap.dimensions() == (width, height) {
        return Ok(bitmap);
    }
    resize_exact(bitmap, width, height, fr::ResizeAlg::Nearest)
}
