//! Image decoding and RGBA conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an
//! upright [`DynamicImage`]. EXIF orientation is applied here so the
//! torso band and skin box are computed on the image as the viewer
//! sees it, not as the sensor stored it.
//!
//! This is the first step in the pipeline: raw bytes in, image out.

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageReader, RgbaImage};

use crate::types::PipelineError;

/// Decode raw image bytes and apply the EXIF orientation, if any.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded image"]
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Convert a decoded image to 8-bit RGBA.
///
/// Images without an alpha channel become fully opaque, which the
/// mask builder reads as whole-frame foreground.
#[must_use]
pub fn to_rgba(image: &DynamicImage) -> RgbaImage {
    image.to_rgba8()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode an RGBA image as a PNG byte buffer.
    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn truncated_png_header_returns_image_decode_error() {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H']);
        let result = decode(&bytes);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!(decoded.width(), 17);
        assert_eq!(decoded.height(), 31);
    }

    #[test]
    fn alpha_channel_survives_decode() {
        let img = RgbaImage::from_fn(4, 4, |x, _| {
            image::Rgba([10, 20, 30, if x < 2 { 0 } else { 255 }])
        });
        let rgba = to_rgba(&decode(&encode_png(&img)).unwrap());
        assert_eq!(rgba.get_pixel(0, 0).0[3], 0);
        assert_eq!(rgba.get_pixel(3, 0).0[3], 255);
    }

    #[test]
    fn opaque_rgb_becomes_fully_opaque_rgba() {
        let rgb = image::RgbImage::from_pixel(3, 3, image::Rgb([200, 100, 50]));
        let rgba = to_rgba(&DynamicImage::ImageRgb8(rgb));
        assert!(rgba.pixels().all(|p| p.0 == [200, 100, 50, 255]));
    }
}
