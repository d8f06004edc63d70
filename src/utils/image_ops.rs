use base64::{engine::general_purpose, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;

/// Crop a sub-region out of `img` and encode it as a standalone JPEG.
///
/// The crop is taken with `crop_imm` so the source image is untouched; the
/// returned bytes are a fully independent payload.
pub fn crop_and_encode_jpeg(
    img: &DynamicImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let cropped = img.crop_imm(x, y, width, height);
    // JPEG has no alpha channel; flatten before encoding.
    let rgb = cropped.to_rgb8();
    let mut jpeg_bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut jpeg_bytes), quality);
    rgb.write_with_encoder(encoder)?;
    Ok(jpeg_bytes)
}

/// Format JPEG bytes as a `data:` URL for downstream consumers.
pub fn jpeg_data_url(jpeg_bytes: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(jpeg_bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_crop_and_encode_jpeg() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([200, 30, 30])));

        let jpeg = crop_and_encode_jpeg(&img, 10, 10, 50, 40, 90).unwrap();
        assert!(!jpeg.is_empty());
        // JPEG SOI marker.
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 50);
        assert_eq!(decoded.height(), 40);
    }

    #[test]
    fn test_jpeg_data_url_prefix() {
        let url = jpeg_data_url(&[0xFF, 0xD8, 0xFF, 0xE0]);
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }
}
