//! Thumbnail derivation for full-page screenshots

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::utils::{JPEG_QUALITY, THUMBNAIL_WIDTH};

/// Scale a full-resolution JPEG down to `THUMBNAIL_WIDTH`, keeping its aspect ratio
///
/// Images already narrower than the thumbnail width are re-encoded unscaled.
pub fn thumbnail_jpeg(full_jpeg: &[u8]) -> Result<Vec<u8>> {
    let image = image::load_from_memory(full_jpeg).context("Failed to decode screenshot")?;

    let scaled = if image.width() > THUMBNAIL_WIDTH {
        let height = (u64::from(image.height()) * u64::from(THUMBNAIL_WIDTH)
            / u64::from(image.width()))
        .max(1);
        let height = u32::try_from(height).unwrap_or(u32::MAX);
        image.resize_exact(THUMBNAIL_WIDTH, height, FilterType::Lanczos3)
    } else {
        image
    };

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&scaled.to_rgb8())
        .context("Failed to encode thumbnail")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Jpeg).expect("encode");
        out.into_inner()
    }

    #[test]
    fn wide_screenshot_is_scaled_to_thumbnail_width() {
        let thumb = thumbnail_jpeg(&jpeg(1200, 3000)).expect("thumbnail");
        let decoded = image::load_from_memory(&thumb).expect("decode");
        assert_eq!(decoded.width(), 300);
        assert_eq!(decoded.height(), 750);
    }

    #[test]
    fn narrow_screenshot_keeps_its_size() {
        let thumb = thumbnail_jpeg(&jpeg(120, 80)).expect("thumbnail");
        let decoded = image::load_from_memory(&thumb).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(thumbnail_jpeg(b"not an image").is_err());
    }
}
