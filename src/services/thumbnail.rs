//! JPEG thumbnails for uploaded images.

use crate::errors::CatalogueResult;
use image::{DynamicImage, GenericImageView, codecs::jpeg::JpegEncoder};

pub const THUMBNAIL_MAX_WIDTH: u32 = 400;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 400;
const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy)]
pub struct Thumbnailer {
    max_width: u32,
    max_height: u32,
}

impl Default for Thumbnailer {
    fn default() -> Self {
        Self {
            max_width: THUMBNAIL_MAX_WIDTH,
            max_height: THUMBNAIL_MAX_HEIGHT,
        }
    }
}

impl Thumbnailer {
    /// Decode `data`, shrink it to fit the bounding box (never enlarging),
    /// and encode as JPEG.
    pub fn render(&self, data: &[u8]) -> CatalogueResult<Vec<u8>> {
        let img = image::load_from_memory(data)?;
        let (width, height) = img.dimensions();

        let resized: DynamicImage = if width <= self.max_width && height <= self.max_height {
            img
        } else {
            img.thumbnail(self.max_width, self.max_height)
        };

        // JPEG has no alpha channel
        let rgb = resized.to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([200, 160, 40, 255]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn large_images_are_scaled_into_the_box() {
        let thumb = Thumbnailer::default().render(&png(1200, 600)).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.dimensions(), (400, 200));
    }

    #[test]
    fn small_images_keep_their_size() {
        let thumb = Thumbnailer::default().render(&png(120, 80)).unwrap();
        let decoded = image::load_from_memory_with_format(&thumb, ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (120, 80));
    }

    #[test]
    fn garbage_is_an_image_error() {
        let err = Thumbnailer::default().render(b"not an image").unwrap_err();
        assert!(matches!(err, crate::errors::CatalogueError::Image(_)));
    }
}
