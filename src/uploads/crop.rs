//! Box crop and canvas fitting for uploaded images.

use image::{
    codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, DynamicImage, GenericImageView,
};
use thiserror::Error;

use crate::uploads::ImageKind;

/// Avatars are drawn onto a square canvas of this size.
pub const AVATAR_SIZE: u32 = 400;
/// Post images fit within this box and are never upscaled.
pub const POST_MAX_WIDTH: u32 = 1080;
pub const POST_MAX_HEIGHT: u32 = 1350;

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Crop box lies outside the image")]
    CropOutOfBounds,

    #[error("Image is empty")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crop box in source pixels as sent by the client cropper. Values may be
/// fractional or reach past the image edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A crop box clamped to the image, in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropBox {
    /// Intersect with an image of `image_width` x `image_height`.
    /// Returns `None` when nothing of the box is inside the image.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<PixelRect> {
        if !(self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite())
        {
            return None;
        }

        let x0 = self.x.round().max(0.0);
        let y0 = self.y.round().max(0.0);
        let x1 = (self.x + self.width).round().min(image_width as f64);
        let y1 = (self.y + self.height).round().min(image_height as f64);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(PixelRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Encoded output of [`process_image`].
#[derive(Debug)]
pub struct ProcessedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode, crop, draw onto the canvas for `kind` and encode as JPEG.
pub fn process_image(
    bytes: &[u8],
    kind: ImageKind,
    crop: Option<CropBox>,
) -> Result<ProcessedImage, ImageError> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ImageError::Empty);
    }

    let img = match crop {
        Some(crop) => {
            let rect = crop
                .clamp_to(width, height)
                .ok_or(ImageError::CropOutOfBounds)?;
            img.crop_imm(rect.x, rect.y, rect.width, rect.height)
        }
        None => img,
    };

    let canvas = fit_to_canvas(&img, kind);
    encode_jpeg(&canvas)
}

fn fit_to_canvas(img: &DynamicImage, kind: ImageKind) -> DynamicImage {
    match kind {
        // Scale to cover the square and trim the overflow
        ImageKind::Avatar => img.resize_to_fill(AVATAR_SIZE, AVATAR_SIZE, FilterType::Lanczos3),
        ImageKind::Post => {
            let (width, height) = img.dimensions();
            if width <= POST_MAX_WIDTH && height <= POST_MAX_HEIGHT {
                img.clone()
            } else {
                img.resize(POST_MAX_WIDTH, POST_MAX_HEIGHT, FilterType::Lanczos3)
            }
        }
    }
}

fn encode_jpeg(img: &DynamicImage) -> Result<ProcessedImage, ImageError> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode(
        rgb.as_raw(),
        width,
        height,
        ColorType::Rgb8,
    )?;

    Ok(ProcessedImage {
        jpeg,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageOutputFormat, Rgb};
    use std::io::Cursor;

    /// Gradient PNG of the given size, encoded in memory
    fn png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn crop(x: f64, y: f64, width: f64, height: f64) -> CropBox {
        CropBox {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn crop_inside_image_is_kept() {
        let rect = crop(10.0, 20.0, 100.0, 50.0).clamp_to(500, 500).unwrap();
        assert_eq!(
            rect,
            PixelRect {
                x: 10,
                y: 20,
                width: 100,
                height: 50
            }
        );
    }

    #[test]
    fn crop_past_edges_is_clamped() {
        let rect = crop(-30.0, 450.4, 100.0, 100.0).clamp_to(200, 500).unwrap();
        assert_eq!(
            rect,
            PixelRect {
                x: 0,
                y: 450,
                width: 70,
                height: 50
            }
        );
    }

    #[test]
    fn crop_outside_image_is_rejected() {
        assert!(crop(600.0, 0.0, 50.0, 50.0).clamp_to(500, 500).is_none());
        assert!(crop(0.0, 0.0, 0.0, 10.0).clamp_to(500, 500).is_none());
        assert!(crop(f64::NAN, 0.0, 10.0, 10.0).clamp_to(500, 500).is_none());
    }

    #[test]
    fn avatar_is_square_canvas() {
        let out = process_image(&png(640, 480), ImageKind::Avatar, None).unwrap();
        assert_eq!((out.width, out.height), (AVATAR_SIZE, AVATAR_SIZE));
        assert!(!out.jpeg.is_empty());
        let decoded = image::load_from_memory(&out.jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (AVATAR_SIZE, AVATAR_SIZE));
    }

    #[test]
    fn avatar_uses_crop_box() {
        let crop = Some(crop(100.0, 50.0, 200.0, 200.0));
        let out = process_image(&png(640, 480), ImageKind::Avatar, crop).unwrap();
        assert_eq!((out.width, out.height), (AVATAR_SIZE, AVATAR_SIZE));
    }

    #[test]
    fn large_post_image_fits_canvas_and_keeps_ratio() {
        let out = process_image(&png(2160, 1080), ImageKind::Post, None).unwrap();
        assert_eq!(out.width, POST_MAX_WIDTH);
        assert_eq!(out.height, 540);
    }

    #[test]
    fn small_post_image_is_not_upscaled() {
        let out = process_image(&png(300, 200), ImageKind::Post, None).unwrap();
        assert_eq!((out.width, out.height), (300, 200));
    }

    #[test]
    fn cropped_post_has_crop_dimensions() {
        let crop = Some(crop(0.0, 0.0, 120.0, 80.0));
        let out = process_image(&png(300, 200), ImageKind::Post, crop).unwrap();
        assert_eq!((out.width, out.height), (120, 80));
    }

    #[test]
    fn crop_outside_fails() {
        let crop = Some(crop(1000.0, 1000.0, 10.0, 10.0));
        let err = process_image(&png(300, 200), ImageKind::Post, crop).unwrap_err();
        assert!(matches!(err, ImageError::CropOutOfBounds));
    }

    #[test]
    fn garbage_is_an_image_error() {
        let err = process_image(b"definitely not an image", ImageKind::Post, None).unwrap_err();
        assert!(matches!(err, ImageError::Image(_)));
    }
}
