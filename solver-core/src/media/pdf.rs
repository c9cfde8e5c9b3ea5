//! PDF page rasterization.
//!
//! Rasterization sits behind the [`PdfRasterizer`] trait so the upload
//! endpoint can be tested without a Pdfium library on the host.

use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;

use crate::error::{Error, ErrorDetails};
use crate::inference::types::Base64Image;
use crate::media::encode_image;

const RENDER_TARGET_WIDTH: i32 = 1024;

pub trait PdfRasterizer: Send + Sync {
    /// Renders every page of `bytes` as an RGB image, in page order.
    fn rasterize(&self, bytes: &[u8]) -> Result<Vec<DynamicImage>, Error>;
}

/// Rasterizer backed by a system-installed Pdfium library.
///
/// The library is bound per call; Pdfium is not thread safe, and binding is
/// cheap next to rendering.
pub struct PdfiumRasterizer;

impl PdfRasterizer for PdfiumRasterizer {
    fn rasterize(&self, bytes: &[u8]) -> Result<Vec<DynamicImage>, Error> {
        let bindings = Pdfium::bind_to_system_library().map_err(|e| {
            Error::new(ErrorDetails::PdfEngine {
                message: e.to_string(),
            })
        })?;
        let pdfium = Pdfium::new(bindings);
        let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
            Error::new(ErrorDetails::PdfRender {
                message: e.to_string(),
            })
        })?;
        let render_config = PdfRenderConfig::new().set_target_width(RENDER_TARGET_WIDTH);
        let mut pages = Vec::new();
        for page in document.pages().iter() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                Error::new(ErrorDetails::PdfRender {
                    message: e.to_string(),
                })
            })?;
            pages.push(DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8()));
        }
        Ok(pages)
    }
}

/// Renders a PDF and encodes each page as a JPEG [`Base64Image`], preserving
/// page order.
pub fn pdf_to_images(
    rasterizer: &dyn PdfRasterizer,
    bytes: &[u8],
) -> Result<Vec<Base64Image>, Error> {
    rasterizer
        .rasterize(bytes)?
        .iter()
        .map(|page| encode_image(page, ImageFormat::Jpeg))
        .collect()
}


#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::test_helpers::{FailingRasterizer, FakeRasterizer};
    use super::*;
    use crate::media::decode_image;

    #[test]
    fn test_pdf_to_images_one_jpeg_per_page() {
        let rasterizer = FakeRasterizer {
            page_colors: vec![Rgb([255, 0, 0]), Rgb([0, 255, 0]), Rgb([0, 0, 255])],
        };
        let images = pdf_to_images(&rasterizer, b"%PDF-").unwrap();
        assert_eq!(images.len(), 3);
        for image in &images {
            assert_eq!(image.mime_type, "image/jpeg");
        }
        // Page order is preserved: each page keeps its dominant channel.
        let decoded: Vec<_> = images
            .iter()
            .map(|image| decode_image(image).unwrap().to_rgb8())
            .collect();
        let first = decoded[0].get_pixel(4, 4);
        let second = decoded[1].get_pixel(4, 4);
        let third = decoded[2].get_pixel(4, 4);
        assert!(first[0] > first[1] && first[0] > first[2]);
        assert!(second[1] > second[0] && second[1] > second[2]);
        assert!(third[2] > third[0] && third[2] > third[1]);
    }

    #[test]
    fn test_pdf_to_images_propagates_render_errors() {
        let error = pdf_to_images(&FailingRasterizer, b"%PDF-").unwrap_err();
        assert_eq!(
            *error.get_details(),
            ErrorDetails::PdfRender {
                message: "corrupt document".to_string(),
            }
        );
    }
}
