//! Image ingestion and base64 transport encoding.
//!
//! Every image entering a conversation goes through [`encode_image`], which
//! serializes it in its native container format and falls back to RGB JPEG
//! when the native format has no encoder (e.g. animated GIF frames or
//! palette formats the encoder side does not support).

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use url::Url;

use crate::error::{Error, ErrorDetails};
use crate::inference::types::Base64Image;

pub mod pdf;

/// Serializes `image` as base64 in the requested container format.
///
/// If the format's encoder rejects the image, the image is flattened to RGB
/// and re-encoded as JPEG instead of failing the request.
pub fn encode_image(image: &DynamicImage, format: ImageFormat) -> Result<Base64Image, Error> {
    let mut buffer = Vec::new();
    match image.write_to(&mut Cursor::new(&mut buffer), format) {
        Ok(()) => Ok(Base64Image {
            mime_type: format.to_mime_type().to_string(),
            data: BASE64_STANDARD.encode(&buffer),
        }),
        Err(e) => {
            tracing::debug!("Falling back to JPEG after {format:?} encode failed: {e}");
            buffer.clear();
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
                .map_err(|e| {
                    Error::new(ErrorDetails::ImageEncode {
                        message: format!("JPEG fallback failed: {e}"),
                    })
                })?;
            Ok(Base64Image {
                mime_type: ImageFormat::Jpeg.to_mime_type().to_string(),
                data: BASE64_STANDARD.encode(&buffer),
            })
        }
    }
}

/// Decodes and re-encodes raw upload bytes as a transport-ready [`Base64Image`].
///
/// The container format is taken from the bytes themselves when they carry a
/// recognizable magic number, then from the client's declared content type.
/// Camera captures often arrive with neither, so the final fallback is JPEG.
pub fn encode_upload(bytes: &[u8], declared_mime: Option<&str>) -> Result<Base64Image, Error> {
    let image = image::load_from_memory(bytes).map_err(|e| {
        Error::new(ErrorDetails::ImageDecode {
            message: e.to_string(),
        })
    })?;
    let format = image::guess_format(bytes)
        .ok()
        .or_else(|| declared_mime.and_then(ImageFormat::from_mime_type))
        .unwrap_or(ImageFormat::Jpeg);
    encode_image(&image, format)
}

/// Downloads an image over HTTP and encodes it for transport.
pub async fn fetch_image_url(client: &reqwest::Client, url: &Url) -> Result<Base64Image, Error> {
    let response = client.get(url.clone()).send().await.map_err(|e| {
        Error::new(ErrorDetails::BadImageFetch {
            url: url.clone(),
            message: e.to_string(),
        })
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::new(ErrorDetails::BadImageFetch {
            url: url.clone(),
            message: format!("response status: {status}"),
        }));
    }
    let bytes = response.bytes().await.map_err(|e| {
        Error::new(ErrorDetails::BadImageFetch {
            url: url.clone(),
            message: e.to_string(),
        })
    })?;
    encode_upload(&bytes, None)
}

/// Recovers the raw image behind a [`Base64Image`]
pub fn decode_image(image: &Base64Image) -> Result<DynamicImage, Error> {
    let bytes = BASE64_STANDARD.decode(&image.data).map_err(|e| {
        Error::new(ErrorDetails::Base64 {
            message: e.to_string(),
        })
    })?;
    image::load_from_memory(&bytes).map_err(|e| {
        Error::new(ErrorDetails::ImageDecode {
            message: e.to_string(),
        })
    })
}

/// Decodes a `data:<mime>;base64,<payload>` URI back into an image
pub fn decode_data_url(url: &str) -> Result<DynamicImage, Error> {
    decode_image(&Base64Image::from_data_url(url)?)
}
