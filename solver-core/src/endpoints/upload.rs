use axum::extract::{Multipart, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::conversation::ConversationStore;
use crate::error::{Error, ErrorDetails};
use crate::gateway_util::{AppState, AppStateData, StructuredJson};
use crate::inference::types::{Base64Image, ChatMessage};
use crate::media;
use crate::media::pdf;

#[derive(Debug, Serialize)]
pub struct UploadImageResponse {
    pub image_base64: String,
}

#[derive(Debug, Serialize)]
pub struct UploadPdfResponse {
    pub images_base64: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadImageUrlParams {
    pub url: Url,
}

struct UploadedFile {
    bytes: bytes::Bytes,
    content_type: Option<String>,
}

/// Pulls the `file` part out of a multipart body. Other parts are ignored.
async fn extract_file(multipart: &mut Multipart) -> Result<UploadedFile, Error> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Error::new(ErrorDetails::InvalidRequest {
            message: format!("Error reading multipart body: {e}"),
        })
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            Error::new(ErrorDetails::InvalidRequest {
                message: format!("Error reading multipart field `file`: {e}"),
            })
        })?;
        return Ok(UploadedFile {
            bytes,
            content_type,
        });
    }
    Err(Error::new(ErrorDetails::MissingUploadField {
        field: "file".to_string(),
    }))
}

/// A handler for `POST /upload_image`.
///
/// Re-encodes the uploaded image for transport and appends it to the
/// conversation as a user message.
pub async fn upload_image_handler(
    State(AppStateData { conversation, .. }): AppState,
    mut multipart: Multipart,
) -> Result<Json<UploadImageResponse>, Error> {
    let file = extract_file(&mut multipart).await?;
    let image = media::encode_upload(&file.bytes, file.content_type.as_deref())?;
    append_image(&conversation, image.clone()).await;
    Ok(Json(UploadImageResponse {
        image_base64: image.data,
    }))
}

/// A handler for `POST /upload_image_url`: fetches a remote image and appends
/// it to the conversation as a user message.
pub async fn upload_image_url_handler(
    State(AppStateData {
        http_client,
        conversation,
        ..
    }): AppState,
    StructuredJson(params): StructuredJson<UploadImageUrlParams>,
) -> Result<Json<UploadImageResponse>, Error> {
    let image = media::fetch_image_url(&http_client, &params.url).await?;
    append_image(&conversation, image.clone()).await;
    Ok(Json(UploadImageResponse {
        image_base64: image.data,
    }))
}

/// A handler for `POST /upload_pdf`.
///
/// Renders each page of the uploaded PDF as a JPEG and appends one user
/// message per page, in page order.
pub async fn upload_pdf_handler(
    State(AppStateData {
        conversation,
        pdf_rasterizer,
        ..
    }): AppState,
    mut multipart: Multipart,
) -> Result<Json<UploadPdfResponse>, Error> {
    let file = extract_file(&mut multipart).await?;
    // Rendering is CPU-bound, so keep it off the async workers.
    let images = tokio::task::spawn_blocking(move || {
        pdf::pdf_to_images(pdf_rasterizer.as_ref(), &file.bytes)
    })
    .await
    .map_err(|e| {
        Error::new(ErrorDetails::InternalError {
            message: format!("PDF render task panicked: {e}"),
        })
    })??;
    let mut images_base64 = Vec::with_capacity(images.len());
    for image in images {
        images_base64.push(image.data.clone());
        append_image(&conversation, image).await;
    }
    Ok(Json(UploadPdfResponse { images_base64 }))
}

async fn append_image(conversation: &ConversationStore, image: Base64Image) {
    conversation.append(ChatMessage::user_image(image)).await;
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use http_body_util::BodyExt;
    use image::{ImageFormat, Rgb, RgbImage};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::inference::types::ContentPart;
    use crate::media::pdf::test_helpers::{FailingRasterizer, FakeRasterizer};

    const BOUNDARY: &str = "test-boundary";

    fn test_router(state: AppStateData) -> Router {
        Router::new()
            .route("/upload_image", post(upload_image_handler))
            .route("/upload_pdf", post(upload_pdf_handler))
            .with_state(state)
    }

    fn multipart_request(uri: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let image = RgbImage::from_pixel(4, 4, Rgb([128, 64, 32]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_upload_image_appends_user_message() {
        let state = AppStateData::with_rasterizer(Arc::new(FakeRasterizer {
            page_colors: vec![],
        }));
        let router = test_router(state.clone());

        let response = router
            .oneshot(multipart_request(
                "/upload_image",
                "problem.png",
                "image/png",
                &png_bytes(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert!(body["image_base64"].as_str().is_some_and(|s| !s.is_empty()));

        let messages = state.conversation.snapshot().await;
        assert_eq!(messages.len(), 1);
        match &messages[0].content[0] {
            ContentPart::Image { image } => assert_eq!(image.mime_type, "image/png"),
            ContentPart::Text { .. } => panic!("expected image content"),
        }
    }

    #[tokio::test]
    async fn test_upload_image_missing_file_field() {
        let state = AppStateData::with_rasterizer(Arc::new(FakeRasterizer {
            page_colors: vec![],
        }));
        let router = test_router(state.clone());

        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{BOUNDARY}--\r\n"
            )
            .as_bytes(),
        );
        let request = Request::builder()
            .method("POST")
            .uri("/upload_image")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.conversation.is_empty().await);
    }

    #[tokio::test]
    async fn test_upload_image_rejects_non_image() {
        let state = AppStateData::with_rasterizer(Arc::new(FakeRasterizer {
            page_colors: vec![],
        }));
        let router = test_router(state.clone());

        let response = router
            .oneshot(multipart_request(
                "/upload_image",
                "notes.txt",
                "text/plain",
                b"not an image",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.conversation.is_empty().await);
    }

    #[tokio::test]
    async fn test_upload_pdf_appends_one_message_per_page() {
        let state = AppStateData::with_rasterizer(Arc::new(FakeRasterizer {
            page_colors: vec![Rgb([255, 0, 0]), Rgb([0, 255, 0])],
        }));
        let router = test_router(state.clone());

        let response = router
            .oneshot(multipart_request(
                "/upload_pdf",
                "homework.pdf",
                "application/pdf",
                b"%PDF-1.4",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["images_base64"].as_array().unwrap().len(), 2);

        let messages = state.conversation.snapshot().await;
        assert_eq!(messages.len(), 2);
        for message in &messages {
            match &message.content[0] {
                ContentPart::Image { image } => assert_eq!(image.mime_type, "image/jpeg"),
                ContentPart::Text { .. } => panic!("expected image content"),
            }
        }
    }

    #[tokio::test]
    async fn test_upload_pdf_render_error_appends_nothing() {
        let state = AppStateData::with_rasterizer(Arc::new(FailingRasterizer));
        let router = test_router(state.clone());

        let response = router
            .oneshot(multipart_request(
                "/upload_pdf",
                "broken.pdf",
                "application/pdf",
                b"not a pdf",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.conversation.is_empty().await);
    }
}
