use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Serialize, Serializer};
use serde_json::json;
use thiserror::Error;
use url::Url;

#[derive(Clone, Debug, Error, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
#[error(transparent)]
// As long as the struct member is private, we force people to use the `new` method and log the error.
// We arc `ErrorDetails` per the `clippy::result_large_err` lint, as well as to make it cloneable
pub struct Error(Arc<ErrorDetails>);

impl Error {
    pub fn new(details: ErrorDetails) -> Self {
        details.log();
        Error(Arc::new(details))
    }

    pub fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    pub fn get_details(&self) -> &ErrorDetails {
        &self.0
    }

    pub fn log(&self) {
        self.0.log();
    }
}

// Expect for derive Serialize
#[expect(clippy::trivially_copy_pass_by_ref)]
fn serialize_status<S>(code: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(code.as_u16())
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

#[derive(Debug, Error, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
pub enum ErrorDetails {
    ApiKeyMissing {
        provider_name: String,
    },
    AppState {
        message: String,
    },
    Base64 {
        message: String,
    },
    BadImageFetch {
        url: Url,
        message: String,
    },
    Config {
        message: String,
    },
    GoogleAIStudioClient {
        message: String,
        #[serde(serialize_with = "serialize_status")]
        status_code: StatusCode,
    },
    GoogleAIStudioServer {
        message: String,
    },
    ImageDecode {
        message: String,
    },
    ImageEncode {
        message: String,
    },
    InferenceClient {
        message: String,
    },
    InternalError {
        message: String,
    },
    InvalidRequest {
        message: String,
    },
    JsonRequest {
        message: String,
    },
    MalformedDataUri {
        message: String,
    },
    MissingUploadField {
        field: String,
    },
    Observability {
        message: String,
    },
    PdfEngine {
        message: String,
    },
    PdfRender {
        message: String,
    },
    Serialization {
        message: String,
    },
}

impl ErrorDetails {
    /// Defines the error level for logging this error
    fn level(&self) -> tracing::Level {
        match self {
            ErrorDetails::ApiKeyMissing { .. } => tracing::Level::WARN,
            ErrorDetails::AppState { .. } => tracing::Level::ERROR,
            ErrorDetails::Base64 { .. } => tracing::Level::WARN,
            ErrorDetails::BadImageFetch { .. } => tracing::Level::WARN,
            ErrorDetails::Config { .. } => tracing::Level::ERROR,
            ErrorDetails::GoogleAIStudioClient { .. } => tracing::Level::WARN,
            ErrorDetails::GoogleAIStudioServer { .. } => tracing::Level::ERROR,
            ErrorDetails::ImageDecode { .. } => tracing::Level::WARN,
            ErrorDetails::ImageEncode { .. } => tracing::Level::ERROR,
            ErrorDetails::InferenceClient { .. } => tracing::Level::ERROR,
            ErrorDetails::InternalError { .. } => tracing::Level::ERROR,
            ErrorDetails::InvalidRequest { .. } => tracing::Level::WARN,
            ErrorDetails::JsonRequest { .. } => tracing::Level::WARN,
            ErrorDetails::MalformedDataUri { .. } => tracing::Level::WARN,
            ErrorDetails::MissingUploadField { .. } => tracing::Level::WARN,
            ErrorDetails::Observability { .. } => tracing::Level::ERROR,
            ErrorDetails::PdfEngine { .. } => tracing::Level::ERROR,
            ErrorDetails::PdfRender { .. } => tracing::Level::WARN,
            ErrorDetails::Serialization { .. } => tracing::Level::ERROR,
        }
    }

    /// Defines the HTTP status code for responses that include this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorDetails::ApiKeyMissing { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::AppState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::Base64 { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::BadImageFetch { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::GoogleAIStudioClient { status_code, .. } => *status_code,
            ErrorDetails::GoogleAIStudioServer { .. } => StatusCode::BAD_GATEWAY,
            ErrorDetails::ImageDecode { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::ImageEncode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::InferenceClient { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::JsonRequest { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::MalformedDataUri { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::MissingUploadField { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::Observability { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::PdfEngine { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::PdfRender { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::Serialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log the error using the `tracing` library
    pub fn log(&self) {
        match self.level() {
            tracing::Level::ERROR => tracing::error!("{self}"),
            tracing::Level::WARN => tracing::warn!("{self}"),
            tracing::Level::INFO => tracing::info!("{self}"),
            tracing::Level::DEBUG => tracing::debug!("{self}"),
            tracing::Level::TRACE => tracing::trace!("{self}"),
        }
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetails::ApiKeyMissing { provider_name } => {
                write!(f, "API key missing for provider: {provider_name}")
            }
            ErrorDetails::AppState { message } => {
                write!(f, "Error initializing AppState: {message}")
            }
            ErrorDetails::Base64 { message } => {
                write!(f, "Error decoding base64: {message}")
            }
            ErrorDetails::BadImageFetch { url, message } => {
                write!(f, "Error fetching image from {url}: {message}")
            }
            ErrorDetails::Config { message } => {
                write!(f, "Failed to parse config: {message}")
            }
            ErrorDetails::GoogleAIStudioClient { message, .. } => {
                write!(f, "Error from Google AI Studio client: {message}")
            }
            ErrorDetails::GoogleAIStudioServer { message } => {
                write!(f, "Error from Google AI Studio server: {message}")
            }
            ErrorDetails::ImageDecode { message } => {
                write!(f, "Error decoding image: {message}")
            }
            ErrorDetails::ImageEncode { message } => {
                write!(f, "Error encoding image: {message}")
            }
            ErrorDetails::InferenceClient { message } => {
                write!(f, "Error from inference client: {message}")
            }
            ErrorDetails::InternalError { message } => {
                write!(f, "Internal error: {message}")
            }
            ErrorDetails::InvalidRequest { message } => {
                write!(f, "Invalid request: {message}")
            }
            ErrorDetails::JsonRequest { message } => {
                write!(f, "Error parsing JSON request: {message}")
            }
            ErrorDetails::MalformedDataUri { message } => {
                write!(f, "Malformed data URI: {message}")
            }
            ErrorDetails::MissingUploadField { field } => {
                write!(f, "Missing multipart upload field: `{field}`")
            }
            ErrorDetails::Observability { message } => {
                write!(f, "Error setting up observability: {message}")
            }
            ErrorDetails::PdfEngine { message } => {
                write!(f, "Error loading PDF engine: {message}")
            }
            ErrorDetails::PdfRender { message } => {
                write!(f, "Error rendering PDF: {message}")
            }
            ErrorDetails::Serialization { message } => {
                write!(f, "Error serializing data: {message}")
            }
        }
    }
}

impl IntoResponse for Error {
    /// Log the error and convert it into an Axum response
    fn into_response(self) -> Response {
        let body = json!({"error": self.to_string()});
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorDetails::Serialization {
            message: err.to_string(),
        })
    }
}
