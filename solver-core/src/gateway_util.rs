use std::sync::Arc;

use axum::extract::{rejection::JsonRejection, FromRequest, Json, Request};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::error::{Error, ErrorDetails};
use crate::media::pdf::{PdfRasterizer, PdfiumRasterizer};
use crate::providers::gemini::GeminiProvider;

/// State for the API
#[derive(Clone)]
pub struct AppStateData {
    pub config: Arc<Config>,
    pub http_client: Client,
    pub conversation: Arc<ConversationStore>,
    pub provider: Arc<GeminiProvider>,
    pub pdf_rasterizer: Arc<dyn PdfRasterizer>,
}
pub type AppState = axum::extract::State<AppStateData>;

impl AppStateData {
    pub fn new(config: Config) -> Result<Self, Error> {
        let provider = GeminiProvider::new(config.model_name.clone(), config.api_key.clone().into())
            .map_err(|e| {
                Error::new(ErrorDetails::AppState {
                    message: e.to_string(),
                })
            })?;
        Ok(Self {
            config: Arc::new(config),
            http_client: Client::new(),
            conversation: Arc::new(ConversationStore::new()),
            provider: Arc::new(provider),
            pdf_rasterizer: Arc::new(PdfiumRasterizer),
        })
    }

    #[cfg(test)]
    pub fn with_rasterizer(rasterizer: Arc<dyn PdfRasterizer>) -> Self {
        let config = Config::default();
        let provider = GeminiProvider::new(config.model_name.clone(), config.api_key.clone().into())
            .map_err(|e| {
                Error::new(ErrorDetails::AppState {
                    message: e.to_string(),
                })
            })
            .unwrap();
        Self {
            config: Arc::new(config),
            http_client: Client::new(),
            conversation: Arc::new(ConversationStore::new()),
            provider: Arc::new(provider),
            pdf_rasterizer: rasterizer,
        }
    }
}

/// Custom Axum extractor that validates the JSON body and deserializes it into a custom type
///
/// When this extractor is present, we don't check if the `Content-Type` header is `application/json`,
/// and instead simply assume that the request body is a JSON object.
pub struct StructuredJson<T>(pub T);

impl<S, T> FromRequest<S> for StructuredJson<T>
where
    Json<serde_json::Value>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
    T: Send + Sync + DeserializeOwned,
{
    type Rejection = Error;

    #[instrument(skip_all, level = "trace", name = "StructuredJson::from_request")]
    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // Retrieve the request body as Bytes before deserializing it
        let bytes = bytes::Bytes::from_request(req, state).await.map_err(|e| {
            Error::new(ErrorDetails::JsonRequest {
                message: format!("{} ({})", e, e.status()),
            })
        })?;

        // Convert the entire body into `serde_json::Value`
        let value = Json::<serde_json::Value>::from_bytes(&bytes)
            .map_err(|e| {
                Error::new(ErrorDetails::JsonRequest {
                    message: format!("{} ({})", e, e.status()),
                })
            })?
            .0;

        // Now use `serde_path_to_error::deserialize` to attempt deserialization into `T`
        let deserialized: T = serde_path_to_error::deserialize(&value).map_err(|e| {
            Error::new(ErrorDetails::JsonRequest {
                message: e.to_string(),
            })
        })?;

        Ok(StructuredJson(deserialized))
    }
}
