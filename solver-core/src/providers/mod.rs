use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use reqwest::Client;

use crate::error::Error;
use crate::inference::types::ChatMessage;

pub mod gemini;

/// A stream of text fragments from a model provider
pub type ProviderTextStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// The seam between the request/response layer and a concrete model API.
///
/// Methods return `impl Future + Send` rather than using `async fn` so that
/// generic callers can be used inside Axum handlers, which require `Send`
/// futures.
pub trait GenerationProvider: Send + Sync {
    /// Runs a full conversation through the model and returns the complete
    /// generated text.
    fn generate(
        &self,
        messages: Vec<ChatMessage>,
        client: &Client,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Runs a full conversation through the model and returns a stream of
    /// text fragments.
    fn generate_stream(
        &self,
        messages: Vec<ChatMessage>,
        client: &Client,
    ) -> impl Future<Output = Result<ProviderTextStream, Error>> + Send;
}
