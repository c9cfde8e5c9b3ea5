//! Implements a subset of the Google AI Studio Gemini API as documented [here](https://ai.google.dev/gemini-api/docs/text-generation?lang=rest)

use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use http::StatusCode;

use crate::error::{Error, ErrorDetails};
use crate::inference::types::{ChatMessage, ContentPart, Role};
use crate::providers::{GenerationProvider, ProviderTextStream};

const PROVIDER_NAME: &str = "Google AI Studio Gemini";

#[derive(Debug)]
pub struct GeminiProvider {
    model_name: String,
    request_url: Url,
    streaming_request_url: Url,
    credentials: GeminiCredentials,
}

impl GeminiProvider {
    pub fn new(model_name: String, credentials: GeminiCredentials) -> Result<Self, Error> {
        let request_url = Url::parse(&format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{model_name}:generateContent",
        ))
        .map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to parse request URL: {e}"),
            })
        })?;
        let streaming_request_url = Url::parse(&format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{model_name}:streamGenerateContent?alt=sse",
        ))
        .map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to parse streaming request URL: {e}"),
            })
        })?;
        Ok(GeminiProvider {
            model_name,
            request_url,
            streaming_request_url,
            credentials,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[derive(Clone, Debug)]
pub enum GeminiCredentials {
    Static(SecretString),
    None,
}

impl From<Option<SecretString>> for GeminiCredentials {
    fn from(api_key: Option<SecretString>) -> Self {
        match api_key {
            Some(api_key) => GeminiCredentials::Static(api_key),
            None => GeminiCredentials::None,
        }
    }
}

impl GeminiCredentials {
    pub fn get_api_key(&self) -> Result<&SecretString, Error> {
        match self {
            GeminiCredentials::Static(api_key) => Ok(api_key),
            GeminiCredentials::None => Err(Error::new(ErrorDetails::ApiKeyMissing {
                provider_name: PROVIDER_NAME.to_string(),
            })),
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeminiRole {
    User,
    Model,
}

impl From<Role> for GeminiRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => GeminiRole::User,
            Role::Assistant => GeminiRole::Model,
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inline_data")]
        inline_data: GeminiInlineData,
    },
}

impl From<&ContentPart> for GeminiPart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => GeminiPart::Text { text: text.clone() },
            ContentPart::Image { image } => GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            },
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct GeminiContent {
    role: GeminiRole,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

impl GeminiRequest {
    pub fn new(messages: &[ChatMessage]) -> Self {
        GeminiRequest {
            contents: normalize_conversation(messages),
        }
    }
}

enum PrevRole {
    NoPrev,
    Prev(Role),
}

/// Converts a conversation into Gemini provider turns.
///
/// Gemini rejects consecutive turns with the same role, so runs of messages
/// sharing a role are merged into a single turn whose parts are the
/// concatenation of the run's parts, in order. Merging is keyed on the
/// conversation role: two adjacent messages merge exactly when their
/// conversation roles are equal.
fn normalize_conversation(messages: &[ChatMessage]) -> Vec<GeminiContent> {
    let mut contents: Vec<GeminiContent> = Vec::new();
    let mut prev_role = PrevRole::NoPrev;
    for message in messages {
        let parts = message.content.iter().map(GeminiPart::from);
        match prev_role {
            PrevRole::Prev(role) if role == message.role => {
                if let Some(last) = contents.last_mut() {
                    last.parts.extend(parts);
                }
            }
            _ => {
                contents.push(GeminiContent {
                    role: message.role.into(),
                    parts: parts.collect(),
                });
            }
        }
        prev_role = PrevRole::Prev(message.role);
    }
    contents
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponseContentPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiResponseCandidate>,
}

impl GeminiResponse {
    /// The text of the first candidate, with multi-part responses joined
    fn concatenated_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl GenerationProvider for GeminiProvider {
    async fn generate(&self, messages: Vec<ChatMessage>, client: &Client) -> Result<String, Error> {
        let request_body = GeminiRequest::new(&messages);
        let api_key = self.credentials.get_api_key()?;
        let mut url = self.request_url.clone();
        url.query_pairs_mut()
            .append_pair("key", api_key.expose_secret());
        let res = client
            .post(url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                Error::new(ErrorDetails::InferenceClient {
                    message: format!("Error sending request to {PROVIDER_NAME}: {e}"),
                })
            })?;
        if res.status().is_success() {
            let response: GeminiResponse = res.json().await.map_err(|e| {
                Error::new(ErrorDetails::GoogleAIStudioServer {
                    message: format!("Error parsing JSON response: {e}"),
                })
            })?;
            Ok(response.concatenated_text())
        } else {
            let status = res.status();
            let response_body = res.text().await.unwrap_or_default();
            Err(handle_google_ai_studio_error(status, response_body))
        }
    }

    async fn generate_stream(
        &self,
        messages: Vec<ChatMessage>,
        client: &Client,
    ) -> Result<ProviderTextStream, Error> {
        let request_body = GeminiRequest::new(&messages);
        let api_key = self.credentials.get_api_key()?;
        let mut url = self.streaming_request_url.clone();
        url.query_pairs_mut()
            .append_pair("key", api_key.expose_secret());
        let event_source = client
            .post(url)
            .json(&request_body)
            .eventsource()
            .map_err(|e| {
                Error::new(ErrorDetails::InferenceClient {
                    message: format!("Error starting streaming request to {PROVIDER_NAME}: {e}"),
                })
            })?;
        Ok(stream_gemini(event_source))
    }
}

/// Adapts a Gemini SSE stream into a stream of text fragments.
///
/// The first error terminates the stream: EventSource would otherwise
/// reconnect and replay the request.
fn stream_gemini(mut event_source: EventSource) -> ProviderTextStream {
    Box::pin(async_stream::stream! {
        while let Some(ev) = event_source.next().await {
            match ev {
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let response_body = response.text().await.unwrap_or_default();
                    yield Err(handle_google_ai_studio_error(status, response_body));
                    break;
                }
                Err(e) => {
                    yield Err(Error::new(ErrorDetails::GoogleAIStudioServer {
                        message: format!("Error in streaming response: {e}"),
                    }));
                    break;
                }
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => {
                    match serde_json::from_str::<GeminiResponse>(&message.data) {
                        Ok(response) => yield Ok(response.concatenated_text()),
                        Err(e) => {
                            yield Err(Error::new(ErrorDetails::GoogleAIStudioServer {
                                message: format!("Error parsing streaming JSON response: {e}"),
                            }));
                            break;
                        }
                    }
                }
            }
        }
        event_source.close();
    })
}

fn handle_google_ai_studio_error(response_code: StatusCode, response_body: String) -> Error {
    match response_code {
        StatusCode::UNAUTHORIZED
        | StatusCode::BAD_REQUEST
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::TOO_MANY_REQUESTS => Error::new(ErrorDetails::GoogleAIStudioClient {
            message: response_body,
            status_code: response_code,
        }),
        // StatusCode::NOT_FOUND | StatusCode::FORBIDDEN | StatusCode::INTERNAL_SERVER_ERROR | 529: Overloaded
        // These are all captured in _ since they have the same error behavior
        _ => Error::new(ErrorDetails::GoogleAIStudioServer {
            message: response_body,
        }),
    }
}
