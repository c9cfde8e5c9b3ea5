//! Core conversation types shared by the store, the endpoints, and the provider layer.

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorDetails};

mod role;

pub use role::Role;

/// An image held as a base64 payload alongside its mime type.
///
/// This is the in-memory form of every image in a conversation. The data URI
/// form (`data:<mime>;base64,<payload>`) is only materialized at the edges.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Base64Image {
    pub mime_type: String,
    pub data: String,
}

impl Base64Image {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Parses a `data:<mime>;base64,<payload>` URI.
    ///
    /// The payload is everything after the first `,`. A URI without a comma
    /// separator is rejected rather than treated as a bare payload.
    pub fn from_data_url(url: &str) -> Result<Self, Error> {
        let (prefix, payload) = url.split_once(',').ok_or_else(|| {
            Error::new(ErrorDetails::MalformedDataUri {
                message: "missing `,` separator".to_string(),
            })
        })?;
        let mime_type = prefix
            .strip_prefix("data:")
            .and_then(|p| p.strip_suffix(";base64"))
            .ok_or_else(|| {
                Error::new(ErrorDetails::MalformedDataUri {
                    message: format!("expected `data:<mime>;base64` prefix, got `{prefix}`"),
                })
            })?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
        })
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { image: Base64Image },
}

impl From<String> for ContentPart {
    fn from(text: String) -> Self {
        ContentPart::Text { text }
    }
}

impl From<Base64Image> for ContentPart {
    fn from(image: Base64Image) -> Self {
        ContentPart::Image { image }
    }
}

/// A single turn in a conversation, as stored and as returned by `GET /conversation`
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn user_text(text: String) -> Self {
        Self {
            role: Role::User,
            content: vec![text.into()],
        }
    }

    pub fn user_image(image: Base64Image) -> Self {
        Self {
            role: Role::User,
            content: vec![image.into()],
        }
    }

    pub fn assistant_text(text: String) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![text.into()],
        }
    }
}
