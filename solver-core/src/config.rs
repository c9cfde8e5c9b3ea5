//! Environment-driven gateway configuration.

use std::net::SocketAddr;

use secrecy::SecretString;

use crate::error::{Error, ErrorDetails};

pub const DEFAULT_MODEL_NAME: &str = "gemini-1.5-pro";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Debug)]
pub struct Config {
    /// Google AI Studio API key. The gateway starts without one; requests
    /// that need the model fail with `ApiKeyMissing` until it is set.
    pub api_key: Option<SecretString>,
    pub model_name: String,
    pub bind_address: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GOOGLE_API_KEY").ok().map(SecretString::from);
        let model_name =
            std::env::var("SOLVER_MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL_NAME.to_string());
        let bind_address = std::env::var("SOLVER_BIND_ADDRESS")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string())
            .parse()
            .map_err(|e| {
                Error::new(ErrorDetails::Config {
                    message: format!("Invalid `SOLVER_BIND_ADDRESS`: {e}"),
                })
            })?;
        Ok(Config {
            api_key,
            model_name,
            bind_address,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.model_name, "gemini-1.5-pro");
        assert_eq!(config.bind_address.port(), 3000);
    }
}
