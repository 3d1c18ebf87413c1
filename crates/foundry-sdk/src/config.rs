//! Chat API coordinates.

use std::time::Duration;

use reqwest::Url;

use crate::error::SdkError;

/// Timeout applied to the probe's POST when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed path appended to the API base URL.
pub const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

/// Where and how to reach the chat-completions API.
///
/// Built once from the settings file and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// API base URL, e.g. `https://apim.example.com/models`.
    pub base_url: String,
    /// Value of the `api-version` query parameter.
    pub api_version: String,
    /// Deployment used when the caller names none.
    pub default_model: String,
    /// OAuth scopes the bearer must carry.
    pub scopes: Vec<String>,
    /// Bound on the whole POST, connect to last body byte.
    pub timeout: Duration,
}

impl ApiConfig {
    /// Configuration with the default timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_version: impl Into<String>,
        default_model: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: api_version.into(),
            default_model: default_model.into(),
            scopes,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{base_url}/chat/completions?api-version={api_version}`.
    pub fn chat_completions_url(&self) -> Result<Url, SdkError> {
        let raw = format!(
            "{}/{CHAT_COMPLETIONS_PATH}",
            self.base_url.trim().trim_end_matches('/')
        );
        let mut url =
            Url::parse(&raw).map_err(|e| SdkError::Config(format!("invalid API base URL {raw:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SdkError::Config(format!(
                "API base URL must be http or https, got {}",
                url.scheme()
            )));
        }
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }
}
