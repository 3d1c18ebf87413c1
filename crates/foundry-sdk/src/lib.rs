//! # Foundry SDK
//!
//! Probe a chat-completions API with a delegated-user bearer token.
//!
//! The SDK provides:
//!
//! * [`ApiConfig`]: base URL, `api-version`, default model, scopes and
//!   timeout.
//! * [`ChatProbe`]: sends one request and returns a [`ProbeOutcome`].
//! * [`StatusCategory`]: the closed set of outcome kinds.
//! * [`resolve_bearer`]: `APIM_BEARER_TOKEN` or the identity provider.
//! * [`SdkError`]: setup failures.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use foundry_auth::{AuthConfig, Interaction, PublicClientApp, TokenCache};
//! use foundry_sdk::{resolve_bearer, ApiConfig, ChatProbe, BEARER_ENV};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiConfig::new(
//!     "https://apim.example.com/models",
//!     "2024-05-01-preview",
//!     "gpt-4o",
//!     vec!["api://my-app/access_api".into()],
//! );
//! let client = PublicClientApp::new(
//!     AuthConfig::for_tenant("client-id", "contoso.onmicrosoft.com"),
//!     TokenCache::in_memory(),
//! );
//!
//! let bearer = resolve_bearer(
//!     std::env::var(BEARER_ENV).ok(),
//!     &client,
//!     &api.scopes,
//!     Interaction::Allowed,
//! )
//! .await?;
//!
//! let probe = ChatProbe::new(api)?;
//! let request = probe.default_request("Say hello")?;
//! let outcome = probe.probe(&bearer.token, &request).await;
//! println!("{}", outcome.category);
//! # Ok(())
//! # }
//! ```

pub mod bearer;
pub mod config;
pub mod error;
pub mod outcome;
pub mod probe;

pub use bearer::{bearer_from_env, resolve_bearer, Bearer, BearerSource, BEARER_ENV};
pub use config::{ApiConfig, DEFAULT_TIMEOUT};
pub use error::SdkError;
pub use outcome::{ProbeOutcome, StatusCategory};
pub use probe::ChatProbe;

// Re-export the request types for ergonomic usage.
pub use foundry_models::{ChatCompletion, ChatRequest, Usage};
