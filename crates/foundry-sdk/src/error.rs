//! SDK error types.
//!
//! [`SdkError`] covers setting the probe up. Once a request is on its way,
//! every failure is reported through a
//! [`ProbeOutcome`](crate::ProbeOutcome) instead.

use foundry_models::ModelError;

/// Error type for SDK construction and request building.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Invalid or missing configuration (e.g. bad base URL).
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The chat request failed validation.
    #[error("invalid request: {0}")]
    Model(#[from] ModelError),
}
