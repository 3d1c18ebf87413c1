//! Error types for the `foundry-models` crate.
//!
//! All fallible constructors in this crate return variants of [`ModelError`].

/// Errors produced when constructing or validating model types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// The sampling temperature was outside the range accepted by the API.
    #[error("invalid temperature {value}: must be between 0.0 and 2.0")]
    InvalidTemperature {
        /// The value that failed validation.
        value: f32,
    },

    /// The completion token cap was zero.
    #[error("invalid max_tokens {value}: must be greater than zero")]
    InvalidMaxTokens {
        /// The value that failed validation.
        value: u32,
    },

    /// A request was built without any user message.
    #[error("missing required field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },
}
