//! Token acquisition failures.
//!
//! [`AcquireError`] is a closed set: every way an acquisition can end
//! without a token maps onto exactly one variant, and each variant has a
//! stable machine-readable [`code`](AcquireError::code) for JSON output.

/// Why no token was produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    /// The cache holds no account for this client and authority.
    #[error("no cached account is available for silent sign-in")]
    NoCachedAccount,

    /// A cached account exists but its credential could not be used
    /// (absent, expired, revoked, or not covering the scopes).
    #[error("silent sign-in was not possible: {0}")]
    SilentAuthDenied(String),

    /// The user abandoned or declined the interactive sign-in.
    #[error("interactive sign-in was cancelled: {0}")]
    InteractiveAuthCancelled(String),

    /// The identity provider answered with an OAuth error.
    #[error("identity provider returned {code}: {description}")]
    ProviderError {
        /// OAuth `error` code (e.g. `invalid_scope`, `consent_required`).
        code: String,
        /// OAuth `error_description`, or a summary when none was sent.
        description: String,
    },

    /// The identity provider could not be reached, or the local redirect
    /// listener failed.
    #[error("failed to reach identity provider: {0}")]
    TransportError(String),
}

impl AcquireError {
    /// Machine-readable code, as printed in the token report.
    pub fn code(&self) -> &str {
        match self {
            Self::NoCachedAccount => "no_cached_account",
            Self::SilentAuthDenied(_) => "silent_auth_denied",
            Self::InteractiveAuthCancelled(_) => "interactive_auth_cancelled",
            Self::ProviderError { code, .. } => code,
            Self::TransportError(_) => "transport_error",
        }
    }

    /// Human-readable explanation without the category prefix.
    pub fn description(&self) -> String {
        match self {
            Self::NoCachedAccount => "no cached account is available for silent sign-in".into(),
            Self::SilentAuthDenied(reason)
            | Self::InteractiveAuthCancelled(reason)
            | Self::TransportError(reason) => reason.clone(),
            Self::ProviderError { description, .. } => description.clone(),
        }
    }

    pub(crate) fn provider(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::ProviderError {
            code: code.into(),
            description: description.into(),
        }
    }
}

impl From<reqwest::Error> for AcquireError {
    fn from(e: reqwest::Error) -> Self {
        Self::TransportError(e.to_string())
    }
}

impl From<std::io::Error> for AcquireError {
    fn from(e: std::io::Error) -> Self {
        Self::TransportError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let all = [
            AcquireError::NoCachedAccount,
            AcquireError::SilentAuthDenied("x".into()),
            AcquireError::InteractiveAuthCancelled("x".into()),
            AcquireError::provider("invalid_scope", "x"),
            AcquireError::TransportError("x".into()),
        ];
        let mut codes: Vec<&str> = all.iter().map(AcquireError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn provider_error_keeps_provider_code() {
        let err = AcquireError::provider("consent_required", "AADSTS65001: consent needed");
        assert_eq!(err.code(), "consent_required");
        assert_eq!(err.description(), "AADSTS65001: consent needed");
        assert_eq!(
            err.to_string(),
            "identity provider returned consent_required: AADSTS65001: consent needed"
        );
    }

    #[test]
    fn io_error_is_transport() {
        let err: AcquireError = std::io::Error::other("port in use").into();
        assert_eq!(err, AcquireError::TransportError("port in use".into()));
    }
}
