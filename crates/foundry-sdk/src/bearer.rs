//! Where the probe's bearer token comes from.
//!
//! A non-empty `APIM_BEARER_TOKEN` wins outright and the identity provider
//! is never contacted. Otherwise the token is acquired through
//! [`foundry_auth::acquire_token`].

use std::fmt;

use chrono::{DateTime, Utc};
use foundry_auth::{acquire_token, AcquireError, IdentityClient, Interaction};
use strum::Display;
use tracing::info;

/// Environment variable holding a ready-made bearer token.
pub const BEARER_ENV: &str = "APIM_BEARER_TOKEN";

/// Origin of a [`Bearer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BearerSource {
    /// Taken verbatim from [`BEARER_ENV`].
    #[strum(to_string = "environment (APIM_BEARER_TOKEN)")]
    Environment,
    /// Acquired from the identity provider (cache or sign-in).
    #[strum(to_string = "identity provider")]
    IdentityProvider,
}

/// A bearer token ready to be sent.
#[derive(Clone, PartialEq, Eq)]
pub struct Bearer {
    /// The credential itself.
    pub token: String,
    /// Where it came from.
    pub source: BearerSource,
    /// Declared expiry, unknown for environment tokens.
    pub expires_on: Option<DateTime<Utc>>,
}

// Keep the credential out of logs.
impl fmt::Debug for Bearer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bearer")
            .field("token", &format_args!("<{} bytes>", self.token.len()))
            .field("source", &self.source)
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// The bearer carried by the environment value, if it holds one.
///
/// Whitespace-only values count as unset; anything else is used exactly as
/// given.
pub fn bearer_from_env(value: Option<String>) -> Option<Bearer> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|token| Bearer {
            token,
            source: BearerSource::Environment,
            expires_on: None,
        })
}

/// Resolve the bearer for the probe.
///
/// `env_value` is the content of [`BEARER_ENV`] (pass
/// `std::env::var(BEARER_ENV).ok()`); when it holds a token, `client` is
/// not touched.
pub async fn resolve_bearer<C: IdentityClient>(
    env_value: Option<String>,
    client: &C,
    scopes: &[String],
    interaction: Interaction,
) -> Result<Bearer, AcquireError> {
    if let Some(bearer) = bearer_from_env(env_value) {
        info!(source = %bearer.source, "using pre-issued bearer token");
        return Ok(bearer);
    }

    let token = acquire_token(client, scopes, interaction).await?;
    info!(expires_on = %token.expires_on, "bearer token acquired");
    Ok(Bearer {
        token: token.secret,
        source: BearerSource::IdentityProvider,
        expires_on: Some(token.expires_on),
    })
}
