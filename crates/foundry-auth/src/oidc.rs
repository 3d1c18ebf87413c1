//! Token-endpoint grants used by the public client.
//!
//! Both grants POST a form to [`AuthConfig::token_endpoint`] and share the
//! response handling: a non-2xx answer carrying `{error, error_description}`
//! becomes [`AcquireError::ProviderError`], a transport failure becomes
//! [`AcquireError::TransportError`].

use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::debug;

use crate::config::{AuthConfig, scope_param};
use crate::error::AcquireError;
use crate::token::AccessToken;

/// Lifetime assumed when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// What the token endpoint hands back on success.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: AccessToken,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
}

/// Redeem an authorization code obtained through the browser.
pub async fn redeem_authorization_code(
    http: &reqwest::Client,
    config: &AuthConfig,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
    scopes: &[String],
) -> Result<TokenGrant, AcquireError> {
    let scope = scope_param(scopes);
    post_token_request(
        http,
        config,
        &[
            ("client_id", config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
            ("scope", scope.as_str()),
        ],
    )
    .await
}

/// Redeem a cached refresh token for `scopes`.
pub async fn redeem_refresh_token(
    http: &reqwest::Client,
    config: &AuthConfig,
    refresh_token: &str,
    scopes: &[String],
) -> Result<TokenGrant, AcquireError> {
    let scope = scope_param(scopes);
    post_token_request(
        http,
        config,
        &[
            ("client_id", config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ],
    )
    .await
}

async fn post_token_request(
    http: &reqwest::Client,
    config: &AuthConfig,
    form: &[(&str, &str)],
) -> Result<TokenGrant, AcquireError> {
    let res = http.post(config.token_endpoint()).form(form).send().await?;
    let status = res.status();
    let text = res.text().await?;
    debug!(%status, "token endpoint answered");

    let body: Option<Value> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        let field = |name: &str| {
            body.as_ref()
                .and_then(|b| b.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        return Err(AcquireError::ProviderError {
            code: field("error").unwrap_or_else(|| format!("http_{}", status.as_u16())),
            description: field("error_description").unwrap_or(text),
        });
    }

    let body = body.ok_or_else(|| {
        AcquireError::provider("invalid_response", "token endpoint did not return JSON")
    })?;
    parse_grant(&body)
}

fn parse_grant(body: &Value) -> Result<TokenGrant, AcquireError> {
    let secret = body["access_token"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AcquireError::provider("invalid_response", "missing access_token"))?
        .to_string();

    // Some endpoints send expires_in as a string.
    let expires_in = match &body["expires_in"] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let expires_on = Duration::try_seconds(expires_in)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| AcquireError::provider("invalid_response", "expires_in out of range"))?;

    let text = |name: &str| body[name].as_str().map(str::to_string);

    Ok(TokenGrant {
        access_token: AccessToken { secret, expires_on },
        refresh_token: text("refresh_token"),
        id_token: text("id_token"),
    })
}
