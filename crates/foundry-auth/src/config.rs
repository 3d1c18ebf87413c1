//! Identity-provider coordinates for a public client.
//!
//! An [`AuthConfig`] names the application (`client_id`) and the authority
//! that issues its tokens. Endpoint URLs follow the Microsoft identity
//! platform v2.0 layout, which the local mock provider mirrors:
//!
//! ```text
//! {authority}/oauth2/v2.0/authorize
//! {authority}/oauth2/v2.0/token
//! ```

/// Host of the public Microsoft identity platform.
pub const DEFAULT_LOGIN_HOST: &str = "https://login.microsoftonline.com";

/// Scopes requested on every interactive sign-in in addition to the
/// caller's. They yield an id_token (to identify the account) and a refresh
/// token (to make later acquisitions silent).
pub const RESERVED_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// Public-client configuration: which application, which authority.
///
/// Constructed once at startup and treated as immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Application (client) id of the app registration.
    pub client_id: String,
    /// Authority URL without trailing slash,
    /// e.g. `https://login.microsoftonline.com/{tenant}`.
    pub authority: String,
}

impl AuthConfig {
    /// Build a configuration from an explicit authority URL.
    pub fn new(client_id: impl Into<String>, authority: impl Into<String>) -> Self {
        let authority = authority.into();
        Self {
            client_id: client_id.into(),
            authority: authority.trim_end_matches('/').to_string(),
        }
    }

    /// Build a configuration for a tenant of the public identity platform.
    pub fn for_tenant(client_id: impl Into<String>, tenant_id: &str) -> Self {
        Self::new(client_id, authority_for_tenant(tenant_id))
    }

    /// Authorization endpoint (where the browser is sent).
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.authority)
    }

    /// Token endpoint (where codes and refresh tokens are redeemed).
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority)
    }
}

/// Derive the authority URL for a tenant id or domain.
pub fn authority_for_tenant(tenant_id: &str) -> String {
    format!("{DEFAULT_LOGIN_HOST}/{}", tenant_id.trim())
}

/// Scope string sent to the provider: the caller's scopes followed by the
/// reserved OIDC scopes, deduplicated, space separated.
pub(crate) fn scope_param(scopes: &[String]) -> String {
    let mut all: Vec<&str> = Vec::with_capacity(scopes.len() + RESERVED_SCOPES.len());
    for scope in scopes.iter().map(String::as_str).chain(RESERVED_SCOPES) {
        if !all.iter().any(|s| s.eq_ignore_ascii_case(scope)) {
            all.push(scope);
        }
    }
    all.join(" ")
}
