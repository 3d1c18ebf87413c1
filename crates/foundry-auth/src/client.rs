//! Public-client identity application.
//!
//! [`PublicClientApp`] implements [`IdentityClient`] against a real
//! OAuth2 / OpenID-Connect provider:
//!
//! * **silent**: serve a fresh cached access token, or redeem the cached
//!   refresh token;
//! * **interactive**: authorization-code grant with PKCE, the browser
//!   redirecting back to a [`LoopbackRedirect`].
//!
//! Every grant is written back to the [`TokenCache`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::acquire::IdentityClient;
use crate::cache::TokenCache;
use crate::claims::{Account, account_from_id_token};
use crate::config::{AuthConfig, scope_param};
use crate::error::AcquireError;
use crate::loopback::LoopbackRedirect;
use crate::oidc::{self, TokenGrant};
use crate::pkce::{PkceCodes, generate_pkce, generate_state};
use crate::token::AccessToken;

/// Opens the authorization URL for the user.
pub type BrowserLauncher = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// A public (secret-less) client registered with the identity provider.
pub struct PublicClientApp {
    config: AuthConfig,
    http: reqwest::Client,
    cache: Mutex<TokenCache>,
    launcher: BrowserLauncher,
    login_hint: Option<String>,
}

impl PublicClientApp {
    /// Create a client backed by `cache`, opening the system browser for
    /// interactive sign-in.
    pub fn new(config: AuthConfig, cache: TokenCache) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            cache: Mutex::new(cache),
            launcher: Arc::new(|url: &str| webbrowser::open(url)),
            login_hint: None,
        }
    }

    /// Replace the way the authorization URL is opened.
    #[must_use]
    pub fn with_browser_launcher(mut self, launcher: BrowserLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    /// Pre-fill the sign-in page with this username.
    #[must_use]
    pub fn with_login_hint(mut self, login_hint: Option<String>) -> Self {
        self.login_hint = login_hint.filter(|h| !h.trim().is_empty());
        self
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    fn cache(&self) -> MutexGuard<'_, TokenCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn authorize_url(
        &self,
        scopes: &[String],
        redirect_uri: &str,
        pkce: &PkceCodes,
        state: &str,
    ) -> Result<reqwest::Url, AcquireError> {
        let mut url = reqwest::Url::parse(&self.config.authorize_endpoint())
            .map_err(|e| AcquireError::provider("invalid_authority", e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_mode", "query")
                .append_pair("scope", &scope_param(scopes))
                .append_pair("state", state)
                .append_pair("code_challenge", &pkce.code_challenge)
                .append_pair("code_challenge_method", "S256")
                .append_pair("prompt", "select_account");
            if let Some(hint) = &self.login_hint {
                query.append_pair("login_hint", hint);
            }
        }
        Ok(url)
    }

    /// Cache a grant under the account it identifies (or `known`, for
    /// refreshes that carry no id_token) and hand back its access token.
    fn remember(&self, scopes: &[String], grant: TokenGrant, known: Option<&Account>) -> AccessToken {
        let account = grant
            .id_token
            .as_deref()
            .and_then(account_from_id_token)
            .or_else(|| known.cloned());

        match account {
            Some(account) => {
                self.cache().store(
                    &self.config,
                    &account,
                    scopes,
                    &grant.access_token,
                    grant.refresh_token,
                );
                debug!(account = %account.username, "token cached");
            }
            None => warn!("token response carried no usable id_token, account not cached"),
        }
        grant.access_token
    }
}

impl IdentityClient for PublicClientApp {
    fn accounts(&self) -> Vec<Account> {
        self.cache().accounts(&self.config)
    }

    async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: &Account,
    ) -> Result<Option<AccessToken>, AcquireError> {
        let (cached, refresh_token) = {
            let cache = self.cache();
            (
                cache.access_token(&self.config, account, scopes, Utc::now()),
                cache.refresh_token(&self.config, account),
            )
        };

        if let Some(token) = cached {
            debug!(account = %account.username, "serving access token from cache");
            return Ok(Some(token));
        }

        let Some(refresh_token) = refresh_token else {
            debug!(account = %account.username, "no refresh token cached");
            return Ok(None);
        };

        match oidc::redeem_refresh_token(&self.http, &self.config, &refresh_token, scopes).await {
            Ok(grant) => Ok(Some(self.remember(scopes, grant, Some(account)))),
            Err(AcquireError::ProviderError { code, description }) => {
                info!(%code, %description, "refresh token rejected");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn acquire_token_interactive(
        &self,
        scopes: &[String],
    ) -> Result<AccessToken, AcquireError> {
        let pkce = generate_pkce();
        let state = generate_state();

        let redirect = LoopbackRedirect::start().await?;
        let redirect_uri = redirect.redirect_uri().to_string();
        let url = self.authorize_url(scopes, &redirect_uri, &pkce, &state)?;

        info!(redirect_uri = %redirect_uri, "opening browser for interactive sign-in");
        if let Err(e) = (self.launcher)(url.as_str()) {
            warn!(error = %e, "could not open a browser");
            eprintln!("Open this URL in a browser to sign in:\n\n    {url}\n");
        }

        let code = redirect.wait().await?.into_code(&state)?;
        debug!("authorization code received");

        let grant = oidc::redeem_authorization_code(
            &self.http,
            &self.config,
            &code,
            &pkce.code_verifier,
            &redirect_uri,
            scopes,
        )
        .await?;

        Ok(self.remember(scopes, grant, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::{Interaction, acquire_token};

    /// Follows the authorization URL the way a browser would, without a UI.
    fn headless_browser() -> BrowserLauncher {
        Arc::new(|url: &str| {
            let url = url.to_string();
            tokio::spawn(async move {
                let _ = reqwest::get(url).await;
            });
            Ok(())
        })
    }

    fn scopes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn app(mock: &mock_oidc::RunningMock, cache: TokenCache) -> PublicClientApp {
        PublicClientApp::new(AuthConfig::new("client-1", mock.authority("tenant-1")), cache)
            .with_browser_launcher(headless_browser())
    }

    #[tokio::test]
    async fn interactive_then_silent_from_cache() {
        let mock = mock_oidc::spawn().await.unwrap();
        let app = app(&mock, TokenCache::in_memory());
        let wanted = scopes(&["client-1/access_api"]);

        let first = acquire_token(&app, &wanted, Interaction::Allowed)
            .await
            .unwrap();
        assert!(first.is_fresh(Utc::now()));
        assert_eq!(mock.authorize_requests(), 1);

        let accounts = app.accounts();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].username, mock_oidc::DEFAULT_USERNAME);

        let second = acquire_token(&app, &wanted, Interaction::Allowed)
            .await
            .unwrap();
        assert_eq!(second.secret, first.secret);
        assert_eq!(mock.authorize_requests(), 1);
    }

    #[tokio::test]
    async fn silent_refresh_for_new_scope_across_runs() {
        let mock = mock_oidc::spawn().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let first_run = app(&mock, TokenCache::load(&path));
        acquire_token(&first_run, &scopes(&["api/read"]), Interaction::Allowed)
            .await
            .unwrap();
        drop(first_run);

        // A later process: only the file carries the account over.
        let second_run = app(&mock, TokenCache::load(&path));
        let token = acquire_token(&second_run, &scopes(&["api/write"]), Interaction::Never)
            .await
            .unwrap();
        assert!(mock.accepts_access_token(&token.secret));
        assert_eq!(mock.authorize_requests(), 1);
        assert_eq!(mock.refresh_requests(), 1);
    }

    #[tokio::test]
    async fn revoked_refresh_token_denies_silent() {
        let mock = mock_oidc::spawn().await.unwrap();
        let app = app(&mock, TokenCache::in_memory());

        acquire_token(&app, &scopes(&["api/read"]), Interaction::Allowed)
            .await
            .unwrap();
        mock.revoke_refresh_tokens();

        let err = acquire_token(&app, &scopes(&["api/other"]), Interaction::Never)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "silent_auth_denied");
    }

    #[tokio::test]
    async fn declined_consent_is_cancellation() {
        let mock = mock_oidc::spawn().await.unwrap();
        let app = app(&mock, TokenCache::in_memory())
            .with_login_hint(Some(mock_oidc::CANCEL_LOGIN_HINT.to_string()));

        let err = acquire_token(&app, &scopes(&["api/read"]), Interaction::Allowed)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::InteractiveAuthCancelled(_)));
        assert!(app.accounts().is_empty());
    }

    #[tokio::test]
    async fn unreachable_provider_is_transport_error() {
        let config = AuthConfig::new("client-1", "http://127.0.0.1:9/tenant-1");
        let err = oidc::redeem_refresh_token(
            &reqwest::Client::new(),
            &config,
            "rt",
            &scopes(&["api/read"]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "transport_error");
    }

    #[test]
    fn authorize_url_carries_pkce_and_hint() {
        let app = PublicClientApp::new(
            AuthConfig::new("client-1", "https://login.example.com/t"),
            TokenCache::in_memory(),
        )
        .with_login_hint(Some("ada@contoso.com".into()));
        let pkce = generate_pkce();

        let url = app
            .authorize_url(&scopes(&["api/read"]), "http://localhost:5000", &pkce, "st")
            .unwrap();
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/t/oauth2/v2.0/authorize");
        assert_eq!(query["client_id"], "client-1");
        assert_eq!(query["scope"], "api/read openid profile offline_access");
        assert_eq!(query["code_challenge"], pkce.code_challenge);
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["state"], "st");
        assert_eq!(query["login_hint"], "ada@contoso.com");
    }
}
