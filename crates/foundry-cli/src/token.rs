//! `foundry-probe token`: print a bearer token as one JSON object.
//!
//! Stdout carries only the JSON report; logs go to stderr.

use clap::Args;
use foundry_auth::{acquire_token, IdentityClient, Interaction, PublicClientApp};
use foundry_models::TokenReport;
use tracing::{info, warn};

use crate::settings::Settings;
use crate::AuthArgs;

/// Arguments of the `token` subcommand.
#[derive(Args, Debug, Clone)]
pub struct TokenArgs {
    /// OAuth scope to request; repeat for several.
    #[arg(long, required = true)]
    pub scope: Vec<String>,

    #[command(flatten)]
    pub auth: AuthArgs,
}

/// Acquire a token and express the result as a [`TokenReport`].
pub async fn fetch<C: IdentityClient>(
    client: &C,
    scopes: &[String],
    interaction: Interaction,
) -> TokenReport {
    match acquire_token(client, scopes, interaction).await {
        Ok(token) => {
            info!(expires_on = %token.expires_on, "token issued");
            TokenReport::issued(token.secret, token.expires_on)
        }
        Err(e) => {
            warn!(code = e.code(), "token acquisition failed");
            TokenReport::failed(e.code(), e.description())
        }
    }
}

/// Run the subcommand. Returns whether a token was issued.
pub async fn run(settings: &Settings, args: &TokenArgs) -> anyhow::Result<bool> {
    let auth = settings.auth_config()?;
    let client = PublicClientApp::new(auth, settings.token_cache())
        .with_login_hint(args.auth.login_hint.clone());

    let report = fetch(&client, &args.scope, args.auth.interaction()).await;
    println!("{}", serde_json::to_string(&report)?);
    Ok(report.is_success())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clap::Parser;
    use foundry_auth::{AuthConfig, BrowserLauncher, TokenCache};
    use serde_json::Value;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        token: TokenArgs,
    }

    fn headless_browser() -> BrowserLauncher {
        Arc::new(|url: &str| {
            let url = url.to_string();
            tokio::spawn(async move {
                let _ = reqwest::get(url).await;
            });
            Ok(())
        })
    }

    fn scopes() -> Vec<String> {
        vec!["client-1/access_api".into()]
    }

    #[test]
    fn scope_is_required() {
        assert!(Harness::try_parse_from(["token"]).is_err());
        let parsed = Harness::try_parse_from(["token", "--scope", "a", "--scope", "b"]).unwrap();
        assert_eq!(parsed.token.scope, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn issued_report_then_silent_reuse() {
        let mock = mock_oidc::spawn().await.unwrap();
        let client = PublicClientApp::new(
            AuthConfig::new("client-1", mock.authority("tenant-1")),
            TokenCache::in_memory(),
        )
        .with_browser_launcher(headless_browser());

        let first = fetch(&client, &scopes(), Interaction::Allowed).await;
        let json: Value = serde_json::to_value(&first).unwrap();
        assert_eq!(json["success"], true);
        let token = json["access_token"].as_str().unwrap();
        assert!(mock.accepts_access_token(token));
        assert!(json["expires_on"].as_i64().unwrap() > chrono::Utc::now().timestamp());

        let second = fetch(&client, &scopes(), Interaction::Never).await;
        assert_eq!(second, first);
        assert_eq!(mock.authorize_requests(), 1);
    }

    #[tokio::test]
    async fn cancelled_sign_in_reports_failure() {
        let mock = mock_oidc::spawn().await.unwrap();
        let client = PublicClientApp::new(
            AuthConfig::new("client-1", mock.authority("tenant-1")),
            TokenCache::in_memory(),
        )
        .with_browser_launcher(headless_browser())
        .with_login_hint(Some(mock_oidc::CANCEL_LOGIN_HINT.into()));

        let report = fetch(&client, &scopes(), Interaction::Allowed).await;
        let json: Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "interactive_auth_cancelled");
        assert_eq!(json["error_description"], "the user declined to consent");
        assert!(json.get("access_token").is_none());
    }

    #[tokio::test]
    async fn silent_only_without_cache() {
        let client = PublicClientApp::new(
            AuthConfig::new("client-1", "http://127.0.0.1:9/tenant-1"),
            TokenCache::in_memory(),
        );
        let report = fetch(&client, &scopes(), Interaction::Never).await;
        assert_eq!(
            report,
            TokenReport::failed(
                "no_cached_account",
                "no cached account is available for silent sign-in"
            )
        );
    }
}
