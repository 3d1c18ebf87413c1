//! `foundry-probe probe`: acquire a bearer, send one chat completion,
//! classify the answer.

use std::time::Duration;

use clap::Args;
use foundry_auth::{AcquireError, IdentityClient, Interaction, PublicClientApp};
use foundry_models::{ChatRequest, ModelError, DEFAULT_MAX_TOKENS, DEFAULT_PROMPT, DEFAULT_TEMPERATURE};
use foundry_sdk::{resolve_bearer, ApiConfig, BearerSource, ChatProbe, ProbeOutcome, SdkError, BEARER_ENV};
use tracing::warn;

use crate::report;
use crate::settings::Settings;
use crate::AuthArgs;

/// Arguments of the `probe` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// User message sent to the model.
    #[arg(long, default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// System message placed before the user message.
    #[arg(long)]
    pub system: Option<String>,

    /// Deployment to call (defaults to DEFAULT_MODEL from the settings file).
    #[arg(long)]
    pub model: Option<String>,

    /// Completion token cap.
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_tokens: u32,

    /// Sampling temperature, 0.0 to 2.0.
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE, value_parser = parse_temperature)]
    pub temperature: f32,

    /// Timeout for the API request, in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    #[command(flatten)]
    pub auth: AuthArgs,
}

impl ProbeArgs {
    /// The chat request these arguments describe.
    pub fn request(&self, default_model: &str) -> Result<ChatRequest, ModelError> {
        let model = self.model.as_deref().unwrap_or(default_model);
        let mut builder = ChatRequest::builder(model);
        if let Some(system) = &self.system {
            builder = builder.system(system.as_str());
        }
        builder
            .user(self.prompt.as_str())
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()
    }
}

fn parse_temperature(raw: &str) -> Result<f32, String> {
    let value: f32 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=2.0).contains(&value) {
        Ok(value)
    } else {
        Err(ModelError::InvalidTemperature { value }.to_string())
    }
}

/// What a probe run produced.
#[derive(Debug)]
pub enum ProbeRun {
    /// No bearer could be obtained; the API was never called.
    NoToken(AcquireError),
    /// The API was called with a bearer from `source`.
    Probed {
        /// Where the bearer came from.
        source: BearerSource,
        /// The classified answer.
        outcome: ProbeOutcome,
    },
}

impl ProbeRun {
    /// Whether the API answered 200.
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Probed { outcome, .. } if outcome.is_success())
    }
}

/// Resolve the bearer (environment first) and send `request`.
pub async fn execute<C: IdentityClient>(
    api: ApiConfig,
    client: &C,
    request: &ChatRequest,
    env_bearer: Option<String>,
    interaction: Interaction,
) -> Result<ProbeRun, SdkError> {
    let probe = ChatProbe::new(api)?;

    let bearer = match resolve_bearer(env_bearer, client, &probe.config().scopes, interaction).await {
        Ok(bearer) => bearer,
        Err(e) => {
            warn!(code = e.code(), "token acquisition failed");
            return Ok(ProbeRun::NoToken(e));
        }
    };

    let outcome = probe.probe(&bearer.token, request).await;
    Ok(ProbeRun::Probed {
        source: bearer.source,
        outcome,
    })
}

/// Run the subcommand and report. Returns whether the probe succeeded.
pub async fn run(settings: &Settings, args: &ProbeArgs) -> anyhow::Result<bool> {
    // Both halves are validated before anything touches the network.
    let auth = settings.auth_config()?;
    let api = settings
        .api_config()?
        .with_timeout(Duration::from_secs(args.timeout_secs));
    let request = args.request(&api.default_model)?;

    print!("{}", report::render_header(&api, &request));

    let client = PublicClientApp::new(auth, settings.token_cache())
        .with_login_hint(args.auth.login_hint.clone());
    let run = execute(
        api,
        &client,
        &request,
        std::env::var(BEARER_ENV).ok(),
        args.auth.interaction(),
    )
    .await?;

    print!("{}", report::render_run(&run));
    Ok(run.succeeded())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clap::Parser;
    use foundry_auth::{AuthConfig, BrowserLauncher, TokenCache};
    use foundry_sdk::StatusCategory;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        probe: ProbeArgs,
    }

    fn parse(args: &[&str]) -> Result<ProbeArgs, clap::Error> {
        Harness::try_parse_from(std::iter::once("probe").chain(args.iter().copied())).map(|h| h.probe)
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

    fn client(mock: &mock_oidc::RunningMock) -> PublicClientApp {
        PublicClientApp::new(
            AuthConfig::new("client-1", mock.authority("tenant-1")),
            TokenCache::in_memory(),
        )
        .with_browser_launcher(headless_browser())
    }

    fn api(mock: &mock_oidc::RunningMock) -> ApiConfig {
        ApiConfig::new(
            mock.api_base(),
            "2024-05-01-preview",
            "gpt-4o",
            vec!["client-1/access_api".into()],
        )
    }

    #[test]
    fn defaults_match_reference_request() {
        let args = parse(&[]).unwrap();
        let request = args.request("gpt-4o").unwrap();
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.max_tokens, 100);
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.last_user_content(), Some(DEFAULT_PROMPT));
        assert_eq!(args.auth.interaction(), Interaction::Allowed);
    }

    #[test]
    fn system_and_model_flags() {
        let args = parse(&[
            "--system",
            "Be terse.",
            "--model",
            "grok-3-mini",
            "--prompt",
            "hi",
            "--silent-only",
        ])
        .unwrap();
        let request = args.request("gpt-4o").unwrap();
        assert_eq!(request.model, "grok-3-mini");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].content, "Be terse.");
        assert_eq!(args.auth.interaction(), Interaction::Never);
    }

    #[test]
    fn out_of_range_values_rejected_at_parse_time() {
        assert!(parse(&["--temperature", "2.5"]).is_err());
        assert!(parse(&["--temperature", "warm"]).is_err());
        assert!(parse(&["--max-tokens", "0"]).is_err());
        assert!(parse(&["--temperature", "2.0"]).is_ok());
    }

    #[tokio::test]
    async fn end_to_end_against_mock() {
        let mock = mock_oidc::spawn().await.unwrap();
        let client = client(&mock);
        let request = ChatRequest::builder("gpt-4o").user("ping").build().unwrap();

        let run = execute(api(&mock), &client, &request, None, Interaction::Allowed)
            .await
            .unwrap();
        let ProbeRun::Probed { source, outcome } = run else {
            panic!("expected the API to be called");
        };
        assert_eq!(source, BearerSource::IdentityProvider);
        assert_eq!(outcome.category, StatusCategory::Success);
        assert_eq!(
            outcome.completion.and_then(|c| c.content).as_deref(),
            Some("Mock reply: ping")
        );
        assert_eq!(mock.authorize_requests(), 1);
    }

    #[tokio::test]
    async fn environment_bearer_skips_sign_in() {
        let mock = mock_oidc::spawn().await.unwrap();
        let client = client(&mock);
        let request = ChatRequest::builder("gpt-4o").user("ping").build().unwrap();

        let run = execute(
            api(&mock),
            &client,
            &request,
            Some("not-issued-by-mock".into()),
            Interaction::Allowed,
        )
        .await
        .unwrap();

        let ProbeRun::Probed { source, outcome } = run else {
            panic!("expected the API to be called");
        };
        assert_eq!(source, BearerSource::Environment);
        assert_eq!(outcome.category, StatusCategory::AuthError);
        assert_eq!(mock.authorize_requests(), 0);
    }

    #[tokio::test]
    async fn unknown_deployment_is_not_found() {
        let mock = mock_oidc::spawn().await.unwrap();
        let client = client(&mock);
        let request = ChatRequest::builder("gpt-2").user("ping").build().unwrap();

        let run = execute(api(&mock), &client, &request, None, Interaction::Allowed)
            .await
            .unwrap();
        assert!(!run.succeeded());
        let ProbeRun::Probed { outcome, .. } = run else {
            panic!("expected a probe");
        };
        assert_eq!(outcome.category, StatusCategory::NotFoundError);
        assert_eq!(outcome.status, Some(404));
    }

    #[tokio::test]
    async fn silent_only_without_cache_never_calls_api() {
        let mock = mock_oidc::spawn().await.unwrap();
        let client = client(&mock);
        let request = ChatRequest::builder("gpt-4o").user("ping").build().unwrap();

        let run = execute(api(&mock), &client, &request, None, Interaction::Never)
            .await
            .unwrap();
        assert!(matches!(run, ProbeRun::NoToken(AcquireError::NoCachedAccount)));
        assert_eq!(mock.authorize_requests(), 0);
    }

    #[tokio::test]
    async fn missing_settings_fail_before_network() {
        let settings = Settings::from_pairs("confidential.env", [("CLIENT_ID", "c")]);
        let args = parse(&[]).unwrap();
        let err = run(&settings, &args).await.unwrap_err();
        assert!(err.downcast_ref::<crate::settings::SettingsError>().is_some());
    }
}
