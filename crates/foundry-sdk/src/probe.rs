//! The chat-completions probe.
//!
//! One POST, one classified [`ProbeOutcome`]. Nothing is retried.

use foundry_models::{ChatRequest, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::error::SdkError;
use crate::outcome::ProbeOutcome;

/// Sends probe requests for one [`ApiConfig`].
#[derive(Debug, Clone)]
pub struct ChatProbe {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ChatProbe {
    /// Build a probe whose HTTP client enforces `config.timeout`.
    pub fn new(config: ApiConfig) -> Result<Self, SdkError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// The configuration this probe was built with.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// A single-user-message request for the default model with the default
    /// token cap and temperature.
    pub fn default_request(&self, prompt: &str) -> Result<ChatRequest, SdkError> {
        Ok(ChatRequest::builder(self.config.default_model.as_str())
            .user(prompt)
            .max_tokens(DEFAULT_MAX_TOKENS)
            .temperature(DEFAULT_TEMPERATURE)
            .build()?)
    }

    /// POST `request` with `bearer` and classify whatever comes back.
    pub async fn probe(&self, bearer: &str, request: &ChatRequest) -> ProbeOutcome {
        let url = match self.config.chat_completions_url() {
            Ok(url) => url,
            Err(e) => return ProbeOutcome::unexpected(e.to_string()),
        };

        info!(
            %url,
            model = %request.model,
            timeout_secs = self.config.timeout.as_secs(),
            "sending chat completion probe"
        );

        let response = match self
            .http
            .post(url)
            .bearer_auth(bearer)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::from_transport(&e),
        };

        let status = response.status().as_u16();
        debug!(status, "probe response received");

        match response.text().await {
            Ok(body) => ProbeOutcome::from_response(status, body),
            Err(e) => ProbeOutcome::from_transport(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::outcome::StatusCategory;

    /// Serve `app` on an ephemeral port and return the API base URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/models")
    }

    fn probe_for(base: &str) -> ChatProbe {
        ChatProbe::new(ApiConfig::new(
            base,
            "2024-05-01-preview",
            "gpt-4o",
            vec!["api://x/.default".into()],
        ))
        .unwrap()
    }

    fn fixed(status: StatusCode, body: &'static str) -> Router {
        Router::new().route(
            "/models/chat/completions",
            post(move || async move { (status, body) }),
        )
    }

    #[tokio::test]
    async fn success_echoes_request_shape() {
        let app = Router::new().route(
            "/models/chat/completions",
            post(
                |Query(q): Query<std::collections::HashMap<String, String>>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    assert_eq!(q["api-version"], "2024-05-01-preview");
                    assert_eq!(headers["authorization"], "Bearer tok-1");
                    assert_eq!(body["messages"][0]["role"], "user");
                    assert_eq!(body["max_tokens"], 100);
                    Json(json!({
                        "choices": [{"message": {"content": "hello", "reasoning_content": "thought"}}],
                        "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4},
                        "model": body["model"].clone()
                    }))
                },
            ),
        );
        let probe = probe_for(&serve(app).await);
        let request = probe.default_request("hi").unwrap();

        let outcome = probe.probe("tok-1", &request).await;
        assert_eq!(outcome.category, StatusCategory::Success);
        let completion = outcome.completion.unwrap();
        assert_eq!(completion.content.as_deref(), Some("hello"));
        assert_eq!(completion.reasoning_content.as_deref(), Some("thought"));
        assert_eq!(completion.model.as_deref(), Some("gpt-4o"));
        assert_eq!(completion.usage.unwrap().total_tokens, Some(4));
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        let cases = [
            (StatusCode::UNAUTHORIZED, StatusCategory::AuthError),
            (StatusCode::FORBIDDEN, StatusCategory::ForbiddenError),
            (StatusCode::NOT_FOUND, StatusCategory::NotFoundError),
            (StatusCode::INTERNAL_SERVER_ERROR, StatusCategory::OtherHttpError),
        ];
        for (status, category) in cases {
            let probe = probe_for(&serve(fixed(status, "nope")).await);
            let request = probe.default_request("hi").unwrap();
            let outcome = probe.probe("tok", &request).await;
            assert_eq!(outcome.category, category);
            assert_eq!(outcome.status, Some(status.as_u16()));
            assert_eq!(outcome.body.as_deref(), Some("nope"));
        }
    }

    #[tokio::test]
    async fn timeout_is_network_error() {
        let app = Router::new().route(
            "/models/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(app).await;
        let probe = ChatProbe::new(
            ApiConfig::new(&base, "v", "gpt-4o", vec![]).with_timeout(Duration::from_millis(200)),
        )
        .unwrap();
        let request = probe.default_request("hi").unwrap();

        let outcome = probe.probe("tok", &request).await;
        assert_eq!(outcome.category, StatusCategory::NetworkError);
        assert!(outcome.status.is_none());
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = probe_for(&format!("http://{addr}/models"));
        let request = probe.default_request("hi").unwrap();
        let outcome = probe.probe("tok", &request).await;
        assert_eq!(outcome.category, StatusCategory::NetworkError);
    }

    #[tokio::test]
    async fn unusable_base_url_is_unexpected() {
        let probe = probe_for("::not a url::");
        let request = probe.default_request("hi").unwrap();
        let outcome = probe.probe("tok", &request).await;
        assert_eq!(outcome.category, StatusCategory::UnexpectedError);
    }

    #[tokio::test]
    async fn invalid_bearer_is_unexpected() {
        let probe = probe_for("http://127.0.0.1:9/models");
        let request = probe.default_request("hi").unwrap();
        // Header values cannot contain newlines; reqwest rejects the request
        // before sending it.
        let outcome = probe.probe("tok\nbroken", &request).await;
        assert_eq!(outcome.category, StatusCategory::UnexpectedError);
    }
}
