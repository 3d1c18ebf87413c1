//! One-shot loopback listener receiving the authorization redirect.
//!
//! The browser is sent to the provider with `redirect_uri =
//! http://localhost:{port}`; once the user finishes, the provider redirects
//! back here with either `code` + `state` or `error` + `error_description`.
//! The first such request completes [`LoopbackRedirect::wait`]; the listener
//! is then torn down.
//!
//! There is no timeout; the wait lasts as long as the user takes.

use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::AcquireError;

const DONE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>foundry-probe</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>Sign-in complete</h2>
<p>You can close this tab and return to the terminal.</p>
</body>
</html>"#;

const WAITING_PAGE: &str = "<html><body><p>Waiting for sign-in…</p></body></html>";

/// Query parameters the provider appends to the redirect.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Turn the redirect into an authorization code, checking `state`.
    pub fn into_code(self, expected_state: &str) -> Result<String, AcquireError> {
        if let Some(error) = self.error {
            let description = self
                .error_description
                .unwrap_or_else(|| format!("sign-in ended with {error}"));
            return Err(if error == "access_denied" {
                AcquireError::InteractiveAuthCancelled(description)
            } else {
                AcquireError::ProviderError {
                    code: error,
                    description,
                }
            });
        }

        if self.state.as_deref() != Some(expected_state) {
            return Err(AcquireError::provider(
                "state_mismatch",
                "redirect state did not match the request",
            ));
        }

        self.code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AcquireError::provider("invalid_response", "redirect carried no code"))
    }

    fn is_final(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

type Slot = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// A running loopback listener.
pub struct LoopbackRedirect {
    redirect_uri: String,
    rx: oneshot::Receiver<CallbackParams>,
    server: JoinHandle<()>,
}

impl LoopbackRedirect {
    /// Bind an ephemeral port on 127.0.0.1 and start serving.
    pub async fn start() -> Result<Self, AcquireError> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let (tx, rx) = oneshot::channel();
        let slot: Slot = Arc::new(Mutex::new(Some(tx)));
        let app = Router::new().route("/", get(callback)).with_state(slot);

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!(error = %e, "loopback listener stopped");
            }
        });

        debug!(port, "loopback listener ready");
        Ok(Self {
            redirect_uri: format!("http://localhost:{port}"),
            rx,
            server,
        })
    }

    /// The `redirect_uri` to register with the authorization request.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Block until the provider redirects back.
    pub async fn wait(self) -> Result<CallbackParams, AcquireError> {
        let Self { rx, server, .. } = self;
        let result = rx.await;
        server.abort();
        result.map_err(|_| AcquireError::TransportError("loopback listener stopped early".into()))
    }
}

async fn callback(State(slot): State<Slot>, Query(params): Query<CallbackParams>) -> Html<&'static str> {
    if !params.is_final() {
        return Html(WAITING_PAGE);
    }
    let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(sender) = sender {
        let _ = sender.send(params);
    }
    Html(DONE_PAGE)
}
