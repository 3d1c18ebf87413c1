//! # Mock OIDC
//!
//! A local identity provider and chat-completions endpoint, good enough to
//! drive the probe and the token fetcher end to end without a cloud tenant.
//!
//! Routes (Microsoft identity platform v2.0 layout, any tenant name):
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /{tenant}/v2.0/.well-known/openid-configuration` | Discovery document |
//! | `GET /{tenant}/discovery/v2.0/keys` | JWKS with the RS256 signing key |
//! | `GET /{tenant}/oauth2/v2.0/authorize` | Auto-approves and redirects with a code |
//! | `POST /{tenant}/oauth2/v2.0/token` | `authorization_code` (PKCE) and `refresh_token` grants |
//! | `POST /models/chat/completions` | Canned completion for bearers issued here |
//!
//! Signing in with `login_hint=cancel` simulates the user declining consent.

use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

mod chat;
mod keys;

pub use keys::KEY_ID;

/// Username signed in when the authorize request carries no `login_hint`.
pub const DEFAULT_USERNAME: &str = "probe.user@contoso.test";

/// `login_hint` that makes the authorize endpoint report `access_denied`.
pub const CANCEL_LOGIN_HINT: &str = "cancel";

/// Deployments the chat endpoint knows about.
pub const DEFAULT_MODELS: [&str; 2] = ["gpt-4o", "grok-3-mini"];

/// Lifetime of issued access tokens.
const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Errors raised while setting the provider up.
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    /// The RSA signing key could not be generated.
    #[error("failed to generate signing key: {0}")]
    KeyGeneration(String),

    /// The listener could not be bound.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// An authorization code waiting to be redeemed.
#[derive(Debug, Clone)]
struct PendingCode {
    tenant: String,
    client_id: String,
    redirect_uri: String,
    code_challenge: String,
    username: String,
}

/// Who a refresh token was issued to.
#[derive(Debug, Clone)]
struct Grantee {
    tenant: String,
    client_id: String,
    username: String,
}

#[derive(Default)]
struct Ledger {
    codes: HashMap<String, PendingCode>,
    refresh_tokens: HashMap<String, Grantee>,
    access_tokens: HashSet<String>,
}

struct MockState {
    base_url: String,
    models: Vec<String>,
    ledger: Mutex<Ledger>,
    authorize_requests: AtomicUsize,
    refresh_requests: AtomicUsize,
}

impl MockState {
    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issuer(&self, tenant: &str) -> String {
        format!("{}/{tenant}/v2.0", self.base_url)
    }
}

/// Handle on a mock provider's state; cheap to clone.
#[derive(Clone)]
pub struct MockProvider {
    state: Arc<MockState>,
}

impl MockProvider {
    /// A provider whose URLs are rooted at `base_url`
    /// (e.g. `http://localhost:4000`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, MockError> {
        keys::signing_keys()?;
        Ok(Self {
            state: Arc::new(MockState {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                models: DEFAULT_MODELS.iter().map(|m| (*m).to_string()).collect(),
                ledger: Mutex::new(Ledger::default()),
                authorize_requests: AtomicUsize::new(0),
                refresh_requests: AtomicUsize::new(0),
            }),
        })
    }

    /// The axum router serving every route.
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/{tenant}/v2.0/.well-known/openid-configuration",
                get(openid_configuration),
            )
            .route("/{tenant}/discovery/v2.0/keys", get(jwks))
            .route("/{tenant}/oauth2/v2.0/authorize", get(authorize))
            .route("/{tenant}/oauth2/v2.0/token", post(token))
            .route("/models/chat/completions", post(chat::completions))
            .with_state(self.state.clone())
    }

    /// Root URL the provider was created with.
    pub fn base_url(&self) -> &str {
        &self.state.base_url
    }

    /// Authority URL for `tenant`.
    pub fn authority(&self, tenant: &str) -> String {
        format!("{}/{tenant}", self.state.base_url)
    }

    /// Base URL of the chat API (`…/chat/completions` is appended by clients).
    pub fn api_base(&self) -> String {
        format!("{}/models", self.state.base_url)
    }

    /// How many authorize requests (interactive sign-ins) were served.
    pub fn authorize_requests(&self) -> usize {
        self.state.authorize_requests.load(Ordering::SeqCst)
    }

    /// How many refresh-token grants were attempted.
    pub fn refresh_requests(&self) -> usize {
        self.state.refresh_requests.load(Ordering::SeqCst)
    }

    /// Invalidate every refresh token issued so far.
    pub fn revoke_refresh_tokens(&self) {
        self.state.ledger().refresh_tokens.clear();
    }

    /// Whether the chat endpoint would accept `access_token`.
    pub fn accepts_access_token(&self, access_token: &str) -> bool {
        self.state.ledger().access_tokens.contains(access_token)
    }
}

/// A provider serving on an ephemeral local port. Stops when dropped.
pub struct RunningMock {
    provider: MockProvider,
    server: JoinHandle<()>,
}

impl Deref for RunningMock {
    type Target = MockProvider;

    fn deref(&self) -> &MockProvider {
        &self.provider
    }
}

impl Drop for RunningMock {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Start a provider on `127.0.0.1:0`.
pub async fn spawn() -> Result<RunningMock, MockError> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let provider = MockProvider::new(format!("http://{addr}"))?;
    let app = provider.router();

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "mock provider stopped");
        }
    });

    Ok(RunningMock { provider, server })
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

async fn openid_configuration(
    State(state): State<Arc<MockState>>,
    Path(tenant): Path<String>,
) -> Json<Value> {
    let authority = format!("{}/{tenant}", state.base_url);
    Json(json!({
        "issuer": state.issuer(&tenant),
        "authorization_endpoint": format!("{authority}/oauth2/v2.0/authorize"),
        "token_endpoint": format!("{authority}/oauth2/v2.0/token"),
        "jwks_uri": format!("{authority}/discovery/v2.0/keys"),
        "response_types_supported": ["code"],
        "response_modes_supported": ["query"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256"],
        "subject_types_supported": ["pairwise"],
        "id_token_signing_alg_values_supported": ["RS256"],
        "scopes_supported": ["openid", "profile", "offline_access"]
    }))
}

async fn jwks() -> Response {
    match keys::signing_keys() {
        Ok(keys) => Json(json!({ "keys": [keys.public_jwk.clone()] })).into_response(),
        Err(e) => oauth_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", &e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Authorize
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
struct AuthorizeParams {
    client_id: Option<String>,
    redirect_uri: String,
    response_type: Option<String>,
    state: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
    login_hint: Option<String>,
}

async fn authorize(
    State(state): State<Arc<MockState>>,
    Path(tenant): Path<String>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    state.authorize_requests.fetch_add(1, Ordering::SeqCst);
    info!(%tenant, client_id = ?params.client_id, "authorize request");

    let Ok(redirect_uri) = Url::parse(&params.redirect_uri) else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "redirect_uri is not an absolute URL",
        );
    };
    let state_param = params.state.as_deref();
    let reply = |pairs: &[(&str, &str)]| redirect_back(&redirect_uri, pairs, state_param);

    if params.response_type.as_deref() != Some("code") {
        return reply(&[
            ("error", "unsupported_response_type"),
            ("error_description", "only response_type=code is supported"),
        ]);
    }

    if params.login_hint.as_deref() == Some(CANCEL_LOGIN_HINT) {
        return reply(&[
            ("error", "access_denied"),
            ("error_description", "the user declined to consent"),
        ]);
    }

    let (Some(client_id), Some(code_challenge), Some("S256")) = (
        params.client_id.clone(),
        params.code_challenge.clone(),
        params.code_challenge_method.as_deref(),
    ) else {
        return reply(&[
            ("error", "invalid_request"),
            ("error_description", "client_id and an S256 code_challenge are required"),
        ]);
    };

    let code = Uuid::new_v4().to_string();
    state.ledger().codes.insert(
        code.clone(),
        PendingCode {
            tenant,
            client_id,
            redirect_uri: params.redirect_uri.clone(),
            code_challenge,
            username: params
                .login_hint
                .clone()
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
        },
    );

    reply(&[("code", code.as_str())])
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
struct TokenRequest {
    grant_type: String,
    client_id: Option<String>,
    code: Option<String>,
    redirect_uri: Option<String>,
    code_verifier: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    oid: String,
    tid: String,
    aud: String,
    exp: i64,
    iat: i64,
    preferred_username: String,
    name: String,
}

async fn token(
    State(state): State<Arc<MockState>>,
    Path(tenant): Path<String>,
    Form(req): Form<TokenRequest>,
) -> Response {
    info!(%tenant, grant_type = %req.grant_type, "token request");

    let grantee = match req.grant_type.as_str() {
        "authorization_code" => redeem_code(&state, &tenant, &req),
        "refresh_token" => {
            state.refresh_requests.fetch_add(1, Ordering::SeqCst);
            redeem_refresh_token(&state, &tenant, &req)
        }
        other => Err(oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            &format!("grant_type {other} is not supported"),
        )),
    };

    match grantee {
        Ok(grantee) => issue(&state, &grantee),
        Err(response) => response,
    }
}

fn redeem_code(state: &MockState, tenant: &str, req: &TokenRequest) -> Result<Grantee, Response> {
    let invalid_grant = |description: &str| oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", description);

    let pending = req
        .code
        .as_deref()
        .and_then(|code| state.ledger().codes.remove(code))
        .ok_or_else(|| invalid_grant("authorization code is unknown or already redeemed"))?;

    if pending.tenant != tenant || req.client_id.as_deref() != Some(pending.client_id.as_str()) {
        return Err(invalid_grant("authorization code was issued to another client"));
    }
    if req.redirect_uri.as_deref() != Some(pending.redirect_uri.as_str()) {
        return Err(invalid_grant("redirect_uri does not match the authorize request"));
    }

    let verifier = req.code_verifier.as_deref().unwrap_or_default();
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    if challenge != pending.code_challenge {
        return Err(invalid_grant("PKCE verification failed"));
    }

    Ok(Grantee {
        tenant: pending.tenant,
        client_id: pending.client_id,
        username: pending.username,
    })
}

fn redeem_refresh_token(state: &MockState, tenant: &str, req: &TokenRequest) -> Result<Grantee, Response> {
    let grantee = req
        .refresh_token
        .as_deref()
        .and_then(|rt| state.ledger().refresh_tokens.remove(rt))
        .ok_or_else(|| {
            oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_grant",
                "refresh token is revoked, expired or unknown",
            )
        })?;

    if grantee.tenant != tenant || req.client_id.as_deref() != Some(grantee.client_id.as_str()) {
        return Err(oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            "refresh token was issued to another client",
        ));
    }
    Ok(grantee)
}

fn issue(state: &MockState, grantee: &Grantee) -> Response {
    let keys = match keys::signing_keys() {
        Ok(keys) => keys,
        Err(e) => return oauth_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", &e.to_string()),
    };

    let now = Utc::now();
    let object_id = object_id(&grantee.tenant, &grantee.username);
    let claims = IdTokenClaims {
        iss: state.issuer(&grantee.tenant),
        sub: object_id.clone(),
        oid: object_id,
        tid: grantee.tenant.clone(),
        aud: grantee.client_id.clone(),
        exp: (now + Duration::seconds(ACCESS_TOKEN_TTL_SECS)).timestamp(),
        iat: now.timestamp(),
        preferred_username: grantee.username.clone(),
        name: display_name(&grantee.username),
    };
    let header = Header {
        kid: Some(KEY_ID.to_string()),
        alg: Algorithm::RS256,
        ..Default::default()
    };
    let id_token = match encode(&header, &claims, &keys.encoding_key) {
        Ok(token) => token,
        Err(e) => return oauth_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", &e.to_string()),
    };

    let access_token = format!("mock_at_{}", Uuid::new_v4().simple());
    let refresh_token = format!("mock_rt_{}", Uuid::new_v4().simple());
    {
        let mut ledger = state.ledger();
        ledger.access_tokens.insert(access_token.clone());
        ledger.refresh_tokens.insert(refresh_token.clone(), grantee.clone());
    }

    Json(json!({
        "token_type": "Bearer",
        "access_token": access_token,
        "refresh_token": refresh_token,
        "id_token": id_token,
        "expires_in": ACCESS_TOKEN_TTL_SECS
    }))
    .into_response()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn oauth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({ "error": error, "error_description": description })),
    )
        .into_response()
}

/// Stable per-user object id.
fn object_id(tenant: &str, username: &str) -> String {
    let digest = Sha256::digest(format!("{tenant}/{username}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// `ada.lovelace@contoso.test` → `Ada Lovelace`.
fn display_name(username: &str) -> String {
    let local = username.split('@').next().unwrap_or(username);
    local
        .split(['.', '_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Redirect to the client's `redirect_uri` with `pairs` appended to its
/// query, echoing `state` when sent.
fn redirect_back(redirect_uri: &Url, pairs: &[(&str, &str)], state: Option<&str>) -> Response {
    let mut target = redirect_uri.clone();
    {
        let mut query = target.query_pairs_mut();
        query.extend_pairs(pairs);
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Redirect::to(target.as_str()).into_response()
}
