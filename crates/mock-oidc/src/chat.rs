//! `POST /models/chat/completions`, answering like an API-management
//! fronted deployment.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use foundry_models::{ChatRequest, Role};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::MockState;

#[derive(Deserialize, Debug)]
pub(crate) struct ChatQuery {
    #[serde(rename = "api-version")]
    api_version: Option<String>,
}

pub(crate) async fn completions(
    State(state): State<Arc<MockState>>,
    Query(query): Query<ChatQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let authorized = bearer.is_some_and(|token| state.ledger().access_tokens.contains(token));
    if !authorized {
        return failure(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Access token is missing, invalid, audience is incorrect, or have expired.",
        );
    }

    if query.api_version.as_deref().is_none_or(str::is_empty) {
        return failure(
            StatusCode::BAD_REQUEST,
            "MissingApiVersionParameter",
            "The api-version query parameter (?api-version=) is required for all requests.",
        );
    }

    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return failure(StatusCode::BAD_REQUEST, "BadRequest", &e.to_string()),
    };

    if !state.models.iter().any(|m| m == &request.model) {
        return failure(
            StatusCode::NOT_FOUND,
            "DeploymentNotFound",
            &format!("The API deployment for model {} does not exist.", request.model),
        );
    }

    info!(model = %request.model, messages = request.messages.len(), "chat completion");

    let reply = format!(
        "Mock reply: {}",
        request.last_user_content().unwrap_or_default()
    );
    let prompt_tokens: usize = request
        .messages
        .iter()
        .map(|m| m.content.split_whitespace().count())
        .sum();
    let completion_tokens = reply.split_whitespace().count();

    Json(json!({
        "id": format!("chatcmpl-{}", Uuid::new_v4().simple()),
        "object": "chat.completion",
        "model": request.model,
        "choices": [{
            "index": 0,
            "finish_reason": "stop",
            "message": { "role": Role::Assistant, "content": reply }
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens
        }
    }))
    .into_response()
}

fn failure(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}
