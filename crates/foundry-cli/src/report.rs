//! Operator-facing report text.
//!
//! Every [`StatusCategory`] has its own [`Template`]; failures end with the
//! same troubleshooting checklist.

use foundry_auth::AcquireError;
use foundry_models::{ChatCompletion, ChatRequest};
use foundry_sdk::{ApiConfig, BearerSource, ProbeOutcome, StatusCategory};

use crate::probe::ProbeRun;

const RULE: &str = "============================================================";

const TROUBLESHOOTING: [&str; 5] = [
    "Check CLIENT_ID, TENANT_ID and OAUTH_SCOPE in the settings file.",
    "Check API_BASE, API_VERSION and DEFAULT_MODEL against the API's documentation.",
    "Make sure the sign-in in the browser completed with the intended account.",
    "Set APIM_BEARER_TOKEN to a known-good token to rule out the sign-in.",
    "Re-run with RUST_LOG=debug for detailed logs.",
];

/// Headline and guidance for one outcome category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    /// First line of the result block.
    pub headline: &'static str,
    /// What the category usually means and what to check.
    pub guidance: &'static str,
}

/// The template for `category`.
pub fn template(category: StatusCategory) -> Template {
    match category {
        StatusCategory::Success => Template {
            headline: "SUCCESS: the API answered 200 OK",
            guidance: "Authentication and routing are working.",
        },
        StatusCategory::AuthError => Template {
            headline: "AUTHENTICATION ERROR (401)",
            guidance: "The bearer token was rejected. Check that OAUTH_SCOPE is the scope the API \
                       expects, and that a token from APIM_BEARER_TOKEN has not expired.",
        },
        StatusCategory::ForbiddenError => Template {
            headline: "FORBIDDEN (403)",
            guidance: "The token was accepted but does not grant access. Ask for your account to \
                       be assigned the role or subscription the API requires.",
        },
        StatusCategory::NotFoundError => Template {
            headline: "NOT FOUND (404)",
            guidance: "Nothing answers at this URL. Check API_BASE and that the model is \
                       deployed under that name.",
        },
        StatusCategory::OtherHttpError => Template {
            headline: "HTTP ERROR",
            guidance: "The API answered with an unexpected status; the body below usually says why.",
        },
        StatusCategory::NetworkError => Template {
            headline: "NETWORK ERROR",
            guidance: "No response was received. Check API_BASE, VPN or proxy settings, and \
                       whether --timeout-secs is long enough.",
        },
        StatusCategory::UnexpectedError => Template {
            headline: "UNEXPECTED ERROR",
            guidance: "The request could not be sent. The detail below names the cause.",
        },
    }
}

/// Banner printed before the bearer is resolved.
pub fn render_header(api: &ApiConfig, request: &ChatRequest) -> String {
    let mut lines = vec![
        RULE.to_string(),
        "Chat completions API probe".to_string(),
        RULE.to_string(),
        format!("API base:    {}", api.base_url),
        format!("API version: {}", api.api_version),
        format!("Model:       {}", request.model),
        format!("Scopes:      {}", api.scopes.join(" ")),
    ];
    if let Some(prompt) = request.last_user_content() {
        lines.push(format!("Prompt:      {prompt}"));
    }
    lines.push(String::new());
    join_lines(&lines)
}

/// Result block for a finished run.
pub fn render_run(run: &ProbeRun) -> String {
    let mut lines = match run {
        ProbeRun::NoToken(error) => token_failure_lines(error),
        ProbeRun::Probed { source, outcome } => outcome_lines(*source, outcome),
    };
    if !run.succeeded() {
        lines.push(String::new());
        lines.push("Troubleshooting:".to_string());
        lines.extend(
            TROUBLESHOOTING
                .iter()
                .enumerate()
                .map(|(i, step)| format!("  {}. {step}", i + 1)),
        );
    }
    join_lines(&lines)
}

fn token_failure_lines(error: &AcquireError) -> Vec<String> {
    vec![
        format!("TOKEN ACQUISITION FAILED ({})", error.code()),
        error.description(),
        "The API was not called.".to_string(),
    ]
}

fn outcome_lines(source: BearerSource, outcome: &ProbeOutcome) -> Vec<String> {
    let template = template(outcome.category);
    let mut lines = vec![
        format!("Bearer token from {source}"),
        String::new(),
        template.headline.to_string(),
        template.guidance.to_string(),
    ];

    if let Some(completion) = &outcome.completion {
        lines.extend(completion_lines(completion));
        return lines;
    }

    if let Some(status) = outcome.status {
        lines.push(format!("Status: {status}"));
    }
    if let Some(body) = &outcome.body {
        lines.push("Response body:".to_string());
        lines.push(body.clone());
    }
    if let Some(detail) = &outcome.detail {
        lines.push(format!("Detail: {detail}"));
    }
    lines
}

fn completion_lines(completion: &ChatCompletion) -> Vec<String> {
    let mut lines = vec![String::new()];
    match &completion.content {
        Some(content) => {
            lines.push("AI response:".to_string());
            lines.push(content.clone());
        }
        None => lines.push("The response carried no message content.".to_string()),
    }
    if let Some(reasoning) = &completion.reasoning_content {
        lines.push(String::new());
        lines.push("Reasoning:".to_string());
        lines.push(reasoning.clone());
    }
    if let Some(usage) = &completion.usage {
        lines.push(format!("Usage: {usage}"));
    }
    if let Some(model) = &completion.model {
        lines.push(format!("Model: {model}"));
    }
    lines
}

/// Newline-terminated block.
fn join_lines(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
