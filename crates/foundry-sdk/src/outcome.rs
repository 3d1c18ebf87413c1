//! Probe outcome classification.
//!
//! | Status | Category |
//! |--------|----------|
//! | 200 | [`StatusCategory::Success`] |
//! | 401 | [`StatusCategory::AuthError`] |
//! | 403 | [`StatusCategory::ForbiddenError`] |
//! | 404 | [`StatusCategory::NotFoundError`] |
//! | any other | [`StatusCategory::OtherHttpError`] |
//! | no response (DNS, refused, timeout) | [`StatusCategory::NetworkError`] |
//! | request could not be built | [`StatusCategory::UnexpectedError`] |

use std::error::Error as _;

use foundry_models::ChatCompletion;
use strum::{AsRefStr, Display, EnumIter};

/// What kind of result the probe produced. Exactly one per outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum StatusCategory {
    /// HTTP 200.
    Success,
    /// HTTP 401: the bearer was rejected.
    AuthError,
    /// HTTP 403: the bearer is valid but lacks access.
    ForbiddenError,
    /// HTTP 404: wrong base URL, path or deployment.
    NotFoundError,
    /// Any other HTTP status.
    OtherHttpError,
    /// No HTTP response was received.
    NetworkError,
    /// The probe failed before a request could be sent.
    UnexpectedError,
}

impl StatusCategory {
    /// Category for an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => Self::Success,
            401 => Self::AuthError,
            403 => Self::ForbiddenError,
            404 => Self::NotFoundError,
            _ => Self::OtherHttpError,
        }
    }
}

/// Everything the probe learned, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// The classification.
    pub category: StatusCategory,
    /// HTTP status, when a response arrived.
    pub status: Option<u16>,
    /// Raw response body, unmodified.
    pub body: Option<String>,
    /// Fields extracted from a 200 body.
    pub completion: Option<ChatCompletion>,
    /// Transport or construction failure text.
    pub detail: Option<String>,
}

impl ProbeOutcome {
    /// Classify an HTTP response.
    pub fn from_response(status: u16, body: String) -> Self {
        let category = StatusCategory::from_status(status);
        let completion = (category == StatusCategory::Success).then(|| ChatCompletion::from_json(&body));
        Self {
            category,
            status: Some(status),
            body: Some(body),
            completion,
            detail: None,
        }
    }

    /// No response was received.
    pub fn network(detail: impl Into<String>) -> Self {
        Self::without_response(StatusCategory::NetworkError, detail)
    }

    /// The probe failed for a reason other than the network.
    pub fn unexpected(detail: impl Into<String>) -> Self {
        Self::without_response(StatusCategory::UnexpectedError, detail)
    }

    /// Classify a `reqwest` failure: request construction problems are
    /// unexpected, everything else happened on the wire.
    pub fn from_transport(error: &reqwest::Error) -> Self {
        let detail = error_chain(error);
        if error.is_builder() {
            Self::unexpected(detail)
        } else {
            Self::network(detail)
        }
    }

    /// Whether the probe succeeded.
    pub fn is_success(&self) -> bool {
        self.category == StatusCategory::Success
    }

    fn without_response(category: StatusCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            status: None,
            body: None,
            completion: None,
            detail: Some(detail.into()),
        }
    }
}

/// `error: cause: root cause`, so timeouts and refused connections are
/// visible in the one-line description.
fn error_chain(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_with_content_is_success() {
        let outcome = ProbeOutcome::from_response(
            200,
            r#"{"choices":[{"message":{"content":"hello"}}]}"#.into(),
        );
        assert_eq!(outcome.category, StatusCategory::Success);
        assert_eq!(
            outcome.completion.and_then(|c| c.content).as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn ok_with_unexpected_body_still_success() {
        let outcome = ProbeOutcome::from_response(200, "<html>gateway</html>".into());
        assert!(outcome.is_success());
        assert!(outcome.completion.unwrap().is_empty());
    }

    #[test]
    fn status_codes_map_to_categories() {
        let cases = [
            (401, StatusCategory::AuthError),
            (403, StatusCategory::ForbiddenError),
            (404, StatusCategory::NotFoundError),
            (500, StatusCategory::OtherHttpError),
            (429, StatusCategory::OtherHttpError),
            (201, StatusCategory::OtherHttpError),
        ];
        for (status, category) in cases {
            assert_eq!(StatusCategory::from_status(status), category, "status {status}");
        }
    }

    #[test]
    fn auth_error_ignores_body() {
        for body in ["", "{}", r#"{"choices":[{"message":{"content":"hello"}}]}"#] {
            let outcome = ProbeOutcome::from_response(401, body.into());
            assert_eq!(outcome.category, StatusCategory::AuthError);
            assert!(outcome.completion.is_none());
        }
    }

    #[test]
    fn failures_keep_status_and_raw_body() {
        let body = "{\"error\":{\"code\":\"DeploymentNotFound\"}}\n";
        let outcome = ProbeOutcome::from_response(404, body.into());
        assert_eq!(outcome.status, Some(404));
        assert_eq!(outcome.body.as_deref(), Some(body));

        let outcome = ProbeOutcome::from_response(500, "Internal Server Error".into());
        assert_eq!(outcome.category, StatusCategory::OtherHttpError);
        assert_eq!(outcome.status, Some(500));
        assert_eq!(outcome.body.as_deref(), Some("Internal Server Error"));
    }

    #[test]
    fn transport_outcomes_have_no_status() {
        let outcome = ProbeOutcome::network("connection refused");
        assert_eq!(outcome.category, StatusCategory::NetworkError);
        assert_eq!(outcome.status, None);
        assert_eq!(outcome.detail.as_deref(), Some("connection refused"));

        assert_eq!(
            ProbeOutcome::unexpected("bad header").category,
            StatusCategory::UnexpectedError
        );
    }
}
