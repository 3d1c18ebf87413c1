//! Chat-completion request and response types.
//!
//! The request side is strict: [`ChatRequestBuilder`] validates the token cap
//! and temperature before anything goes on the wire. The response side is the
//! opposite: [`ChatCompletion`] is decoded field by field from a
//! [`serde_json::Value`] so that a missing or reshaped field degrades to
//! `None` instead of failing the whole decode.
//!
//! # Examples
//!
//! ```
//! use foundry_models::{ChatCompletion, ChatRequest, Role};
//!
//! let request = ChatRequest::builder("gpt-4.1")
//!     .system("You are a copy editor.")
//!     .user("Make this sound professional.")
//!     .build()
//!     .unwrap();
//! assert_eq!(request.messages[0].role, Role::System);
//! assert_eq!(request.max_tokens, 100);
//!
//! let completion = ChatCompletion::from_json(r#"{"choices":[{"message":{"content":"hello"}}]}"#);
//! assert_eq!(completion.content.as_deref(), Some("hello"));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;

/// Token cap used when the caller does not provide one.
pub const DEFAULT_MAX_TOKENS: u32 = 100;

/// Sampling temperature used when the caller does not provide one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Prompt sent by the probe when none is given on the command line.
pub const DEFAULT_PROMPT: &str =
    "Rewrite this text to be more professional: 'Hey, this is a test to see if the API works.'";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation.
    System,
    /// The human side of the conversation.
    User,
    /// The model's side of the conversation.
    Assistant,
}

/// A single `{role, content}` entry of the `messages` array.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system-role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build a user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body of `POST {api_base}/chat/completions`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Deployment / model name.
    pub model: String,
    /// Ordered conversation.
    pub messages: Vec<ChatMessage>,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl ChatRequest {
    /// Start building a request for `model`.
    pub fn builder(model: impl Into<String>) -> ChatRequestBuilder {
        ChatRequestBuilder::new(model)
    }

    /// Content of the last user-role message, if any.
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Fluent builder for [`ChatRequest`].
///
/// A system message, when set, is always placed before the user message.
#[derive(Debug, Clone)]
pub struct ChatRequestBuilder {
    model: String,
    system: Option<String>,
    user: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl ChatRequestBuilder {
    fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            user: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Set the system message. Blank text is ignored.
    pub fn system(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.system = (!content.trim().is_empty()).then_some(content);
        self
    }

    /// Set the user message.
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.user = Some(content.into());
        self
    }

    /// Override the completion token cap.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Validate and produce the request.
    pub fn build(self) -> Result<ChatRequest, ModelError> {
        if self.max_tokens == 0 {
            return Err(ModelError::InvalidMaxTokens {
                value: self.max_tokens,
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ModelError::InvalidTemperature {
                value: self.temperature,
            });
        }
        let user = self.user.ok_or_else(|| ModelError::MissingField {
            field: "messages".into(),
        })?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(user));

        Ok(ChatRequest {
            model: self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        })
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Token accounting reported by the API.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: Option<u64>,
    /// Tokens generated in the completion.
    pub completion_tokens: Option<u64>,
    /// Sum of both.
    pub total_tokens: Option<u64>,
}

impl Usage {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            prompt_tokens: obj.get("prompt_tokens").and_then(Value::as_u64),
            completion_tokens: obj.get("completion_tokens").and_then(Value::as_u64),
            total_tokens: obj.get("total_tokens").and_then(Value::as_u64),
        })
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<u64>| v.map_or_else(|| "?".to_string(), |n| n.to_string());
        write!(
            f,
            "prompt={} completion={} total={}",
            show(self.prompt_tokens),
            show(self.completion_tokens),
            show(self.total_tokens)
        )
    }
}

/// The displayable parts of a successful chat-completion response.
///
/// Every field is optional; see the module docs for the decoding rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    /// `choices[0].message.content`.
    pub content: Option<String>,
    /// `choices[0].message.reasoning_content` (reasoning models only).
    pub reasoning_content: Option<String>,
    /// Top-level `usage` object.
    pub usage: Option<Usage>,
    /// Top-level `model` string.
    pub model: Option<String>,
}

impl ChatCompletion {
    /// Decode from a raw response body. Non-JSON bodies yield an empty value.
    pub fn from_json(body: &str) -> Self {
        serde_json::from_str::<Value>(body)
            .map(|v| Self::from_value(&v))
            .unwrap_or_default()
    }

    /// Decode from an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Self {
        let message = value
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"));

        let text_field = |name: &str| {
            message
                .and_then(|m| m.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            content: text_field("content"),
            reasoning_content: text_field("reasoning_content"),
            usage: value.get("usage").and_then(Usage::from_value),
            model: value.get("model").and_then(Value::as_str).map(str::to_string),
        }
    }

    /// `true` when nothing could be extracted.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
