//! JSON report printed by the token-fetch command.
//!
//! Consumers (scripts, the add-in server) read a single line from stdout and
//! branch on `success`:
//!
//! ```text
//! {"access_token":"eyJ…","expires_on":1767225600,"success":true}
//! {"success":false,"error":"access_denied","error_description":"…"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a token fetch.
///
/// The `success` flag of the wire form is derived from the variant, so the
/// two can never disagree; input whose flag contradicts its shape is
/// rejected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(into = "WireReport", try_from = "WireReport")]
pub enum TokenReport {
    /// A token was obtained.
    Issued {
        /// The bearer token.
        access_token: String,
        /// Expiry as Unix seconds.
        expires_on: i64,
    },
    /// No token could be obtained.
    Failed {
        /// Machine-readable error code.
        error: String,
        /// Human-readable explanation.
        error_description: String,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireReport {
    Issued {
        access_token: String,
        expires_on: i64,
        success: bool,
    },
    Failed {
        success: bool,
        error: String,
        error_description: String,
    },
}

impl From<TokenReport> for WireReport {
    fn from(report: TokenReport) -> Self {
        match report {
            TokenReport::Issued {
                access_token,
                expires_on,
            } => Self::Issued {
                access_token,
                expires_on,
                success: true,
            },
            TokenReport::Failed {
                error,
                error_description,
            } => Self::Failed {
                success: false,
                error,
                error_description,
            },
        }
    }
}

impl TryFrom<WireReport> for TokenReport {
    type Error = &'static str;

    fn try_from(wire: WireReport) -> Result<Self, Self::Error> {
        match wire {
            WireReport::Issued {
                access_token,
                expires_on,
                success: true,
            } => Ok(Self::Issued {
                access_token,
                expires_on,
            }),
            WireReport::Failed {
                success: false,
                error,
                error_description,
            } => Ok(Self::Failed {
                error,
                error_description,
            }),
            WireReport::Issued { .. } => Err("report carries a token but success is false"),
            WireReport::Failed { .. } => Err("report carries an error but success is true"),
        }
    }
}

impl TokenReport {
    /// Report for a successfully acquired token.
    pub fn issued(access_token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self::Issued {
            access_token: access_token.into(),
            expires_on: expires_on.timestamp(),
        }
    }

    /// Report for a failed acquisition.
    pub fn failed(error: impl Into<String>, error_description: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            error_description: error_description.into(),
        }
    }

    /// Whether this report carries a token.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Issued { .. })
    }
}
