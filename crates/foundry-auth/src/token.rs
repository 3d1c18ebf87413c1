//! The successful half of a token acquisition.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Tokens this close to expiry (in seconds) are not handed out from the cache.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// A bearer token and the instant it stops being accepted.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The bearer credential.
    pub secret: String,
    /// Expiry declared by the provider.
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token is still usable at `now`, keeping
    /// [`EXPIRY_MARGIN_SECS`] in reserve.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_on
    }
}

// The secret never ends up in logs.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &format_args!("<{} bytes>", self.secret.len()))
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_respects_margin() {
        let now = Utc::now();
        let token = AccessToken {
            secret: "s".into(),
            expires_on: now + Duration::minutes(4),
        };
        assert!(!token.is_fresh(now));

        let token = AccessToken {
            expires_on: now + Duration::minutes(30),
            ..token
        };
        assert!(token.is_fresh(now));
    }

    #[test]
    fn debug_hides_secret() {
        let token = AccessToken {
            secret: "super-secret".into(),
            expires_on: Utc::now(),
        };
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<12 bytes>"));
    }
}
