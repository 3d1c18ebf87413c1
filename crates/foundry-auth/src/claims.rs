//! Account identity derived from an `id_token`.
//!
//! Public clients receive the id_token straight from the token endpoint over
//! TLS, so the payload is decoded without verifying its signature. It only
//! labels the cache entry; it never authorises anything.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

/// A signed-in user as remembered by the token cache.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Stable identifier: `{oid}.{tid}` when both are present.
    pub home_account_id: String,
    /// Login name shown to the operator.
    pub username: String,
    /// Display name, when the provider sent one.
    #[serde(default)]
    pub name: Option<String>,
}

/// The subset of id_token claims used to build an [`Account`].
#[derive(Deserialize, Debug, Default)]
struct IdTokenClaims {
    oid: Option<String>,
    tid: Option<String>,
    sub: Option<String>,
    preferred_username: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

/// Decode the account carried by an id_token.
///
/// Returns `None` when the token is malformed or names no subject.
pub fn account_from_id_token(id_token: &str) -> Option<Account> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: IdTokenClaims = serde_json::from_slice(&bytes).ok()?;

    let subject = claims.oid.or(claims.sub)?;
    let home_account_id = match claims.tid {
        Some(tid) => format!("{subject}.{tid}"),
        None => subject,
    };
    let username = claims
        .preferred_username
        .or(claims.email)
        .unwrap_or_else(|| home_account_id.clone());

    Some(Account {
        home_account_id,
        username,
        name: claims.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.")
    }

    #[test]
    fn entra_style_claims() {
        let token = unsigned_token(&serde_json::json!({
            "oid": "00000000-aaaa",
            "tid": "tenant-1",
            "sub": "pairwise",
            "preferred_username": "ada@contoso.com",
            "name": "Ada Lovelace"
        }));
        let account = account_from_id_token(&token).unwrap();
        assert_eq!(account.home_account_id, "00000000-aaaa.tenant-1");
        assert_eq!(account.username, "ada@contoso.com");
        assert_eq!(account.name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn falls_back_to_sub_and_email() {
        let token = unsigned_token(&serde_json::json!({
            "sub": "42",
            "email": "x@example.org"
        }));
        let account = account_from_id_token(&token).unwrap();
        assert_eq!(account.home_account_id, "42");
        assert_eq!(account.username, "x@example.org");
    }

    #[test]
    fn rejects_garbage() {
        assert!(account_from_id_token("not-a-jwt").is_none());
        assert!(account_from_id_token("a.!!!.c").is_none());
        let no_subject = unsigned_token(&serde_json::json!({"name": "nobody"}));
        assert!(account_from_id_token(&no_subject).is_none());
    }
}
