//! PKCE (RFC 7636) verifier/challenge pairs and the CSRF `state` value.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Unreserved URI characters allowed in a code verifier.
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// A code verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkceCodes {
    pub code_verifier: String,
    pub code_challenge: String,
}

/// Generate a fresh 64-character verifier and its challenge.
pub fn generate_pkce() -> PkceCodes {
    let mut rng = rand::thread_rng();
    let code_verifier: String = (0..64)
        .map(|_| VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())] as char)
        .collect();
    let code_challenge = s256_challenge(&code_verifier);
    PkceCodes {
        code_verifier,
        code_challenge,
    }
}

/// Base64url (unpadded) SHA-256 of the verifier.
pub fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Random `state` parameter echoed back on the redirect.
pub fn generate_state() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}
