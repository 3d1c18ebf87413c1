//! Process-wide RS256 signing key.

use std::sync::OnceLock;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};

use crate::MockError;

/// `kid` advertised in the JWKS and stamped on every id_token.
pub const KEY_ID: &str = "mock-key-1";

pub(crate) struct SigningKeys {
    pub encoding_key: EncodingKey,
    pub public_jwk: Value,
}

static KEYS: OnceLock<Result<SigningKeys, String>> = OnceLock::new();

/// The signing key, generated on first use and shared by every provider in
/// the process.
pub(crate) fn signing_keys() -> Result<&'static SigningKeys, MockError> {
    KEYS.get_or_init(generate)
        .as_ref()
        .map_err(|e| MockError::KeyGeneration(e.clone()))
}

fn generate() -> Result<SigningKeys, String> {
    tracing::info!("generating RSA-2048 signing key");
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).map_err(|e| e.to_string())?;
    let public_key = RsaPublicKey::from(&private_key);

    let pem = private_key.to_pkcs1_pem(rsa::pkcs8::LineEnding::LF)
        .map_err(|e| e.to_string())?;
    let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| e.to_string())?;

    let public_jwk = json!({
        "kty": "RSA",
        "alg": "RS256",
        "use": "sig",
        "kid": KEY_ID,
        "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    });

    Ok(SigningKeys {
        encoding_key,
        public_jwk,
    })
}
