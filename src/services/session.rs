//! Session codec
//!
//! Sessions live only in the client's cookie. A token is
//! `base64url(json(session)) "." base64url(hmac_sha256(secret, first_part))`,
//! which is safe to put in a cookie value or a URL.
//!
//! Decoding fails closed: malformed input, a bad signature, an unknown
//! role or an expired session all yield `None`.

use anyhow::Result;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::Session;

type HmacSha256 = Hmac<Sha256>;

/// Length of generated signing secrets, in bytes
pub const GENERATED_SECRET_LEN: usize = 32;

/// Signs and verifies session tokens with a process-wide secret
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
}

impl SessionCodec {
    pub fn new(secret: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| anyhow::anyhow!("Invalid session secret: {}", e))?;
        Ok(Self { mac })
    }

    /// Encode a session into an opaque token
    pub fn encode(&self, session: &Session) -> Result<String> {
        let payload = BASE64URL_NOPAD.encode(&serde_json::to_vec(session)?);
        let signature = BASE64URL_NOPAD.encode(&self.sign(payload.as_bytes()));
        Ok(format!("{}.{}", payload, signature))
    }

    /// Decode and verify a token, rejecting expired sessions
    pub fn decode(&self, token: &str) -> Option<Session> {
        self.decode_at(token, chrono::Utc::now().timestamp())
    }

    /// Decode and verify a token as of `now` (epoch seconds)
    pub fn decode_at(&self, token: &str, now: i64) -> Option<Session> {
        let (payload, signature) = token.split_once('.')?;
        let signature = BASE64URL_NOPAD.decode(signature.as_bytes()).ok()?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let json = BASE64URL_NOPAD.decode(payload.as_bytes()).ok()?;
        let session: Session = serde_json::from_slice(&json).ok()?;

        if session.is_expired_at(now) {
            return None;
        }
        Some(session)
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Generate a random signing secret
pub fn generate_secret() -> Vec<u8> {
    let mut secret = vec![0u8; GENERATED_SECRET_LEN];
    OsRng.fill_bytes(&mut secret);
    secret
}

/// Build the codec from the configured secret, generating one when empty.
///
/// Sessions signed with a generated secret do not survive a restart.
pub fn codec_from_secret(configured: &str) -> Result<SessionCodec> {
    if configured.is_empty() {
        tracing::warn!(
            "No session secret configured; using a random one. Sessions will not survive restarts"
        );
        SessionCodec::new(&generate_secret())
    } else {
        SessionCodec::new(configured.as_bytes())
    }
}
