//! # Bearer Tokens
//!
//! Self-contained OAuth2-style bearer token for a cached client.
//!
//! ## Format
//!
//! ```text
//! base64url(claims JSON) "." base64url(Ed25519 signature over the claims JSON)
//! ```
//!
//! Both parts are unpadded. The claims record the address the token was
//! issued to; presenting it from another address fails unless the caller
//! is on the loopback interface.
//!
//! ## Not RSA
//!
//! Tokens are signed with Ed25519, not RSA. They are not interchangeable
//! with RSA-signed tokens, and a verifier expecting an RSA public key will
//! reject them. The claims are signed, not encrypted: anyone holding a
//! token can read them, only the keystore holder can mint them.

use crate::domain::errors::AuthError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerClaims {
    /// Client id of the cached token item.
    pub idclient: String,
    /// User name.
    pub user: String,
    /// Remote address the token was issued to.
    pub address: String,
    /// Issue time, milliseconds since the Unix epoch.
    pub time: u64,
}

impl BearerClaims {
    /// Sign the claims into a token string.
    pub fn encode(&self, key: &SigningKey) -> Result<String, AuthError> {
        let payload =
            serde_json::to_vec(self).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let signature = key.sign(&payload);
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    /// Verify `token` and return its claims.
    ///
    /// Checks the signature only; see [`check_address`](Self::check_address).
    pub fn decode(token: &str, key: &VerifyingKey) -> Result<Self, AuthError> {
        let (payload, signature) = token
            .trim()
            .split_once('.')
            .ok_or_else(|| AuthError::InvalidToken("missing signature".into()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| AuthError::InvalidToken(format!("claims: {e}")))?;
        let signature: [u8; 64] = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| AuthError::InvalidToken(format!("signature: {e}")))?
            .try_into()
            .map_err(|_| AuthError::InvalidToken("signature length".into()))?;

        key.verify(&payload, &Signature::from_bytes(&signature))
            .map_err(|_| AuthError::InvalidToken("signature mismatch".into()))?;

        serde_json::from_slice(&payload).map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Reject a token presented from another address than it was issued to.
    ///
    /// Loopback callers are exempt.
    pub fn check_address(&self, remote_addr: &str) -> Result<(), AuthError> {
        if is_loopback(remote_addr) || self.address == remote_addr {
            return Ok(());
        }
        Err(AuthError::AddressMismatch {
            issued: self.address.clone(),
            actual: remote_addr.to_string(),
        })
    }
}

/// Returns `true` for `localhost` and any loopback IPv4/IPv6 address.
pub fn is_loopback(addr: &str) -> bool {
    let addr = addr.trim();
    addr.eq_ignore_ascii_case("localhost")
        || addr.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}
