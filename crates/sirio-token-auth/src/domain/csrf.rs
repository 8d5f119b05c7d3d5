//! # Anti-CSRF Tokens

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use serde::Serialize;

/// Random bytes per token.
pub const CSRF_TOKEN_BYTES: usize = 16;

/// Outcome of an anti-CSRF check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum CsrfCheck {
    /// Token known and bound to the presenting session.
    Valid = 0,
    /// Token never issued, already consumed, or expired.
    UnknownToken = 1,
    /// Token issued to another session.
    SessionMismatch = 2,
}

impl CsrfCheck {
    /// Numeric result code.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

/// Fresh token: Base64 of 16 random bytes.
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}
