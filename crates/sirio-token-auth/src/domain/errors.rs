//! # Token Auth Errors
//!
//! Each failure cause has its own variant so callers can tell a wrong
//! password from an expired token when rendering a response.

use thiserror::Error;

/// Errors raised by the token auth service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Credentials rejected by the directory and by the magic logon.
    #[error("Authentication failed for user {0}")]
    AuthenticationFailed(String),

    /// No anonymous user is configured, or the directory does not know it.
    #[error("Anonymous access is not enabled")]
    AnonymousDisabled,

    /// No cached token for this client id.
    #[error("Unknown client token: {0}")]
    UnknownToken(String),

    /// The client token was cached but its TTL ran out.
    #[error("Client token expired: {0}")]
    TokenExpired(String),

    /// No pending logon registered for this session id.
    #[error("No logon registered for session {0}")]
    UnknownSession(String),

    /// A user id from the session index is missing from the directory.
    #[error("Unknown user id: {0}")]
    UnknownUser(i64),

    /// Bearer token malformed or signature check failed.
    #[error("Invalid bearer token: {0}")]
    InvalidToken(String),

    /// Bearer token presented from another address than it was issued to.
    #[error("Bearer token issued to {issued} used from {actual}")]
    AddressMismatch { issued: String, actual: String },

    /// Security directory failure.
    #[error("Directory error: {0}")]
    Directory(String),

    /// Key loading, generation or persistence failure.
    #[error("Keystore error: {0}")]
    Keystore(String),
}
