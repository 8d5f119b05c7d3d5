//! # Message Vocabulary
//!
//! Bus messages are identified by small integer constants in one flat,
//! process-wide namespace. Listeners that do not recognise an id must
//! ignore it and return 0.

// =============================================================================
// IDLE HEARTBEAT
// =============================================================================

/// Fired after 10 minutes of delivery-queue inactivity.
pub const IDLE_10_MINUTES: i32 = 10;

/// Fired after 30 minutes of delivery-queue inactivity.
pub const IDLE_30_MINUTES: i32 = 30;

/// Fired after 60 minutes of delivery-queue inactivity.
pub const IDLE_60_MINUTES: i32 = 60;

// =============================================================================
// USER SESSION
// =============================================================================

/// A user logged on through an HTTP session.
/// Context: [`CTX_SESSION_ID`], [`CTX_USER_ID`], [`CTX_USER_NAME`].
pub const USER_LOGON: i32 = 101;

/// A user logged out. Context: [`CTX_SESSION_ID`].
pub const USER_LOGOUT: i32 = 102;

/// A new authentication token was issued. Context: [`CTX_CLIENT_ID`], [`CTX_USER_ID`].
pub const TOKEN_ISSUED: i32 = 110;

/// An authentication token was removed or expired. Context: [`CTX_CLIENT_ID`].
pub const TOKEN_REMOVED: i32 = 111;

// =============================================================================
// CONTEXT KEYS
// =============================================================================

/// HTTP session identifier.
pub const CTX_SESSION_ID: &str = "sessionID";

/// Numeric user identifier.
pub const CTX_USER_ID: &str = "userID";

/// User login name.
pub const CTX_USER_NAME: &str = "userName";

/// Token client identifier.
pub const CTX_CLIENT_ID: &str = "idClient";

/// Returns `true` for the idle heartbeat ids.
#[must_use]
pub fn is_idle_message(msg_id: i32) -> bool {
    matches!(msg_id, IDLE_10_MINUTES | IDLE_30_MINUTES | IDLE_60_MINUTES)
}
