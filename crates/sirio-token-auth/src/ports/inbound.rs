//! # Inbound Port
//!
//! What request-handling code calls to authenticate clients and check
//! tokens.

use crate::domain::bearer::BearerClaims;
use crate::domain::csrf::CsrfCheck;
use crate::domain::entities::{TokenAuthItem, TokenBean, User};
use crate::domain::errors::AuthError;
use std::sync::Arc;

/// Token auth API.
///
/// Every `add_client_*` call returns the cached item of an identity that is
/// already authenticated instead of minting a second one, so the returned
/// item's `id_client` may differ from the one passed in.
pub trait TokenAuthApi: Send + Sync {
    // ===== LOGON =====

    /// Authenticate `id_client` as the configured anonymous user.
    fn add_client_anonymous(&self, id_client: &str) -> Result<Arc<TokenAuthItem>, AuthError>;

    /// Authenticate with user name and password, falling back to the magic
    /// password for allow-listed users.
    fn add_client_credentials(
        &self,
        user: &str,
        password: &str,
        id_client: &str,
    ) -> Result<Arc<TokenAuthItem>, AuthError>;

    /// Authenticate a user the caller has already verified.
    fn add_client_user(&self, user: User, id_client: &str) -> Result<Arc<TokenAuthItem>, AuthError>;

    /// Authenticate through a logon announced on the bus for `session_id`.
    fn add_client_session(
        &self,
        session_id: &str,
        id_client: &str,
    ) -> Result<Arc<TokenAuthItem>, AuthError>;

    // ===== CLIENT TOKENS =====

    /// Cached item for `id_client`, restarting its TTL.
    ///
    /// # Errors
    ///
    /// `UnknownToken` if never cached or removed, `TokenExpired` if its TTL
    /// ran out (the item has been cleared by then).
    fn get_client(&self, id_client: &str) -> Result<Arc<TokenAuthItem>, AuthError>;

    /// Drop and clear the item of `id_client`. Returns `false` if absent.
    fn remove_client(&self, id_client: &str) -> bool;

    /// Live items.
    fn clients(&self) -> Vec<Arc<TokenAuthItem>>;

    /// Evict expired client and anti-CSRF tokens. Returns how many went.
    fn purge_expired(&self) -> usize;

    // ===== BEARER TOKENS =====

    /// Signed bearer token for `item`, bound to `remote_addr`.
    fn encrypt_token_oauth2(&self, remote_addr: &str, item: &TokenAuthItem)
        -> Result<String, AuthError>;

    /// Verify a bearer token presented from `remote_addr`.
    fn decript_token_oauth2(&self, remote_addr: &str, token: &str)
        -> Result<BearerClaims, AuthError>;

    /// Verify a bearer token and return the cached item it names.
    fn client_from_oauth2_token(
        &self,
        remote_addr: &str,
        token: &str,
    ) -> Result<Arc<TokenAuthItem>, AuthError>;

    // ===== ANTI-CSRF =====

    /// Issue a token bound to `session_id`.
    fn issue_token_anti_csrf(&self, session_id: &str) -> String;

    /// Check `token` for `session_id`; with `remove`, a valid token is
    /// consumed.
    fn verifica_token_anti_csrf(&self, token: &str, session_id: &str, remove: bool) -> CsrfCheck;

    // ===== SESSION INDEX =====

    /// Record that `session_id` logged on as `bean`.
    fn register_session_logon(&self, session_id: &str, bean: TokenBean);

    /// Forget `session_id` and drop the clients bound to it. Returns how
    /// many clients were dropped.
    fn register_session_logout(&self, session_id: &str) -> usize;

    /// Pending logon of `session_id`.
    fn session_logon(&self, session_id: &str) -> Option<TokenBean>;
}
