//! # Token Auth Service
//!
//! ## Client Lifecycle
//!
//! ```text
//! unauthenticated ──add_client_*──→ authenticated ──TTL runs out──→ expired (cleared)
//!                                        │  ↑
//!                                        │  └── get_client refreshes TTL
//!                                        └──remove_client / session logout──→ removed (cleared)
//! ```
//!
//! ## Identity Matching
//!
//! An identity holds at most one live item. Before caching a new item the
//! live items are scanned: user logons match on user name, session logons
//! on session id, anonymous logons only on their own client id. A match is
//! returned as is, with its TTL restarted.
//!
//! Directory calls run before the token table is locked; the match-or-insert
//! step runs under the lock so two concurrent logons of one identity end up
//! with the same item.

use crate::adapters::keystore::Keystore;
use crate::config::AuthConfig;
use crate::domain::bearer::BearerClaims;
use crate::domain::cache::{Lookup, TtlCache};
use crate::domain::csrf::{generate_csrf_token, CsrfCheck};
use crate::domain::entities::{TokenAuthItem, TokenBean, User};
use crate::domain::errors::AuthError;
use crate::domain::magic::verify_magic_password;
use crate::ports::inbound::TokenAuthApi;
use crate::ports::outbound::{SecurityDirectory, SystemTimeSource, TimeSource};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sirio_bus::messages::{
    CTX_CLIENT_ID, CTX_SESSION_ID, CTX_USER_ID, CTX_USER_NAME, TOKEN_ISSUED, TOKEN_REMOVED,
};
use sirio_bus::{BusContext, MessageBus, Originator};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a new logon is matched against live items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Identity {
    Anonymous,
    UserName,
    Session,
}

/// Token auth service.
pub struct TokenAuthService<D, T = SystemTimeSource> {
    config: AuthConfig,
    directory: D,
    time: T,
    keystore: Keystore,
    tokens: Mutex<TtlCache<String, Arc<TokenAuthItem>>>,
    csrf: Mutex<TtlCache<String, String>>,
    sessions: RwLock<HashMap<String, TokenBean>>,
    bus: RwLock<Option<Weak<MessageBus>>>,
}

impl<D: SecurityDirectory> TokenAuthService<D, SystemTimeSource> {
    /// Create the service on the system clock.
    ///
    /// # Errors
    ///
    /// Keystore failures when `keystore_dir` is configured.
    pub fn new(config: AuthConfig, directory: D) -> Result<Self, AuthError> {
        Self::with_time_source(config, directory, SystemTimeSource)
    }
}

impl<D: SecurityDirectory, T: TimeSource> TokenAuthService<D, T> {
    /// Create the service with an explicit time source.
    pub fn with_time_source(config: AuthConfig, directory: D, time: T) -> Result<Self, AuthError> {
        let keystore = match &config.keystore_dir {
            Some(dir) => Keystore::load_or_generate(dir)?,
            None => Keystore::generate(),
        };
        Ok(Self::with_keystore(config, directory, time, keystore))
    }

    /// Create the service with a ready keystore.
    pub fn with_keystore(config: AuthConfig, directory: D, time: T, keystore: Keystore) -> Self {
        let token_ttl = config.token_ttl.as_millis() as u64;
        let csrf_ttl = config.csrf_ttl.as_millis() as u64;
        Self {
            config,
            directory,
            time,
            keystore,
            tokens: Mutex::new(TtlCache::new(token_ttl)),
            csrf: Mutex::new(TtlCache::new(csrf_ttl)),
            sessions: RwLock::new(HashMap::new()),
            bus: RwLock::new(None),
        }
    }

    /// Fresh random client id.
    pub fn new_client_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    /// Publish `TOKEN_ISSUED` / `TOKEN_REMOVED` on `bus` from now on.
    ///
    /// Only a weak reference is kept, the bus owns the service's listener.
    pub fn set_bus(&self, bus: &Arc<MessageBus>) {
        *self.bus.write() = Some(Arc::downgrade(bus));
    }

    /// Live client items bound to an HTTP session.
    pub fn clients_for_session(&self, session_id: &str) -> Vec<Arc<TokenAuthItem>> {
        self.clients()
            .into_iter()
            .filter(|item| item.session() == Some(session_id))
            .collect()
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn now(&self) -> (u64, DateTime<Utc>) {
        let ms = self.time.now_ms();
        let at = DateTime::<Utc>::from_timestamp_millis(ms as i64).unwrap_or_else(Utc::now);
        (ms, at)
    }

    fn authenticate(
        &self,
        id_client: &str,
        session: Option<String>,
        user: User,
        identity: Identity,
    ) -> Result<Arc<TokenAuthItem>, AuthError> {
        let acl = self.directory.acl(&user)?;
        let (now_ms, now) = self.now();

        let mut stale = Vec::new();
        let item = {
            let mut tokens = self.tokens.lock();

            let existing = match identity {
                Identity::UserName => tokens.find(now_ms, |i| i.user().name == user.name),
                Identity::Session => tokens.find(now_ms, |i| i.session() == session.as_deref()),
                Identity::Anonymous => match tokens.get(id_client, now_ms) {
                    Lookup::Hit(i) if i.user().name == user.name => Some(i),
                    Lookup::Expired(i) => {
                        stale.push(i);
                        None
                    }
                    _ => None,
                },
            };

            match existing {
                Some(item) => {
                    item.touch(now);
                    debug!(
                        id_client = %item.id_client(),
                        user = %user.name,
                        "Identity already authenticated, reusing token"
                    );
                    return Ok(item);
                }
                None => {
                    let item = Arc::new(TokenAuthItem::new(id_client, session, user, acl, now));
                    stale.extend(tokens.insert(id_client.to_string(), Arc::clone(&item), now_ms));
                    item
                }
            }
        };

        self.discard(stale);
        info!(
            id_client,
            user = %item.user().name,
            session = ?item.session(),
            "Client authenticated"
        );
        self.publish(TOKEN_ISSUED, &item);
        Ok(item)
    }

    fn discard(&self, items: Vec<Arc<TokenAuthItem>>) -> usize {
        let count = items.len();
        for item in items {
            item.clear();
            self.publish(TOKEN_REMOVED, &item);
        }
        count
    }

    fn publish(&self, msg_id: i32, item: &TokenAuthItem) {
        let bus = self.bus.read().as_ref().and_then(Weak::upgrade);
        let Some(bus) = bus else {
            return;
        };
        let mut context = BusContext::new()
            .with(CTX_CLIENT_ID, item.id_client())
            .with(CTX_USER_ID, item.user_id())
            .with(CTX_USER_NAME, item.user().name.as_str());
        if let Some(session) = item.session() {
            context.insert(CTX_SESSION_ID, session);
        }
        bus.send_message_async(msg_id, Originator::none(), context);
    }
}

impl<D: SecurityDirectory, T: TimeSource> TokenAuthApi for TokenAuthService<D, T> {
    fn add_client_anonymous(&self, id_client: &str) -> Result<Arc<TokenAuthItem>, AuthError> {
        let name = self
            .config
            .anonymous_user
            .as_deref()
            .ok_or(AuthError::AnonymousDisabled)?;
        let user = self
            .directory
            .user_by_name(name)?
            .ok_or(AuthError::AnonymousDisabled)?;
        self.authenticate(id_client, None, user, Identity::Anonymous)
    }

    fn add_client_credentials(
        &self,
        user: &str,
        password: &str,
        id_client: &str,
    ) -> Result<Arc<TokenAuthItem>, AuthError> {
        if let Some(found) = self.directory.login_user(user, password)? {
            return self.authenticate(id_client, None, found, Identity::UserName);
        }

        let magic = self.config.is_magic_user(user)
            && verify_magic_password(user, password, &self.config.magic_secret, &self.config.app_uuid);
        if magic {
            if let Some(found) = self.directory.user_by_name(user)? {
                warn!(user, id_client, "Magic logon accepted");
                return self.authenticate(id_client, None, found, Identity::UserName);
            }
        }

        info!(user, "Logon rejected");
        Err(AuthError::AuthenticationFailed(user.to_string()))
    }

    fn add_client_user(&self, user: User, id_client: &str) -> Result<Arc<TokenAuthItem>, AuthError> {
        self.authenticate(id_client, None, user, Identity::UserName)
    }

    fn add_client_session(
        &self,
        session_id: &str,
        id_client: &str,
    ) -> Result<Arc<TokenAuthItem>, AuthError> {
        let bean = self
            .session_logon(session_id)
            .ok_or_else(|| AuthError::UnknownSession(session_id.to_string()))?;
        let user = self
            .directory
            .user_by_id(bean.user_id)?
            .ok_or(AuthError::UnknownUser(bean.user_id))?;
        self.authenticate(id_client, Some(session_id.to_string()), user, Identity::Session)
    }

    fn get_client(&self, id_client: &str) -> Result<Arc<TokenAuthItem>, AuthError> {
        let (now_ms, now) = self.now();
        let lookup = self.tokens.lock().get(id_client, now_ms);

        match lookup {
            Lookup::Hit(item) => {
                item.touch(now);
                Ok(item)
            }
            Lookup::Expired(item) => {
                debug!(id_client, "Client token expired");
                self.discard(vec![item]);
                Err(AuthError::TokenExpired(id_client.to_string()))
            }
            Lookup::Miss => Err(AuthError::UnknownToken(id_client.to_string())),
        }
    }

    fn remove_client(&self, id_client: &str) -> bool {
        let removed = self.tokens.lock().remove(id_client);
        match removed {
            Some(item) => {
                debug!(id_client, "Client removed");
                self.discard(vec![item]);
                true
            }
            None => false,
        }
    }

    fn clients(&self) -> Vec<Arc<TokenAuthItem>> {
        let (now_ms, _) = self.now();
        self.tokens.lock().values(now_ms)
    }

    fn purge_expired(&self) -> usize {
        let (now_ms, _) = self.now();
        let expired = self.tokens.lock().purge_expired(now_ms);
        let csrf = self.csrf.lock().purge_expired(now_ms).len();
        let tokens = self.discard(expired);

        if tokens + csrf > 0 {
            info!(tokens, csrf, "Expired tokens purged");
        }
        tokens + csrf
    }

    fn encrypt_token_oauth2(
        &self,
        remote_addr: &str,
        item: &TokenAuthItem,
    ) -> Result<String, AuthError> {
        let (now_ms, _) = self.now();
        let claims = BearerClaims {
            idclient: item.id_client().to_string(),
            user: item.user().name.clone(),
            address: remote_addr.to_string(),
            time: now_ms,
        };
        claims.encode(self.keystore.signing_key())
    }

    fn decript_token_oauth2(
        &self,
        remote_addr: &str,
        token: &str,
    ) -> Result<BearerClaims, AuthError> {
        let claims = BearerClaims::decode(token, &self.keystore.verifying_key())?;
        if let Err(e) = claims.check_address(remote_addr) {
            warn!(idclient = %claims.idclient, issued = %claims.address, remote_addr, "Bearer token address mismatch");
            return Err(e);
        }
        Ok(claims)
    }

    fn client_from_oauth2_token(
        &self,
        remote_addr: &str,
        token: &str,
    ) -> Result<Arc<TokenAuthItem>, AuthError> {
        let claims = self.decript_token_oauth2(remote_addr, token)?;
        let item = self.get_client(&claims.idclient)?;
        if item.user().name != claims.user {
            return Err(AuthError::InvalidToken(format!(
                "token for {} names client of {}",
                claims.user,
                item.user().name
            )));
        }
        Ok(item)
    }

    fn issue_token_anti_csrf(&self, session_id: &str) -> String {
        let (now_ms, _) = self.now();
        let token = generate_csrf_token();
        self.csrf
            .lock()
            .insert(token.clone(), session_id.to_string(), now_ms);
        debug!(session_id, "Anti-CSRF token issued");
        token
    }

    fn verifica_token_anti_csrf(&self, token: &str, session_id: &str, remove: bool) -> CsrfCheck {
        let (now_ms, _) = self.now();
        let mut csrf = self.csrf.lock();

        let check = match csrf.peek(token, now_ms) {
            Lookup::Miss | Lookup::Expired(_) => CsrfCheck::UnknownToken,
            Lookup::Hit(owner) if owner != session_id => CsrfCheck::SessionMismatch,
            Lookup::Hit(_) => {
                if remove {
                    csrf.remove(token);
                }
                CsrfCheck::Valid
            }
        };

        if !check.is_valid() {
            debug!(session_id, ?check, "Anti-CSRF check failed");
        }
        check
    }

    fn register_session_logon(&self, session_id: &str, bean: TokenBean) {
        debug!(session_id, user_id = bean.user_id, "Session logon registered");
        self.sessions.write().insert(session_id.to_string(), bean);
    }

    fn register_session_logout(&self, session_id: &str) -> usize {
        self.sessions.write().remove(session_id);
        let dropped = self
            .tokens
            .lock()
            .remove_where(|item| item.session() == Some(session_id));
        let count = self.discard(dropped);
        debug!(session_id, clients = count, "Session logged out");
        count
    }

    fn session_logon(&self, session_id: &str) -> Option<TokenBean> {
        self.sessions.read().get(session_id).cloned()
    }
}
