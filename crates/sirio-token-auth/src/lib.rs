//! # Sirio Token Auth - Client Token Service
//!
//! Authenticated clients, each cached under an opaque client id with an
//! idle TTL, plus anti-CSRF and signed bearer tokens.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): token items, TTL cache, CSRF codes,
//!   magic logon, bearer claims, errors
//! - **Ports Layer** (`ports/`): `TokenAuthApi` (inbound), `SecurityDirectory`
//!   and `TimeSource` (outbound)
//! - **Service Layer** (`service.rs`): `TokenAuthService`
//! - **Adapters** (`adapters/`): PEM keystore, in-memory directory, bus
//!   listener for logon/logout/idle events
//!
//! ## Token Kinds
//!
//! | token | issued by | lifetime | check |
//! |---|---|---|---|
//! | client id | `add_client_*` | idle TTL, refreshed on hit | `get_client` |
//! | anti-CSRF | `issue_token_anti_csrf` | fixed TTL, optionally single use | `verifica_token_anti_csrf` |
//! | bearer | `encrypt_token_oauth2` | as long as its client id lives | `decript_token_oauth2` |

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::bus::{attach, TokenAuthBusListener};
pub use adapters::keystore::Keystore;
pub use adapters::memory_directory::InMemoryDirectory;
pub use config::AuthConfig;
pub use domain::bearer::BearerClaims;
pub use domain::csrf::CsrfCheck;
pub use domain::entities::{
    AccessControlList, AttributeValue, BindingListener, TokenAuthItem, TokenBean, User,
};
pub use domain::errors::AuthError;
pub use ports::inbound::TokenAuthApi;
pub use ports::outbound::{ControllableTimeSource, SecurityDirectory, SystemTimeSource, TimeSource};
pub use service::TokenAuthService;
