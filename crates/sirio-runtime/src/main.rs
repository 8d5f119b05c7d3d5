//! # Sirio Node
//!
//! Runs the message bus, the resource lock service and the token auth
//! service in one process until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use sirio_runtime::container::{ConfigError, SirioConfig, SirioContainer, UserSeed};
use sirio_runtime::init_logging;
use sirio_token_auth::{AccessControlList, InMemoryDirectory, User};
use tracing::{info, warn};

/// Build the in-memory directory from the configured users.
///
/// The anonymous user is added when configured but not declared.
fn seed_directory(config: &SirioConfig) -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    for seed in &config.users {
        let UserSeed {
            id,
            name,
            password,
            roles,
        } = seed;
        directory.add_user(
            User::new(*id, name.as_str()),
            password,
            AccessControlList::new(roles.iter().cloned(), Vec::<String>::new()),
        );
    }

    if let Some(anonymous) = &config.auth.anonymous_user {
        if !config.users.iter().any(|u| &u.name == anonymous) {
            directory.add_user(User::new(0, anonymous.as_str()), "", AccessControlList::default());
        }
    }
    directory
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = SirioConfig::from_env();
    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("===========================================");
    info!("  Sirio Node v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    if let Err(e) = config.validate_for_production() {
        match e {
            ConfigError::EphemeralKeystore => warn!("{e}"),
            _ => return Err(e).context("Configuration rejected"),
        }
    }

    let directory = seed_directory(&config);
    info!(users = directory.len(), "User directory ready");

    let container = SirioContainer::new(config, Arc::new(directory))
        .context("Failed to build services")?;
    container.start().context("Failed to start services")?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    container.shutdown().await;
    Ok(())
}
