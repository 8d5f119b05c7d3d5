//! # Sirio Runtime
//!
//! Configuration, logging and the service container behind the
//! `sirio-node` binary.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `SIRIO_*` environment variables
//! 2. Initialize logging
//! 3. Validate configuration for production
//! 4. Seed the user directory
//! 5. Build the container (bus, lock service, token auth service) and
//!    register the bus listeners
//! 6. Start the bus delivery worker
//! 7. Run until Ctrl-C, then drain the bus and stop

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod container;
pub mod logging;

pub use container::{ContainerError, SirioConfig, SirioContainer};
pub use logging::init_logging;
