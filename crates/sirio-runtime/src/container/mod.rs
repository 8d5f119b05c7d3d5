//! # Service Container
//!
//! Configuration and dependency wiring for a Sirio node.

pub mod config;
pub mod services;

pub use config::{ConfigError, LoggingConfig, SirioConfig, UserSeed};
pub use services::{AuthService, ContainerError, SirioContainer};
