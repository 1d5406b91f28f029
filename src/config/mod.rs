//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, ListenConfig)
//! - [`auth`]: Identity provider and key set settings (AuthConfig)
//! - [`seed`]: First-run seed data (SeedConfig, SeedGrant)
//! - [`validation`]: Startup checks over a loaded config

mod auth;
mod seed;
mod types;
pub mod validation;

pub use auth::AuthConfig;
pub use seed::SeedConfig;
#[cfg(test)]
pub use seed::SeedGrant;
pub use types::{Config, LogFormat};
