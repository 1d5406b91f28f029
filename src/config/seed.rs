//! First-run seed data configuration.

use serde::Deserialize;

/// Seed configuration.
///
/// The built-in point catalogue is loaded when `enabled` is set and the
/// points table is empty; `grants` are inserted afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub grants: Vec<SeedGrant>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            grants: Vec::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A subject-to-point grant created at seed time.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedGrant {
    /// Provider-issued subject identifier.
    pub subject: String,
    /// Human-readable principal name.
    pub name: String,
    /// Name of the point the subject operates against.
    pub point: String,
}
