//! Configuration for the identity picker and its HTTP host.
//!
//! Picker options are read from an optional JSON file (camelCase keys, every key optional);
//! host options come from the environment with the same defaulting style the server uses
//! for its ports.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPickerConfig {
    /// Subject attribute holding the list of identities. Expected to contain a list of maps.
    #[serde(default = "IdentityPickerConfig::default_identity_list_attribute")]
    pub identity_list_attribute: String,
    /// Attribute of each identity shown to the user. The full identity is always handed to
    /// the renderer, so a client can build its own label from any combination of fields.
    #[serde(default = "IdentityPickerConfig::default_display_name_attribute")]
    pub display_name_attribute: String,
}

impl IdentityPickerConfig {
    fn default_identity_list_attribute() -> String { "identities".to_string() }
    fn default_display_name_attribute() -> String { "user_id".to_string() }

    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "picker config file not found, using defaults");
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read picker config: {}", path.display()))?;
        let cfg = serde_json::from_slice::<Self>(&bytes)
            .with_context(|| format!("Invalid picker config: {}", path.display()))?;
        Ok(cfg)
    }
}

impl Default for IdentityPickerConfig {
    fn default() -> Self {
        Self {
            identity_list_attribute: Self::default_identity_list_attribute(),
            display_name_attribute: Self::default_display_name_attribute(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    /// Lifetime of one authentication transaction's session entries.
    pub session_ttl: Duration,
    pub picker: IdentityPickerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { http_port: 7878, session_ttl: Duration::from_secs(600), picker: IdentityPickerConfig::default() }
    }
}

impl ServerConfig {
    /// Build from `PICKER_HTTP_PORT`, `PICKER_SESSION_TTL_SECS` and `PICKER_CONFIG`.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Ok(port) = std::env::var("PICKER_HTTP_PORT") {
            cfg.http_port = port.parse().with_context(|| format!("Invalid PICKER_HTTP_PORT: {}", port))?;
        }
        if let Ok(ttl) = std::env::var("PICKER_SESSION_TTL_SECS") {
            let secs: u64 = ttl.parse().with_context(|| format!("Invalid PICKER_SESSION_TTL_SECS: {}", ttl))?;
            cfg.session_ttl = Duration::from_secs(secs);
        }
        if let Ok(path) = std::env::var("PICKER_CONFIG") {
            cfg.picker = IdentityPickerConfig::load(Path::new(&path))?;
        }
        Ok(cfg)
    }
}
