//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (PULSE_CLIENT_*)
//! - TOML configuration file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Subscription configuration shared by every subscription of a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Channels starting with this prefix need a subscription token.
    #[serde(default = "default_private_channel_prefix")]
    pub private_channel_prefix: String,

    /// How long operations wait for a subscription to become active.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of subscriptions a client may hold.
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions: usize,
}

fn default_private_channel_prefix() -> String {
    "$".to_string()
}

fn default_timeout_ms() -> u64 {
    std::env::var("PULSE_CLIENT_TIMEOUT_MS")
        .ok()
        .and_then(|t| t.parse().ok())
        .unwrap_or(5_000)
}

fn default_max_subscriptions() -> usize {
    1_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            private_channel_prefix: default_private_channel_prefix(),
            timeout_ms: default_timeout_ms(),
            max_subscriptions: default_max_subscriptions(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "pulse-client.toml",
            "/etc/pulse/pulse-client.toml",
            "~/.config/pulse/pulse-client.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ClientConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Deadline for waiting on a subscription.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether subscribing to `channel` requires a token.
    #[must_use]
    pub fn is_private_channel(&self, channel: &str) -> bool {
        !self.private_channel_prefix.is_empty() && channel.starts_with(&self.private_channel_prefix)
    }
}
