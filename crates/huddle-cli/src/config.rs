//! Configuration file for the Huddle CLI.

use huddle_core::{
    PresenceConfig, ProtocolConfig, ReconnectPolicy, ServerConfig, SessionConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Huddle configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Relay endpoint
    #[serde(default)]
    pub server: ServerSection,
    /// Wire protocol constants (must match every other participant)
    #[serde(default)]
    pub protocol: ProtocolSection,
    /// Reconnection behaviour
    #[serde(default)]
    pub reconnect: ReconnectSection,
    /// Join/leave announcements
    #[serde(default)]
    pub presence: PresenceSection,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relay endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Relay host
    #[serde(default = "default_host")]
    pub host: String,
    /// Relay port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Wire protocol constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSection {
    /// Prefix of encrypted lines
    #[serde(default = "default_message_prefix")]
    pub message_prefix: String,
    /// Marker of system notices inside the plaintext
    #[serde(default = "default_system_tag")]
    pub system_tag: String,
    /// Associated data bound to every envelope
    #[serde(default = "default_aad")]
    pub aad: String,
}

/// Reconnection behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSection {
    /// Fixed delay between attempts in seconds
    #[serde(default = "default_reconnect_delay")]
    pub delay_secs: u64,
    /// Give up after this many consecutive failed attempts (absent = never).
    /// A connection closed before the relay sent any line counts as failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// Join/leave announcements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSection {
    /// Announce again after every reconnect
    #[serde(default)]
    pub announce_on_reconnect: bool,
    /// Pause after the leave notice before closing, in milliseconds
    #[serde(default = "default_leave_grace")]
    pub leave_grace_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_host() -> String {
    ServerConfig::default().host
}

fn default_port() -> u16 {
    huddle_core::config::DEFAULT_PORT
}

fn default_connect_timeout() -> u64 {
    huddle_core::config::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_message_prefix() -> String {
    ProtocolConfig::default().message_prefix
}

fn default_system_tag() -> String {
    ProtocolConfig::default().system_tag
}

fn default_aad() -> String {
    ProtocolConfig::default().aad
}

fn default_reconnect_delay() -> u64 {
    huddle_core::config::DEFAULT_RECONNECT_DELAY.as_secs()
}

fn default_leave_grace() -> u64 {
    // 100 ms always fits
    u64::try_from(huddle_core::config::DEFAULT_LEAVE_GRACE.as_millis()).unwrap_or(100)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            message_prefix: default_message_prefix(),
            system_tag: default_system_tag(),
            aad: default_aad(),
        }
    }
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            delay_secs: default_reconnect_delay(),
            max_attempts: None,
        }
    }
}

impl Default for PresenceSection {
    fn default() -> Self {
        Self {
            announce_on_reconnect: false,
            leave_grace_ms: default_leave_grace(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("huddle/config.toml")
    }

    /// Load config from `path`, creating it with defaults if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        // Check for path traversal or URL syntax in the hostname
        let host = &self.server.host;
        if host.contains('/') || host.contains('\\') || host.contains(char::is_whitespace) {
            anyhow::bail!("Relay host '{}' contains invalid characters", host);
        }

        self.to_session_config().validate()?;
        Ok(())
    }

    /// Convert into the session engine's configuration
    #[must_use]
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            server: ServerConfig {
                host: self.server.host.clone(),
                port: self.server.port,
                connect_timeout: Duration::from_secs(self.server.connect_timeout_secs),
            },
            protocol: ProtocolConfig {
                message_prefix: self.protocol.message_prefix.clone(),
                system_tag: self.protocol.system_tag.clone(),
                aad: self.protocol.aad.clone(),
            },
            reconnect: ReconnectPolicy {
                delay: Duration::from_secs(self.reconnect.delay_secs),
                max_attempts: self.reconnect.max_attempts,
            },
            presence: PresenceConfig {
                announce_on_reconnect: self.presence.announce_on_reconnect,
                leave_grace: Duration::from_millis(self.presence.leave_grace_ms),
            },
        }
    }
}
