//! Configuration management for the whitelist bot.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Discord credentials and channel ids have no sensible default and are
//! required.

use crate::directory::RconConfig;
use crate::dispatcher::ChannelLayout;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use whitelist_core::request::{ChannelId, GuildId, RoleId, UserId};
use whitelist_discord::DEFAULT_API_BASE;

/// Errors from loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set to something unusable
    #[error("Invalid value for {name}: {value}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Discord application and guild layout
    pub discord: DiscordConfig,
    /// `SQLite` record store
    pub database: DatabaseConfig,
    /// Game server whitelist
    pub directory: DirectoryConfig,
    /// Interactions endpoint and process settings
    pub server: ServerConfig,
    /// Request lifecycle timings
    pub lifecycle: LifecycleConfig,
}

/// Discord configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token
    pub token: String,
    /// Application id (also the bot's user id)
    pub application_id: String,
    /// Hex Ed25519 key for interaction verification
    pub public_key: String,
    /// Guild for commands and ticket channels
    pub guild_id: String,
    /// Channel holding the request panel
    pub request_channel: String,
    /// Channel receiving staff review messages
    pub admin_channel: String,
    /// Parent category for ticket channels
    pub ticket_category: Option<String>,
    /// Staff role ids; empty means nobody is staff
    pub allowed_roles: Vec<String>,
    /// REST base URL
    pub api_base: String,
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("application_id", &self.application_id)
            .field("guild_id", &self.guild_id)
            .field("request_channel", &self.request_channel)
            .field("admin_channel", &self.admin_channel)
            .field("ticket_category", &self.ticket_category)
            .field("allowed_roles", &self.allowed_roles)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl DiscordConfig {
    /// Channel layout for the dispatcher.
    #[must_use]
    pub fn layout(&self) -> ChannelLayout {
        ChannelLayout {
            guild: GuildId::new(self.guild_id.as_str()),
            request_channel: ChannelId::new(self.request_channel.as_str()),
            admin_channel: ChannelId::new(self.admin_channel.as_str()),
            ticket_category: self.ticket_category.as_deref().map(ChannelId::new),
            staff_roles: self.allowed_roles.iter().map(|role| RoleId::new(role.as_str())).collect(),
            bot_user: UserId::new(self.application_id.as_str()),
        }
    }
}

/// `SQLite` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Database settings alone, for commands that never talk to Discord.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Database settings through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            url: lookup("DATABASE_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| "sqlite://whitelist.db?mode=rwc".to_string()),
            max_connections: lookup("DATABASE_MAX_CONNECTIONS").and_then(|s| s.trim().parse().ok()).unwrap_or(5),
        }
    }
}

/// Which whitelist backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryKind {
    /// Minecraft server over RCON
    Rcon,
    /// In-process set, for development
    Memory,
}

/// Access directory configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Backend selection
    pub kind: DirectoryKind,
    /// RCON `host:port`
    pub rcon_address: String,
    /// RCON password
    pub rcon_password: String,
    /// RCON socket timeout in seconds
    pub rcon_timeout: u64,
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("kind", &self.kind)
            .field("rcon_address", &self.rcon_address)
            .field("rcon_timeout", &self.rcon_timeout)
            .finish_non_exhaustive()
    }
}

impl DirectoryConfig {
    /// RCON connection settings
    #[must_use]
    pub fn rcon(&self) -> RconConfig {
        RconConfig {
            address: self.rcon_address.clone(),
            password: self.rcon_password.clone(),
            timeout: Duration::from_secs(self.rcon_timeout),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Prometheus listener, when metrics are wanted
    pub metrics_addr: Option<String>,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Lifecycle timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Draft expiry in seconds; 0 disables expiry
    pub draft_ttl: u64,
    /// Bound on one engine call in seconds
    pub engine_timeout: u64,
    /// Delay before a closed ticket channel is deleted, in seconds
    pub ticket_close_delay: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when a required Discord variable is
    /// unset and [`ConfigError::Invalid`] for an unknown directory backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let kind = match var("DIRECTORY_BACKEND").as_deref() {
            None | Some("rcon") => DirectoryKind::Rcon,
            Some("memory") => DirectoryKind::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid { name: "DIRECTORY_BACKEND", value: other.to_string() });
            },
        };

        Ok(Self {
            discord: DiscordConfig {
                token: required("DISCORD_TOKEN")?,
                application_id: required("DISCORD_APPLICATION_ID")?,
                public_key: required("DISCORD_PUBLIC_KEY")?,
                guild_id: required("DISCORD_GUILD_ID")?,
                request_channel: required("DISCORD_CHANNEL_REQUEST")?,
                admin_channel: required("DISCORD_CHANNEL_ADMIN")?,
                ticket_category: var("DISCORD_TICKET_CATEGORY"),
                allowed_roles: var("DISCORD_ALLOWED_ROLES")
                    .map(|roles| {
                        roles.split(',').map(str::trim).filter(|role| !role.is_empty()).map(String::from).collect()
                    })
                    .unwrap_or_default(),
                api_base: var("DISCORD_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            },
            database: DatabaseConfig::from_lookup(&lookup),
            directory: DirectoryConfig {
                kind,
                rcon_address: var("RCON_ADDRESS").unwrap_or_else(|| "127.0.0.1:25575".to_string()),
                rcon_password: var("RCON_PASSWORD").unwrap_or_default(),
                rcon_timeout: var("RCON_TIMEOUT").and_then(|s| s.parse().ok()).unwrap_or(5),
            },
            server: ServerConfig {
                host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: var("PORT").and_then(|s| s.parse().ok()).unwrap_or(8080),
                metrics_addr: var("METRICS_ADDR"),
                shutdown_timeout: var("SHUTDOWN_TIMEOUT").and_then(|s| s.parse().ok()).unwrap_or(30),
            },
            lifecycle: LifecycleConfig {
                draft_ttl: var("DRAFT_TTL_SECS").and_then(|s| s.parse().ok()).unwrap_or(900),
                engine_timeout: var("ENGINE_TIMEOUT_SECS").and_then(|s| s.parse().ok()).unwrap_or(10),
                ticket_close_delay: var("TICKET_CLOSE_DELAY_SECS").and_then(|s| s.parse().ok()).unwrap_or(5),
            },
        })
    }

    /// Interactions endpoint bind address
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
