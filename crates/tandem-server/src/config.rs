//! Server configuration.
//!
//! Configuration is layered:
//! - Defaults
//! - A TOML file (`TANDEM_CONFIG`, or the first of the default paths)
//! - Environment variables (`TANDEM_PORT`, `TANDEM_HEARTBEAT__INTERVAL_MS`, ...)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tandem_core::HubConfig;
use tandem_transport::ClientConfig;

const CONFIG_PATHS: [&str; 3] = [
    "tandem.toml",
    "/etc/tandem/tandem.toml",
    "~/.config/tandem/tandem.toml",
];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Tokens and room membership.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Frames buffered per client before it is evicted.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Commands buffered in front of the hub.
    #[serde(default = "default_hub_queue_capacity")]
    pub hub_queue_capacity: usize,

    /// Maximum inbound WebSocket message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Most messages a history request may return.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Ping interval in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,

    /// Liveness timeout in milliseconds.
    #[serde(default = "default_heartbeat_timeout")]
    pub timeout_ms: u64,

    /// Upper bound on a single write in milliseconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,

    /// How often hub statistics are sampled, in milliseconds.
    #[serde(default = "default_report_interval")]
    pub report_interval_ms: u64,
}

/// Static authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Known users and their tokens.
    #[serde(default)]
    pub users: Vec<UserEntry>,

    /// Rooms restricted to a member list.
    #[serde(default)]
    pub rooms: Vec<RoomEntry>,

    /// Whether rooms not listed in `rooms` admit every authenticated user.
    #[serde(default = "default_true")]
    pub open_rooms: bool,
}

/// A user and the bearer token that identifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: String,
    pub token: String,
}

/// A restricted room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEntry {
    pub id: String,
    #[serde(default)]
    pub members: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_mailbox_capacity() -> usize {
    tandem_core::DEFAULT_MAILBOX_CAPACITY
}

fn default_hub_queue_capacity() -> usize {
    1024
}

fn default_max_message_size() -> usize {
    tandem_protocol::codec::MAX_FRAME_SIZE
}

fn default_history_limit() -> usize {
    200
}

fn default_heartbeat_interval() -> u64 {
    54_000
}

fn default_heartbeat_timeout() -> u64 {
    60_000
}

fn default_write_timeout() -> u64 {
    10_000
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_report_interval() -> u64 {
    5_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            metrics: MetricsConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            hub_queue_capacity: default_hub_queue_capacity(),
            max_message_size: default_max_message_size(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval(),
            timeout_ms: default_heartbeat_timeout(),
            write_timeout_ms: default_write_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
            report_interval_ms: default_report_interval(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            rooms: Vec::new(),
            open_rooms: true,
        }
    }
}

impl Config {
    /// Load configuration from file, environment and defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be parsed or the result is
    /// invalid.
    pub fn load() -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Ok(path) = std::env::var("TANDEM_CONFIG") {
            let expanded = shellexpand::tilde(&path).into_owned();
            builder =
                builder.add_source(::config::File::from(Path::new(&expanded)).required(true));
        } else if let Some(path) = CONFIG_PATHS
            .iter()
            .map(|path| shellexpand::tilde(path).into_owned())
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(::config::File::from(Path::new(&path)));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("TANDEM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the hub cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let heartbeat = &self.heartbeat;
        if heartbeat.interval_ms == 0 {
            bail!("heartbeat.interval_ms must be positive");
        }
        if heartbeat.interval_ms >= heartbeat.timeout_ms {
            bail!(
                "heartbeat.interval_ms ({}) must be less than heartbeat.timeout_ms ({})",
                heartbeat.interval_ms,
                heartbeat.timeout_ms
            );
        }
        if heartbeat.write_timeout_ms == 0 {
            bail!("heartbeat.write_timeout_ms must be positive");
        }
        if self.limits.mailbox_capacity == 0 {
            bail!("limits.mailbox_capacity must be positive");
        }
        if self.limits.hub_queue_capacity == 0 {
            bail!("limits.hub_queue_capacity must be positive");
        }
        if self.limits.history_limit == 0 {
            bail!("limits.history_limit must be positive");
        }
        if !self.transport.websocket_path.starts_with('/') {
            bail!("transport.websocket_path must start with '/'");
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a valid socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Hub settings.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            command_capacity: self.limits.hub_queue_capacity,
        }
    }

    /// Per-connection settings.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            mailbox_capacity: self.limits.mailbox_capacity,
            ping_interval: Duration::from_millis(self.heartbeat.interval_ms),
            pong_wait: Duration::from_millis(self.heartbeat.timeout_ms),
            write_wait: Duration::from_millis(self.heartbeat.write_timeout_ms),
        }
    }
}
