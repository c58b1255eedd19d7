//! Server configuration: TOML file, defaults and startup validation.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hnp_admin::{DEFAULT_ADMIN_HEADER, DEFAULT_ADMIN_SECRET};
use hnp_room::RoomLimits;
use serde::{Deserialize, Serialize};

/// Name of the configuration file looked up under the project root.
pub const CONFIG_FILE_NAME: &str = "hnp.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("game port and admin port are both {0}")]
    PortClash(u16),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid bind address {0}")]
    InvalidAddress(String),
}

/// Everything `hnp server run` needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface both listeners bind to.
    pub host: String,
    /// WebSocket port for game traffic.
    pub port: u16,
    /// HTTP port for the admin control plane.
    pub admin_port: u16,
    pub max_rooms: usize,
    pub max_conn_per_room: usize,
    /// Seconds an empty room survives before it is torn down.
    pub grace_period_secs: u64,
    pub admin_header: String,
    pub admin_secret: String,
    /// Frames queued per connection before further frames are dropped.
    pub outbound_buffer: usize,
    pub send_timeout_secs: u64,
    /// How long a new connection may take to send its `JOIN`.
    pub join_timeout_secs: u64,
    /// Protocol definition served to clients. `hnp` resolves a relative
    /// path against its `--root` folder.
    pub protocol_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 57000,
            admin_port: 57001,
            max_rooms: 8,
            max_conn_per_room: 16,
            grace_period_secs: 30,
            admin_header: DEFAULT_ADMIN_HEADER.into(),
            admin_secret: DEFAULT_ADMIN_SECRET.into(),
            outbound_buffer: 64,
            send_timeout_secs: 5,
            join_timeout_secs: 5,
            protocol_file: PathBuf::from("protocol.toml"),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects configurations the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("max_rooms", self.max_rooms as u64),
            ("max_conn_per_room", self.max_conn_per_room as u64),
            ("outbound_buffer", self.outbound_buffer as u64),
            ("send_timeout_secs", self.send_timeout_secs),
            ("join_timeout_secs", self.join_timeout_secs),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::NotPositive(*name));
        }
        if self.port == self.admin_port && self.port != 0 {
            return Err(ConfigError::PortClash(self.port));
        }
        if self.admin_header.trim().is_empty() {
            return Err(ConfigError::Empty("admin_header"));
        }
        if self.admin_secret.is_empty() {
            return Err(ConfigError::Empty("admin_secret"));
        }
        self.game_addr()?;
        Ok(())
    }

    pub fn game_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.addr(self.port)
    }

    pub fn admin_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.addr(self.admin_port)
    }

    fn addr(&self, port: u16) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, port);
        raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
    }

    pub fn room_limits(&self) -> RoomLimits {
        RoomLimits {
            max_rooms: self.max_rooms,
            max_conn_per_room: self.max_conn_per_room,
            grace_period: Duration::from_secs(self.grace_period_secs),
            ..RoomLimits::default()
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}
