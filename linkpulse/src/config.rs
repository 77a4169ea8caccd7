use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::time::Duration;

// Parses a duration string (e.g., "5s", "1m") into a `tokio::time::Duration`.
// Used for deserializing duration values from the config file.
fn parse_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

/// HTTP listener settings.
/// Corresponds to the [server] section in the TOML config file.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_listen")]
    pub listen: SocketAddr,
}

impl ServerConfig {
    fn default_listen() -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], 8080))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
        }
    }
}

/// Configuration specific to the Worker components.
/// Corresponds to the [worker] section in the TOML config file.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    // The number of worker instances to spawn.
    #[serde(default = "WorkerConfig::default_num_instance")]
    pub num_instance: usize,
}

impl WorkerConfig {
    fn default_num_instance() -> usize {
        5
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_instance: Self::default_num_instance(),
        }
    }
}

/// Task queue sizing. Corresponds to the [queue] section.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    #[serde(default = "QueueConfig::default_capacity")]
    pub capacity: usize,
}

impl QueueConfig {
    fn default_capacity() -> usize {
        crate::queue::DEFAULT_CAPACITY
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
        }
    }
}

/// Outbound probe settings. Corresponds to the [probe] section.
#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    #[serde(
        default = "ProbeConfig::default_timeout",
        deserialize_with = "parse_duration"
    )]
    pub timeout: Duration,

    // A check fails once its redirect chain reaches this many redirects.
    #[serde(default = "ProbeConfig::default_max_redirects")]
    pub max_redirects: usize,
}

impl ProbeConfig {
    fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }

    fn default_max_redirects() -> usize {
        5
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
            max_redirects: Self::default_max_redirects(),
        }
    }
}

/// Shutdown timing. Corresponds to the [shutdown] section.
#[derive(Debug, Deserialize, Clone)]
pub struct ShutdownConfig {
    // Upper bound for workers to finish their current task.
    #[serde(
        default = "ShutdownConfig::default_timeout",
        deserialize_with = "parse_duration"
    )]
    pub timeout: Duration,

    // Time given to open HTTP connections before the server is dropped.
    #[serde(
        default = "ShutdownConfig::default_server_grace",
        deserialize_with = "parse_duration"
    )]
    pub server_grace: Duration,
}

impl ShutdownConfig {
    fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }

    fn default_server_grace() -> Duration {
        Duration::from_secs(30)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
            server_grace: Self::default_server_grace(),
        }
    }
}

/// Snapshot persistence. Corresponds to the [storage] section.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    // Snapshot file. Always set when loaded from TOML; only code building a
    // `Config` directly can turn persistence off with `None`.
    #[serde(default = "StorageConfig::default_snapshot_path")]
    pub snapshot_path: Option<PathBuf>,
}

impl StorageConfig {
    fn default_snapshot_path() -> Option<PathBuf> {
        Some(PathBuf::from("./storage/state.json"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: Self::default_snapshot_path(),
        }
    }
}

/// Logging output. Corresponds to the [log] section.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    // Filter directives used when RUST_LOG is not set.
    #[serde(default)]
    pub filter: Option<String>,

    // Directory for daily rolling log files; stdout when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Represents the overall application configuration, loaded from a TOML file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Loads the configuration, falling back to defaults when no path is given
    /// or the file does not exist. Runs before logging is set up, so callers
    /// report which source was used.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) if path.exists() => Self::load_from_file(path),
            _ => Ok(Self::default()),
        }
    }

    // Loads configuration from a TOML file.
    fn load_from_file(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str::<Config>(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }
}
