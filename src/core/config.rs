use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    /// Per-request deadline; in-progress swarm mutations survive a timeout,
    /// only the response is dropped.
    #[serde(default = "default_request_timeout", deserialize_with = "duration_str")]
    pub request_timeout: Duration,
}

/// Announce-path knobs. Duration values accept `30s` / `15m` / `1d` forms.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_announce_interval", deserialize_with = "duration_str")]
    pub announce_interval: Duration,
    #[serde(
        default = "default_announce_interval_minimum",
        deserialize_with = "duration_str"
    )]
    pub announce_interval_minimum: Duration,
    /// Peers silent for longer than this are evicted
    #[serde(default = "default_reaper_interval", deserialize_with = "duration_str")]
    pub reaper_interval: Duration,
    /// Cadence for flushing coalesced stat deltas to the stores
    #[serde(
        default = "default_batch_update_interval",
        deserialize_with = "duration_str"
    )]
    pub batch_update_interval: Duration,
    /// Hard cap on peers returned per announce, regardless of numwant
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,
    /// Create torrent rows on first announce instead of rejecting unknown
    /// info hashes
    #[serde(default)]
    pub auto_register: bool,
    /// Permit private/loopback peer addresses (testing setups)
    #[serde(default)]
    pub allow_non_routable: bool,
    /// Honor the client-supplied `ip` parameter when the request source is
    /// RFC1918
    #[serde(default)]
    pub allow_client_ip: bool,
    /// Track peers with unknown passkeys as anonymous instead of rejecting
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_driver")]
    pub peers: String,
    #[serde(default = "default_driver")]
    pub torrents: String,
    #[serde(default = "default_driver")]
    pub users: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_bind() -> SocketAddr {
    "0.0.0.0:34000".parse().expect("default bind address")
}

fn default_num_threads() -> usize {
    num_cpus::get()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_announce_interval() -> Duration {
    Duration::from_secs(1800)
}

fn default_announce_interval_minimum() -> Duration {
    Duration::from_secs(900)
}

fn default_reaper_interval() -> Duration {
    Duration::from_secs(900)
}

fn default_batch_update_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_max_peers() -> usize {
    80
}

fn default_driver() -> String {
    "memory".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            num_threads: default_num_threads(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            announce_interval: default_announce_interval(),
            announce_interval_minimum: default_announce_interval_minimum(),
            reaper_interval: default_reaper_interval(),
            batch_update_interval: default_batch_update_interval(),
            max_peers: default_max_peers(),
            auto_register: false,
            allow_non_routable: false,
            allow_client_ip: false,
            public: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            peers: default_driver(),
            torrents: default_driver(),
            users: default_driver(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tracker: TrackerConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Accepts `humantime` duration strings (`30s`, `15m`, `1d`).
fn duration_str<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.num_threads == 0 {
            bail!("num_threads must be greater than 0");
        }

        if self.server.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }

        if self.tracker.announce_interval.is_zero() {
            bail!("announce_interval must be greater than 0");
        }

        if self.tracker.announce_interval_minimum > self.tracker.announce_interval {
            bail!(
                "announce_interval_minimum ({:?}) must not exceed announce_interval ({:?})",
                self.tracker.announce_interval_minimum,
                self.tracker.announce_interval
            );
        }

        if self.tracker.reaper_interval.is_zero() {
            bail!("reaper_interval must be greater than 0");
        }

        if self.tracker.batch_update_interval.is_zero() {
            bail!("batch_update_interval must be greater than 0");
        }

        if self.tracker.max_peers == 0 {
            bail!("max_peers must be greater than 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        Ok(())
    }
}
