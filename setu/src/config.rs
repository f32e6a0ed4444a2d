//! Configuration for the Setu daemon
//!
//! Loaded from a TOML file. Every section except `[uplink]` has defaults,
//! so a minimal file only names the serial port, host and token.

use crate::error::{Error, Result};
use crate::link::BackoffPolicy;
use crate::pipeline::QueueFullPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub framing: FramingConfig,
    pub uplink: UplinkConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port the device bus is attached to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Port path (e.g. "/dev/ttyUSB0", "/dev/ttyS2")
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Baud rate (8N1, no flow control)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read timeout; bounds how long the ingest loop waits before
    /// re-checking the shutdown flag
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Maximum bytes pulled from the port per read
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Frame reassembly settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FramingConfig {
    /// Reassembly buffer capacity in bytes
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

/// Cloud store endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UplinkConfig {
    /// Store host, e.g. "my-project.firebaseio.com"
    pub host: String,

    /// Pre-shared credential sent as the `auth` query parameter
    pub auth_token: String,

    /// PEM root certificate to pin; built-in roots are used when absent
    #[serde(default)]
    pub root_ca_path: Option<PathBuf>,

    /// Request timeout
    #[serde(default = "default_uplink_timeout_secs")]
    pub timeout_secs: u64,
}

/// Link monitoring settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Host to probe; defaults to the uplink host
    #[serde(default)]
    pub probe_host: Option<String>,

    /// TCP port to probe
    #[serde(default = "default_probe_port")]
    pub probe_port: u16,

    /// Re-probe interval while connected
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    /// Timeout for one connect attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Delay policy between reconnect attempts
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

/// Router → dispatcher queue settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Messages held between router and dispatcher
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// What to drop when the queue is full
    #[serde(default)]
    pub queue_full_policy: QueueFullPolicy,

    /// Wait this long for the link before opening the serial port (0 = don't wait)
    #[serde(default)]
    pub startup_link_wait_secs: u64,
}

/// Status indicator timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    /// Refresh period of the steady indicator while connected
    #[serde(default = "default_connected_refresh_ms")]
    pub connected_refresh_ms: u64,

    /// Half-period of the blink while not connected
    #[serde(default = "default_blink_interval_ms")]
    pub blink_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter (trace, debug, info, warn, error); RUST_LOG overrides it
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    115200
}
fn default_read_timeout_ms() -> u64 {
    100
}
fn default_chunk_size() -> usize {
    1024
}
fn default_buffer_capacity() -> usize {
    6 * 1024
}
fn default_uplink_timeout_secs() -> u64 {
    10
}
fn default_probe_port() -> u16 {
    443
}
fn default_probe_interval_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> u64 {
    3000
}
fn default_queue_capacity() -> usize {
    32
}
fn default_connected_refresh_ms() -> u64 {
    1000
}
fn default_blink_interval_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            probe_host: None,
            probe_port: default_probe_port(),
            probe_interval_ms: default_probe_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            queue_full_policy: QueueFullPolicy::default(),
            startup_link_wait_secs: 0,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            connected_refresh_ms: default_connected_refresh_ms(),
            blink_interval_ms: default_blink_interval_ms(),
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

impl UplinkConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu::config::Config;
    ///
    /// let config = Config::load("/etc/setu.toml")?;
    /// # Ok::<(), setu::Error>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.uplink.host.trim().is_empty() {
            return Err(Error::Config("uplink.host must not be empty".to_string()));
        }
        if self.uplink.auth_token.is_empty() {
            return Err(Error::Config(
                "uplink.auth_token must not be empty".to_string(),
            ));
        }
        if self.uplink.timeout_secs == 0 {
            return Err(Error::Config("uplink.timeout_secs must be > 0".to_string()));
        }
        if self.serial.chunk_size == 0 {
            return Err(Error::Config("serial.chunk_size must be > 0".to_string()));
        }
        if self.framing.buffer_capacity == 0 {
            return Err(Error::Config(
                "framing.buffer_capacity must be > 0".to_string(),
            ));
        }
        if self.serial.chunk_size > self.framing.buffer_capacity {
            return Err(Error::Config(format!(
                "serial.chunk_size ({}) must not exceed framing.buffer_capacity ({})",
                self.serial.chunk_size, self.framing.buffer_capacity
            )));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(Error::Config(
                "pipeline.queue_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Host the link monitor probes
    pub fn probe_host(&self) -> String {
        match &self.link.probe_host {
            Some(host) => host.clone(),
            None => crate::uplink::normalize_host(&self.uplink.host).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[uplink]
host = "example.firebaseio.com"
auth_token = "secret"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.framing.buffer_capacity, 6144);
        assert_eq!(config.uplink.timeout_secs, 10);
        assert!(config.uplink.root_ca_path.is_none());
        assert_eq!(config.link.probe_port, 443);
        assert_eq!(config.link.backoff, BackoffPolicy::Immediate);
        assert_eq!(config.pipeline.queue_capacity, 32);
        assert_eq!(config.pipeline.queue_full_policy, QueueFullPolicy::DropOldest);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.probe_host(), "example.firebaseio.com");
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[serial]
port = "/dev/ttyS2"
baud_rate = 9600
chunk_size = 256

[framing]
buffer_capacity = 2048

[uplink]
host = "https://example.firebaseio.com/"
auth_token = "secret"
root_ca_path = "/etc/setu/root.pem"
timeout_secs = 5

[link]
probe_host = "1.1.1.1"
probe_port = 53

[link.backoff]
kind = "exponential"
initial_ms = 250
max_ms = 8000

[pipeline]
queue_capacity = 4
queue_full_policy = "drop_newest"
startup_link_wait_secs = 30

[logging]
level = "debug"
"#;

        let config = Config::from_toml(toml_content).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyS2");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.read_timeout_ms, 100);
        assert_eq!(config.framing.buffer_capacity, 2048);
        assert_eq!(
            config.uplink.root_ca_path.as_deref(),
            Some(Path::new("/etc/setu/root.pem"))
        );
        assert_eq!(config.uplink.timeout(), Duration::from_secs(5));
        assert_eq!(config.probe_host(), "1.1.1.1");
        assert_eq!(
            config.link.backoff,
            BackoffPolicy::Exponential {
                initial_ms: 250,
                max_ms: 8000
            }
        );
        assert_eq!(config.pipeline.queue_full_policy, QueueFullPolicy::DropNewest);
        assert_eq!(config.pipeline.startup_link_wait_secs, 30);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_uplink_section_is_rejected() {
        let result = Config::from_toml("[serial]\nport = \"/dev/ttyS0\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.framing.buffer_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.uplink.auth_token.clear();
        assert!(config.validate().is_err());

        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.pipeline.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_larger_than_buffer_is_rejected() {
        let toml_content = r#"
[serial]
chunk_size = 4096

[framing]
buffer_capacity = 1024

[uplink]
host = "example.firebaseio.com"
auth_token = "secret"
"#;
        let result = Config::from_toml(toml_content);
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("chunk_size")));

        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.serial.chunk_size = config.framing.buffer_capacity;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), MINIMAL).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.uplink.auth_token, "secret");

        assert!(Config::load("/nonexistent/setu.toml").is_err());
    }

    #[test]
    fn test_shipped_sample_parses() {
        let config = Config::from_toml(include_str!("../setu.toml")).unwrap();
        assert_eq!(config.pipeline.startup_link_wait_secs, 30);
        assert!(matches!(config.link.backoff, BackoffPolicy::Exponential { .. }));
    }
}
