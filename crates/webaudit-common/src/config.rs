//! Configuration management for WebAudit components

use serde::{Deserialize, Serialize};
use std::path::Path;
use webaudit_core::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scanning engine connection and lifecycle settings
    #[serde(default)]
    pub engine: EngineSettings,

    /// Orchestration settings
    #[serde(default)]
    pub scan: ScanSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (WEBAUDIT_ prefix)
    pub fn merge_env(mut self) -> Self {
        // Engine settings
        if let Ok(val) = std::env::var("WEBAUDIT_ENGINE_HOST") {
            self.engine.host = val;
        }
        if let Ok(val) = std::env::var("WEBAUDIT_ENGINE_PORT") {
            if let Ok(n) = val.parse() {
                self.engine.port = n;
            }
        }
        if let Ok(val) = std::env::var("WEBAUDIT_ENGINE_API_KEY") {
            self.engine.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("WEBAUDIT_ENGINE_COMMAND") {
            self.engine.launch_command = Some(val);
        }
        if let Ok(val) = std::env::var("WEBAUDIT_ENGINE_MODE") {
            self.engine.mode = val;
        }

        // Scan settings
        if let Ok(val) = std::env::var("WEBAUDIT_MAX_CONCURRENT_SCANS") {
            if let Ok(n) = val.parse() {
                self.scan.max_concurrent_scans = n;
            }
        }

        // Logging
        if let Ok(val) = std::env::var("WEBAUDIT_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("WEBAUDIT_LOG_FORMAT") {
            self.logging.format = val;
        }

        self
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.engine.port == 0 {
            return Err(Error::Configuration("engine.port must be non-zero".into()));
        }
        if self.engine.startup_max_attempts == 0 {
            return Err(Error::Configuration(
                "engine.startup_max_attempts must be at least 1".into(),
            ));
        }
        if self.scan.max_concurrent_scans == 0 || self.scan.access_sub_batch_size == 0 {
            return Err(Error::Configuration(
                "scan concurrency limits must be at least 1".into(),
            ));
        }
        if self.scan.stuck_high_threshold <= self.scan.stuck_low_threshold {
            return Err(Error::Configuration(format!(
                "scan.stuck_high_threshold ({}) must exceed scan.stuck_low_threshold ({})",
                self.scan.stuck_high_threshold, self.scan.stuck_low_threshold
            )));
        }
        if self.scan.significant_progress_percent > 100 {
            return Err(Error::Configuration(
                "scan.significant_progress_percent must be within 0..=100".into(),
            ));
        }
        Ok(())
    }
}

/// Scanning engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Control API host
    #[serde(default = "default_engine_host")]
    pub host: String,

    /// Control API port
    #[serde(default = "default_engine_port")]
    pub port: u16,

    /// API key (omit when the engine runs with the key disabled)
    pub api_key: Option<String>,

    /// Executable used to launch the engine when it is not already running
    pub launch_command: Option<String>,

    /// Extra launch arguments appended after the daemon/port flags
    #[serde(default)]
    pub launch_args: Vec<String>,

    /// Scan profile: "fast" or "normal"
    #[serde(default = "default_mode")]
    pub mode: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Interval between liveness probes while the engine starts (ms)
    #[serde(default = "default_startup_poll_interval")]
    pub startup_poll_interval_ms: u64,

    /// Liveness probes before giving up on startup
    #[serde(default = "default_startup_attempts")]
    pub startup_max_attempts: u32,

    /// Wait between the graceful shutdown request and a forced kill (s)
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

fn default_engine_host() -> String {
    String::from("127.0.0.1")
}

fn default_engine_port() -> u16 {
    8090
}

fn default_mode() -> String {
    String::from("normal")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_startup_poll_interval() -> u64 {
    2000
}

fn default_startup_attempts() -> u32 {
    30
}

fn default_shutdown_grace() -> u64 {
    5
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            host: default_engine_host(),
            port: default_engine_port(),
            api_key: None,
            launch_command: None,
            launch_args: Vec::new(),
            mode: default_mode(),
            request_timeout_seconds: default_request_timeout(),
            startup_poll_interval_ms: default_startup_poll_interval(),
            startup_max_attempts: default_startup_attempts(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

/// Orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// URLs registered concurrently within a batch
    #[serde(default = "default_access_sub_batch")]
    pub access_sub_batch_size: usize,

    /// Pause between access sub-batches (ms)
    #[serde(default = "default_access_pause")]
    pub access_pause_ms: u64,

    /// Concurrent active scans within a batch
    #[serde(default = "default_max_scans")]
    pub max_concurrent_scans: usize,

    /// Cooldown after a failed batch (ms)
    #[serde(default = "default_batch_cooldown")]
    pub batch_cooldown_ms: u64,

    /// Interval between progress polls (ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Unchanged polls tolerated before abandoning a scan with little progress
    #[serde(default = "default_stuck_low")]
    pub stuck_low_threshold: u32,

    /// Unchanged polls tolerated before stopping a scan with significant progress
    #[serde(default = "default_stuck_high")]
    pub stuck_high_threshold: u32,

    /// Progress (percent) after which a scan counts as having done real work
    #[serde(default = "default_significant_progress")]
    pub significant_progress_percent: u8,

    /// Upper bound on waiting for the passive scanner to drain (s)
    #[serde(default = "default_passive_wait")]
    pub passive_settle_max_wait_seconds: u64,
}

fn default_access_sub_batch() -> usize {
    3
}

fn default_access_pause() -> u64 {
    500
}

fn default_max_scans() -> usize {
    2
}

fn default_batch_cooldown() -> u64 {
    2000
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_stuck_low() -> u32 {
    6
}

fn default_stuck_high() -> u32 {
    12
}

fn default_significant_progress() -> u8 {
    30
}

fn default_passive_wait() -> u64 {
    60
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            access_sub_batch_size: default_access_sub_batch(),
            access_pause_ms: default_access_pause(),
            max_concurrent_scans: default_max_scans(),
            batch_cooldown_ms: default_batch_cooldown(),
            poll_interval_ms: default_poll_interval(),
            stuck_low_threshold: default_stuck_low(),
            stuck_high_threshold: default_stuck_high(),
            significant_progress_percent: default_significant_progress(),
            passive_settle_max_wait_seconds: default_passive_wait(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Emit span open/close events
    #[serde(default)]
    pub spans: bool,

    /// Include source file and line in each event
    #[serde(default)]
    pub file_info: bool,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            spans: false,
            file_info: false,
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn engine_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.engine.host = host.into();
        self.config.engine.port = port;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.engine.api_key = Some(key.into());
        self
    }

    pub fn launch_command(mut self, command: impl Into<String>) -> Self {
        self.config.engine.launch_command = Some(command.into());
        self
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.config.engine.mode = mode.into();
        self
    }

    pub fn max_concurrent_scans(mut self, n: usize) -> Self {
        self.config.scan.max_concurrent_scans = n;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.scan.poll_interval_ms = ms;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
