use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    #[serde(default)]
    pub realtime: RealtimeSettings,
    #[serde(default)]
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub http_addr: String,
    pub ws_addr: String,
}

/// Bounds for realtime connections. Components receive this struct
/// explicitly so tests can shrink queues and timers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// Frames a connection may have queued before it is evicted.
    pub outbound_queue_capacity: usize,
    pub heartbeat_interval_ms: u64,
    /// A peer silent for longer than this is closed.
    pub pong_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,
    pub shutdown_grace_ms: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 256,
            heartbeat_interval_ms: 54_000,
            pong_timeout_ms: 60_000,
            write_timeout_ms: 10_000,
            max_message_size: 512,
            shutdown_grace_ms: 2_000,
        }
    }
}

impl RealtimeSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Upper bound on `pageSize`; 0 disables the cap.
    pub max_page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { max_page_size: 1000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Directory of the daily-rolling log file; empty disables the file sink.
    pub log_dir: String,
    #[serde(default = "default_log_file")]
    pub file_name: String,
    pub stdout_level: String,
    pub file_level: String,
}

fn default_log_file() -> String {
    "gridsync.log".to_string()
}

/// Environment keys override file values, e.g. `GRIDSYNC__SERVER__WS_ADDR`.
pub const OVERRIDE_PREFIX: &str = "GRIDSYNC";

/// Loads settings from `path` (the extension may be omitted), then applies
/// environment overrides.
pub fn load_settings_from(path: &str) -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(
            config::Environment::with_prefix(OVERRIDE_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
