use serde::{Deserialize, Serialize};
use stagerelay_emitter::EmitterConfig;
use stagerelay_emitter::config::{DEFAULT_FAULT_RATE, parse_fault_rate};
use stagerelay_relay::HttpClientConfig;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub emitter: EmitterSettings,

    #[serde(default)]
    pub relay: RelaySettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterSettings {
    #[serde(default = "default_emitter_port")]
    pub port: u16,

    /// Probability of an injected fault before each stage
    #[serde(default = "default_fault_rate")]
    pub fault_rate: f64,

    #[serde(default = "default_stage_interval_ms")]
    pub stage_interval_ms: u64,

    /// Custom stage texts; the built-in six when empty
    #[serde(default)]
    pub stages: Vec<String>,

    #[serde(default = "default_emitter_origin")]
    pub cors_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_relay_port")]
    pub port: u16,

    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,

    #[serde(default = "default_relay_origin")]
    pub cors_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub log_requests: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            emitter: EmitterSettings::default(),
            relay: RelaySettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            port: default_emitter_port(),
            fault_rate: default_fault_rate(),
            stage_interval_ms: default_stage_interval_ms(),
            stages: Vec::new(),
            cors_origin: default_emitter_origin(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            port: default_relay_port(),
            upstream_url: default_upstream_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
            cors_origin: default_relay_origin(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_requests: false,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        // Fault rate keeps its historical name, no STAGERELAY_ prefix
        if let Ok(val) = std::env::var("ERROR_RATE") {
            self.emitter.fault_rate = parse_fault_rate(Some(&val));
        }

        if let Ok(val) = std::env::var("STAGERELAY_STAGE_INTERVAL_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.emitter.stage_interval_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("STAGERELAY_EMITTER_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                self.emitter.port = port;
            }
        }

        if let Ok(val) = std::env::var("STAGERELAY_RELAY_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                self.relay.port = port;
            }
        }

        if let Ok(val) = std::env::var("STAGERELAY_UPSTREAM_URL") {
            self.relay.upstream_url = val;
        }

        // Logging settings
        if let Ok(val) = std::env::var("STAGERELAY_LOG_REQUESTS") {
            if let Ok(enabled) = val.parse::<bool>() {
                self.logging.log_requests = enabled;
            }
        }

        if let Ok(val) = std::env::var("STAGERELAY_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("STAGERELAY_HOST") {
            self.host = val;
        }
    }

    pub fn emitter_config(&self) -> stagerelay_core::Result<EmitterConfig> {
        let config = EmitterConfig::new(
            self.emitter.fault_rate,
            Duration::from_millis(self.emitter.stage_interval_ms),
        )?;

        if self.emitter.stages.is_empty() {
            Ok(config)
        } else {
            Ok(config.with_stages(self.emitter.stages.iter().cloned()))
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            connect_timeout_secs: self.relay.connect_timeout_secs,
            pool_max_idle_per_host: self.relay.pool_max_idle_per_host,
            pool_idle_timeout_secs: self.relay.pool_idle_timeout_secs,
            ..HttpClientConfig::default()
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_emitter_port() -> u16 {
    3002
}

fn default_relay_port() -> u16 {
    3001
}

fn default_fault_rate() -> f64 {
    DEFAULT_FAULT_RATE
}

fn default_stage_interval_ms() -> u64 {
    1000
}

fn default_upstream_url() -> String {
    "http://localhost:3002".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_pool_max_idle_per_host() -> usize {
    32
}

fn default_pool_idle_timeout_secs() -> u64 {
    90
}

fn default_emitter_origin() -> String {
    "http://localhost:3001".to_string()
}

fn default_relay_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}
