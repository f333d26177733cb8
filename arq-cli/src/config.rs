//! Configuration file support for the ARQ benchmark

use arq_protocol::config::{DEFAULT_RTO, DEFAULT_SEGMENT_COUNT, MAX_SWEEP_WINDOW};
use arq_protocol::{AckPolicy, EngineConfig, LingerConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// UDP port both sides use unless told otherwise
pub const DEFAULT_PORT: u16 = 23460;

/// Which transfer to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TestMode {
    /// Send every segment once, no acknowledgments
    Unreliable,
    /// One segment in flight at a time
    StopWait,
    /// Up to `window_size` segments in flight
    SlidingWindow,
}

impl TestMode {
    /// Map the interactive menu choice to a mode
    pub fn from_menu(choice: u32) -> Option<Self> {
        match choice {
            1 => Some(TestMode::Unreliable),
            2 => Some(TestMode::StopWait),
            3 => Some(TestMode::SlidingWindow),
            _ => None,
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestMode::Unreliable => write!(f, "unreliable"),
            TestMode::StopWait => write!(f, "stop-and-wait"),
            TestMode::SlidingWindow => write!(f, "sliding window"),
        }
    }
}

/// Transfer parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Segments per run
    pub segment_count: u32,
    /// Sliding window size
    pub window_size: usize,
    /// Retransmission timeout in microseconds
    pub rto_us: u64,
    /// "cumulative" or "early-retransmit"
    pub ack_policy: String,
    /// Receiver gives up after this many milliseconds of silence
    pub idle_timeout_ms: Option<u64>,
}

impl Default for EngineSection {
    fn default() -> Self {
        EngineSection {
            segment_count: DEFAULT_SEGMENT_COUNT,
            window_size: 1,
            rto_us: DEFAULT_RTO.as_micros() as u64,
            ack_policy: AckPolicy::default().to_string(),
            idle_timeout_ms: None,
        }
    }
}

/// Responder shutdown parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LingerSection {
    pub count: u32,
    pub interval_ms: u64,
}

impl Default for LingerSection {
    fn default() -> Self {
        let linger = LingerConfig::default();
        LingerSection {
            count: linger.count,
            interval_ms: linger.interval.as_millis() as u64,
        }
    }
}

/// Complete benchmark configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Server host; absent means this process is the server
    pub server: Option<String>,
    /// UDP port
    pub port: u16,
    /// Test to run; absent means ask on stdin
    pub mode: Option<TestMode>,
    /// Run the sliding-window test for every window size up to the maximum
    pub sweep: bool,
    pub engine: EngineSection,
    pub linger: LingerSection,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            server: None,
            port: DEFAULT_PORT,
            mode: None,
            sweep: false,
            engine: EngineSection::default(),
            linger: LingerSection::default(),
        }
    }
}

impl BenchConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: BenchConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build and validate the engine parameters
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let ack_policy: AckPolicy = self
            .engine
            .ack_policy
            .parse()
            .map_err(|e: arq_protocol::ArqError| ConfigError::Invalid(e.to_string()))?;

        let config = EngineConfig::default()
            .with_segment_count(self.engine.segment_count)
            .with_window_size(self.engine.window_size)
            .with_rto(Duration::from_micros(self.engine.rto_us))
            .with_ack_policy(ack_policy)
            .with_idle_timeout(self.engine.idle_timeout_ms.map(Duration::from_millis));

        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.sweep && self.engine.segment_count <= MAX_SWEEP_WINDOW as u32 {
            return Err(ConfigError::Invalid(format!(
                "a window sweep needs more than {} segments per run",
                MAX_SWEEP_WINDOW
            )));
        }
        Ok(config)
    }

    pub fn linger_config(&self) -> LingerConfig {
        LingerConfig {
            count: self.linger.count,
            interval: Duration::from_millis(self.linger.interval_ms),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.port, 23460);
        assert_eq!(config.engine_config().unwrap(), EngineConfig::default());
        assert_eq!(config.linger_config(), LingerConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let config: BenchConfig = toml::from_str(
            r#"
            server = "uw1-320-10"
            mode = "sliding-window"

            [engine]
            window_size = 8
            ack_policy = "cumulative"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.as_deref(), Some("uw1-320-10"));
        assert_eq!(config.mode, Some(TestMode::SlidingWindow));
        assert_eq!(config.port, DEFAULT_PORT);

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.window_size, 8);
        assert_eq!(engine.ack_policy, AckPolicy::Cumulative);
        assert_eq!(engine.segment_count, DEFAULT_SEGMENT_COUNT);
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut config = BenchConfig::default();
        config.mode = Some(TestMode::StopWait);
        config.engine.idle_timeout_ms = Some(5000);
        config.engine.window_size = MAX_SWEEP_WINDOW;

        let toml = config.to_toml().unwrap();
        let parsed: BenchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_engine_settings() {
        let mut config = BenchConfig::default();
        config.engine.window_size = 0;
        assert!(matches!(
            config.engine_config(),
            Err(ConfigError::Invalid(_))
        ));

        let mut config = BenchConfig::default();
        config.engine.ack_policy = "selective".to_string();
        assert!(matches!(
            config.engine_config(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_sweep_needs_runs_longer_than_largest_window() {
        let mut config = BenchConfig::default();
        config.sweep = true;
        config.engine.segment_count = MAX_SWEEP_WINDOW as u32;
        assert!(matches!(
            config.engine_config(),
            Err(ConfigError::Invalid(_))
        ));

        config.engine.segment_count = MAX_SWEEP_WINDOW as u32 + 1;
        assert!(config.engine_config().is_ok());
    }

    #[test]
    fn test_menu_choices() {
        assert_eq!(TestMode::from_menu(1), Some(TestMode::Unreliable));
        assert_eq!(TestMode::from_menu(2), Some(TestMode::StopWait));
        assert_eq!(TestMode::from_menu(3), Some(TestMode::SlidingWindow));
        assert_eq!(TestMode::from_menu(4), None);
    }
}
