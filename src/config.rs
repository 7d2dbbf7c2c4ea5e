//! ==============================================================================
//! config.rs - dashboard configuration loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `dashboard.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - DeviceConfig: where the thermometer lives and how long to wait for it.
//!     - PollingConfig: cadence (idle / running / stopped) and retry policy.
//!     - ChartConfig: sliding window size.
//!     - LimitsConfig: operator input bounds checked before any request.
//!     - ServerConfig: where the JSON surface for the browser listens.
//!     - LoggingConfig: tracing level and output format.
//!
//! every section is optional in the file; missing keys take the defaults below.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub device: DeviceConfig,
    pub polling: PollingConfig,
    pub chart: ChartConfig,
    pub limits: LimitsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceConfig {
    /// base url of the device's REST surface, e.g. http://thermo.local:5000/api
    pub base_url: String,
    pub device_id: String,
    /// per-attempt timeout for data and control calls
    pub request_timeout_ms: u64,
    /// timeout for the single-shot connection probe
    pub probe_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            device_id: "smart_thermometer_001".to_string(),
            request_timeout_ms: 10_000,
            probe_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    /// cadence used before the operator starts or stops the system
    pub interval_ms: u64,
    pub running_interval_ms: u64,
    pub stopped_interval_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            running_interval_ms: 1_000,
            stopped_interval_ms: 5_000,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChartConfig {
    pub max_points: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self { max_points: 50 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub temp_min: f64,
    pub temp_max: f64,
    pub altitude_max: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { temp_min: 10.0, temp_max: 120.0, altitude_max: 9_000.0 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

// ==============================================================================
// poll config
// ==============================================================================
// the slice of configuration the sync layer actually runs on. it is a plain
// value: runtime changes build a new PollConfig and swap it in whole.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// same retry policy, different cadence
    pub fn with_interval(self, interval_ms: u64) -> Self {
        Self { interval_ms, ..self }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        PollingConfig::default().poll_config()
    }
}

impl PollingConfig {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval_ms: self.interval_ms,
            max_retries: self.max_retries,
            retry_base_delay_ms: self.retry_base_delay_ms,
        }
    }
}

impl DashboardConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: DashboardConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("dashboard.toml"),
            PathBuf::from("..").join("config").join("dashboard.toml"),
        ];
        Self::load_first_or_default(&paths)
    }

    /// first readable + valid file wins; otherwise defaults
    pub fn load_first_or_default(paths: &[PathBuf]) -> Self {
        for path in paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "configuration loaded");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to load configuration");
                    }
                }
            }
        }

        tracing::warn!("no config file found - using defaults");
        Self::default()
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.polling.interval_ms == 0
            || self.polling.running_interval_ms == 0
            || self.polling.stopped_interval_ms == 0
        {
            anyhow::bail!("polling intervals must be greater than zero");
        }
        if self.chart.max_points == 0 {
            anyhow::bail!("chart.max_points must be greater than zero");
        }
        if self.limits.temp_min > self.limits.temp_max {
            anyhow::bail!("limits.temp_min is above limits.temp_max");
        }
        Ok(())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            device = %self.device.base_url,
            device_id = %self.device.device_id,
            poll_interval_ms = self.polling.interval_ms,
            max_retries = self.polling.max_retries,
            retry_base_delay_ms = self.polling.retry_base_delay_ms,
            chart_points = self.chart.max_points,
            bind = %self.server.bind,
            "dashboard configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = DashboardConfig::default();
        assert_eq!(config.polling.interval_ms, 2_000);
        assert_eq!(config.polling.running_interval_ms, 1_000);
        assert_eq!(config.polling.stopped_interval_ms, 5_000);
        assert_eq!(config.polling.max_retries, 3);
        assert_eq!(config.chart.max_points, 50);
        assert_eq!(config.device.request_timeout_ms, 10_000);
        assert_eq!(config.device.probe_timeout_ms, 5_000);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[device]
base_url = "http://10.0.0.7:5000/api"

[polling]
max_retries = 5

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = DashboardConfig::load(file.path()).unwrap();
        assert_eq!(config.device.base_url, "http://10.0.0.7:5000/api");
        assert_eq!(config.device.request_timeout_ms, 10_000);
        assert_eq!(config.polling.max_retries, 5);
        assert_eq!(config.polling.interval_ms, 2_000);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chart]\nmax_points = 0").unwrap();
        assert!(DashboardConfig::load(file.path()).is_err());

        let config = DashboardConfig::load_first_or_default(&[
            PathBuf::from("/definitely/not/here.toml"),
            file.path().to_path_buf(),
        ]);
        assert_eq!(config.chart.max_points, 50);
    }

    #[test]
    fn poll_config_swaps_cadence_only() {
        let poll = PollingConfig::default().poll_config();
        let fast = poll.with_interval(1_000);
        assert_eq!(fast.interval(), Duration::from_millis(1_000));
        assert_eq!(fast.max_retries, poll.max_retries);
        assert_eq!(fast.retry_base_delay(), Duration::from_millis(1_000));
    }
}
