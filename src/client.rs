//! ==============================================================================
//! client.rs - remote client with retry, link health and degraded reads
//! ==============================================================================
//!
//! purpose:
//!     everything that talks to the thermometer goes through RemoteClient.
//!     it owns the retry policy and the ConnectionState, and it decides what
//!     a failure MEANS for each kind of call:
//!
//! ```text
//!     read path (sensor data, history, status, settings)
//!         never fails. terminal errors are absorbed into a best-available
//!         value. sensor data falls back to a synthetic but physically
//!         consistent reading; the caller learns about the outage only from
//!         the connection flag.
//!
//!     alarms
//!         never fails, but NEVER fabricates: an outage yields an empty set.
//!
//!     control path (heating, target, altitude, alarms config, start/stop)
//!         always surfaces failure to the caller. silently failing to turn
//!         heat off is not acceptable.
//! ```
//!
//! retry policy:
//!     up to max_retries + 1 attempts, attempt k (0-indexed) first waits
//!     retry_base_delay * k. linear, so the worst case stays bounded on a LAN.
//!
//! relationships:
//!     - uses: transport.rs (one attempt), domain.rs (decode), physics.rs
//!     - used by: sync.rs (SyncController)
//!
//! ==============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::alarms::AlarmConfig;
use crate::config::{DashboardConfig, LimitsConfig, PollConfig};
use crate::domain::{
    history_from_wire, now_ms, ActiveAlarmSet, ConnectionState, DeviceSettings, HistoryPoint,
    SensorReading, SystemStatus,
};
use crate::error::{NetworkError, SyncError, SyncResult};
use crate::physics;
use crate::transport::{Method, Transport};

pub const SYNTHETIC_PRESSURE_RANGE: (f64, f64) = (0.95, 1.05);
pub const SYNTHETIC_TEMPERATURE_RANGE: (f64, f64) = (20.0, 100.0);
const SIMULATED_HISTORY_POINTS: usize = 20;
const SIMULATED_HISTORY_STEP_MS: i64 = 10_000;

/// retry policy + per-attempt timeouts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientOptions {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
}

impl ClientOptions {
    pub fn from_config(config: &DashboardConfig) -> Self {
        let poll: PollConfig = config.polling.poll_config();
        Self {
            max_retries: poll.max_retries,
            retry_base_delay: poll.retry_base_delay(),
            request_timeout: Duration::from_millis(config.device.request_timeout_ms),
            probe_timeout: Duration::from_millis(config.device.probe_timeout_ms),
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}

/// where to put the probe: a raw altitude or one of the named presets
#[derive(Debug, Clone, PartialEq)]
pub enum AltitudeTarget {
    Meters(f64),
    Preset(String),
}

/// connection report for status displays
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub base_url: String,
    pub consecutive_failures: u32,
    pub last_success_ms: Option<i64>,
}

pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    options: ClientOptions,
    limits: LimitsConfig,
    state: Mutex<ConnectionState>,
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>, options: ClientOptions, limits: LimitsConfig) -> Self {
        Self {
            transport,
            options,
            limits,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let state = self.connection_state();
        ConnectionStatus {
            connected: state.connected,
            base_url: self.transport.base_url().to_string(),
            consecutive_failures: state.consecutive_failures,
            last_success_ms: state.last_success_ms,
        }
    }

    // ==========================================================================
    // core request loop
    // ==========================================================================

    /// one logical operation with the full retry policy
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<Value, NetworkError> {
        let total = self.options.max_retries + 1;
        let mut last_cause = String::new();

        for attempt in 0..total {
            if attempt > 0 {
                tokio::time::sleep(self.options.retry_base_delay * attempt).await;
            }

            match self
                .transport
                .send(method, endpoint, body.as_ref(), self.options.request_timeout)
                .await
            {
                Ok(value) => {
                    self.record_success();
                    if attempt > 0 {
                        debug!(endpoint, attempt = attempt + 1, "request recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        method = method.as_str(),
                        endpoint,
                        attempt = attempt + 1,
                        of = total,
                        error = %e,
                        "device request attempt failed"
                    );
                    last_cause = e.to_string();
                }
            }
        }

        let failures = self.record_failure();
        warn!(endpoint, attempts = total, consecutive_failures = failures, "device unreachable");
        Err(NetworkError { cause: last_cause, attempts: total })
    }

    fn record_success(&self) {
        let mut state = self.state.lock();
        if !state.connected {
            info!("device link up");
        }
        state.connected = true;
        state.consecutive_failures = 0;
        state.last_success_ms = Some(now_ms());
    }

    fn record_failure(&self) -> u32 {
        let mut state = self.state.lock();
        state.connected = false;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.consecutive_failures
    }

    /// lightweight probe: single attempt, short timeout, outside the retry
    /// policy. only touches the connected flag.
    pub async fn check_connection(&self) -> bool {
        let ok = self
            .transport
            .send(Method::Get, "/system/status", None, self.options.probe_timeout)
            .await
            .is_ok();
        let mut state = self.state.lock();
        state.connected = ok;
        if ok {
            state.last_success_ms = Some(now_ms());
        }
        ok
    }

    // ==========================================================================
    // read path
    // ==========================================================================

    /// live reading, or a synthetic one when the device cannot be read
    pub async fn get_sensor_data(&self) -> SensorReading {
        let result = match self.request(Method::Get, "/sensor_data", None).await {
            Ok(body) => SensorReading::from_wire(body, now_ms()),
            Err(e) => Err(SyncError::from(e)),
        };
        match result {
            Ok(reading) => reading,
            Err(e) => {
                warn!(error = %e, "sensor read failed - serving synthetic reading");
                synthetic_reading(&mut rand::thread_rng(), now_ms())
            }
        }
    }

    /// active alarms; empty (never invented) when the device cannot be read
    pub async fn get_alarms(&self) -> ActiveAlarmSet {
        let result = match self.request(Method::Get, "/alarms", None).await {
            Ok(body) => ActiveAlarmSet::from_wire(body),
            Err(e) => Err(SyncError::from(e)),
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "alarm read failed - reporting no active alarms");
            ActiveAlarmSet::empty()
        })
    }

    /// recorded history, or a simulated window when it cannot be read
    pub async fn get_historical_data(&self) -> Vec<HistoryPoint> {
        let result = match self.request(Method::Get, "/historical_data", None).await {
            Ok(body) => history_from_wire(body),
            Err(e) => Err(SyncError::from(e)),
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "history read failed - serving simulated history");
            simulated_history(&mut rand::thread_rng(), now_ms())
        })
    }

    pub async fn get_system_status(&self) -> SystemStatus {
        let result = match self.request(Method::Get, "/system/status", None).await {
            Ok(body) => serde_json::from_value(body)
                .map_err(|e| SyncError::validation(format!("system/status: {e}"))),
            Err(e) => Err(SyncError::from(e)),
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "status read failed - reporting offline");
            SystemStatus::offline()
        })
    }

    pub async fn get_settings(&self) -> DeviceSettings {
        let result = match self.request(Method::Get, "/settings", None).await {
            Ok(body) => serde_json::from_value(body)
                .map_err(|e| SyncError::validation(format!("settings: {e}"))),
            Err(e) => Err(SyncError::from(e)),
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "settings read failed - using defaults");
            DeviceSettings::default()
        })
    }

    // ==========================================================================
    // control path - failures always reach the caller
    // ==========================================================================

    pub async fn update_settings(&self, settings: &DeviceSettings) -> SyncResult<DeviceSettings> {
        if settings.update_interval == 0 {
            return Err(SyncError::validation("update interval must be greater than zero"));
        }
        let body = serde_json::to_value(settings)
            .map_err(|e| SyncError::validation(format!("settings: {e}")))?;
        // the device only acks; what we sent is what is now in force
        self.control("/settings", Some(body)).await?;
        Ok(settings.clone())
    }

    pub async fn control_heating(&self, on: bool) -> SyncResult<Value> {
        self.control("/control/heating", Some(json!({ "heating": on }))).await
    }

    pub async fn set_target_temperature(&self, temperature_c: f64) -> SyncResult<Value> {
        let limits = &self.limits;
        if !temperature_c.is_finite()
            || temperature_c < limits.temp_min
            || temperature_c > limits.temp_max
        {
            return Err(SyncError::validation(format!(
                "target temperature must be between {} and {} °C",
                limits.temp_min, limits.temp_max
            )));
        }
        self.control(
            "/control/target_temperature",
            Some(json!({ "temperature": temperature_c })),
        )
        .await
    }

    pub async fn set_altitude(&self, target: &AltitudeTarget) -> SyncResult<Value> {
        let body = match target {
            AltitudeTarget::Meters(m) => {
                if !m.is_finite() || *m < 0.0 || *m > self.limits.altitude_max {
                    return Err(SyncError::validation(format!(
                        "altitude must be between 0 and {} m",
                        self.limits.altitude_max
                    )));
                }
                json!({ "altitude": m })
            }
            AltitudeTarget::Preset(key) => {
                if physics::find_preset(key).is_none() {
                    return Err(SyncError::validation(format!("unknown altitude preset {key:?}")));
                }
                json!({ "preset": key })
            }
        };
        self.control("/control/altitude", Some(body)).await
    }

    pub async fn configure_alarms(&self, config: &AlarmConfig) -> SyncResult<Value> {
        config.validate(&self.limits)?;
        let body = serde_json::to_value(config)
            .map_err(|e| SyncError::validation(format!("alarm config: {e}")))?;
        self.control("/alarms/configure", Some(body)).await
    }

    pub async fn clear_alarms(&self) -> SyncResult<Value> {
        self.control("/alarms/clear", None).await
    }

    pub async fn start_system(&self) -> SyncResult<Value> {
        let ack = self.control("/system/start", None).await?;
        expect_success_status(ack)
    }

    pub async fn stop_system(&self) -> SyncResult<Value> {
        let ack = self.control("/system/stop", None).await?;
        expect_success_status(ack)
    }

    async fn control(&self, endpoint: &str, body: Option<Value>) -> SyncResult<Value> {
        let ack = self.request(Method::Post, endpoint, body).await?;
        if ack.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(SyncError::Rejected(ack_message(&ack)));
        }
        info!(endpoint, "control command acknowledged");
        Ok(ack)
    }
}

/// start/stop acks carry `status: "success"`; anything else is a refusal
fn expect_success_status(ack: Value) -> SyncResult<Value> {
    match ack.get("status").and_then(Value::as_str) {
        Some("success") => Ok(ack),
        _ => Err(SyncError::Rejected(ack_message(&ack))),
    }
}

fn ack_message(ack: &Value) -> String {
    ack.get("message")
        .or_else(|| ack.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("no reason given")
        .to_string()
}

// ==============================================================================
// synthetic data
// ==============================================================================
// degraded-mode readings. the boiling point goes through physics.rs exactly
// like a live reading does, so the two can never disagree.

pub fn synthetic_reading<R: Rng>(rng: &mut R, timestamp_ms: i64) -> SensorReading {
    let pressure = rng.gen_range(SYNTHETIC_PRESSURE_RANGE.0..=SYNTHETIC_PRESSURE_RANGE.1);
    let temperature = rng.gen_range(SYNTHETIC_TEMPERATURE_RANGE.0..=SYNTHETIC_TEMPERATURE_RANGE.1);
    SensorReading::new(Some(temperature), pressure, rng.gen_bool(0.3), 100.0, timestamp_ms)
}

/// 20 points, 10 s apart, ending at `now_ms`, oldest first
pub fn simulated_history<R: Rng>(rng: &mut R, now_ms: i64) -> Vec<HistoryPoint> {
    (0..SIMULATED_HISTORY_POINTS)
        .rev()
        .map(|i| {
            let ts = now_ms - i as i64 * SIMULATED_HISTORY_STEP_MS;
            let pressure = rng.gen_range(0.975..=1.025);
            let temperature = rng.gen_range(SYNTHETIC_TEMPERATURE_RANGE.0..=SYNTHETIC_TEMPERATURE_RANGE.1);
            HistoryPoint::new(ts, temperature, pressure)
        })
        .collect()
}
