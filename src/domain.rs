//! ==============================================================================
//! domain.rs - readings, alarms and the wire schemas they are decoded from
//! ==============================================================================
//!
//! purpose:
//!     the typed values that flow through the sync layer, plus the
//!     schema-validated decoding step at the device boundary. device bodies
//!     are decoded into private `*Wire` structs first, then checked and
//!     converted; anything that does not fit becomes SyncError::Validation
//!     instead of leaking half-filled values into the pipeline.
//!
//! relationships:
//!     - produced by: client.rs (live decode + synthetic generator)
//!     - consumed by: alarms.rs, chart.rs, sync.rs
//!     - uses: physics.rs (boiling point is ALWAYS derived from pressure)
//!
//! ==============================================================================

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::physics;

/// wall-clock unix time in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ==============================================================================
// sensor reading
// ==============================================================================

/// one temperature/pressure sample, live or synthetic
///
/// there is deliberately no way to set `boiling_point_c` directly: every
/// constructor derives it from `pressure_atm` via [`physics::boiling_point`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    /// probe temperature, `None` when the probe reported nothing
    pub temperature_c: Option<f64>,
    pub pressure_atm: f64,
    boiling_point_c: f64,
    pub is_heating: bool,
    pub target_temperature_c: f64,
    pub timestamp_ms: i64,
}

impl SensorReading {
    pub fn new(
        temperature_c: Option<f64>,
        pressure_atm: f64,
        is_heating: bool,
        target_temperature_c: f64,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            temperature_c,
            pressure_atm,
            boiling_point_c: physics::boiling_point(pressure_atm),
            is_heating,
            target_temperature_c,
            timestamp_ms,
        }
    }

    pub fn boiling_point_c(&self) -> f64 {
        self.boiling_point_c
    }

    /// decode a `/sensor_data` body
    ///
    /// the device's own `boiling_point` field is ignored. when the device
    /// timestamp is missing or unparseable `received_at_ms` is used.
    pub fn from_wire(body: Value, received_at_ms: i64) -> SyncResult<Self> {
        let wire: SensorDataWire = serde_json::from_value(body)
            .map_err(|e| SyncError::validation(format!("sensor_data: {e}")))?;

        let pressure = wire.pressure.pressure;
        if !pressure.is_finite() || pressure <= 0.0 {
            return Err(SyncError::validation(format!(
                "sensor_data: pressure out of range ({pressure})"
            )));
        }
        if let Some(t) = wire.temperature.temperature {
            if !t.is_finite() {
                return Err(SyncError::validation("sensor_data: temperature is not finite"));
            }
        }

        let timestamp_ms = wire
            .timestamp
            .as_deref()
            .and_then(parse_device_timestamp)
            .unwrap_or(received_at_ms);

        Ok(Self::new(
            wire.temperature.temperature,
            pressure,
            wire.temperature.is_heating,
            wire.temperature.target_temperature,
            timestamp_ms,
        ))
    }
}

#[derive(Deserialize)]
struct SensorDataWire {
    temperature: TemperatureWire,
    pressure: PressureWire,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Deserialize)]
struct TemperatureWire {
    temperature: Option<f64>,
    #[serde(default)]
    is_heating: bool,
    #[serde(default = "default_target_temperature")]
    target_temperature: f64,
}

#[derive(Deserialize)]
struct PressureWire {
    pressure: f64,
}

fn default_target_temperature() -> f64 {
    100.0
}

/// device timestamps are python `isoformat()` strings, usually without an
/// offset (device local time)
fn parse_device_timestamp(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp_millis())
}

// ==============================================================================
// connection state
// ==============================================================================

/// link health as inferred by the remote client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionState {
    pub connected: bool,
    pub consecutive_failures: u32,
    pub last_success_ms: Option<i64>,
}

// ==============================================================================
// alarms
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    Temperature,
    Time,
    Boiling,
    BoilingThenTime,
    SensorFailure,
    /// a type this build does not know; still shown and counted
    Other,
}

impl AlarmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmKind::Temperature => "temperature",
            AlarmKind::Time => "time",
            AlarmKind::Boiling => "boiling",
            AlarmKind::BoilingThenTime => "boiling_then_time",
            AlarmKind::SensorFailure => "sensor_failure",
            AlarmKind::Other => "other",
        }
    }

    /// map the device's `type` string (case-insensitive, several spellings).
    /// the two stages of boiling-then-time mode both map to `BoilingThenTime`.
    fn from_wire(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "temperature" | "temperature_threshold" => Some(AlarmKind::Temperature),
            "time" | "time_based" | "custom_timer" => Some(AlarmKind::Time),
            "boiling" | "boiling_point" => Some(AlarmKind::Boiling),
            "boiling_then_time" | "boiling_start" | "time_complete" => {
                Some(AlarmKind::BoilingThenTime)
            }
            "sensor_failure" => Some(AlarmKind::SensorFailure),
            _ => None,
        }
    }
}

impl fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmPriority {
    Normal,
    Critical,
}

/// a raised alarm. immutable: the active set is replaced wholesale each poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alarm {
    id: String,
    kind: AlarmKind,
    message: String,
    raised_at_ms: i64,
    priority: AlarmPriority,
}

impl Alarm {
    pub fn new(
        id: impl Into<String>,
        kind: AlarmKind,
        message: impl Into<String>,
        raised_at_ms: i64,
        priority: AlarmPriority,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            message: message.into(),
            raised_at_ms,
            priority,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> AlarmKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn raised_at_ms(&self) -> i64 {
        self.raised_at_ms
    }

    pub fn priority(&self) -> AlarmPriority {
        self.priority
    }
}

/// alarms in server-reported order, unique by id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ActiveAlarmSet(Vec<Alarm>);

impl ActiveAlarmSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// build a set, rejecting duplicate ids
    pub fn from_alarms(alarms: Vec<Alarm>) -> SyncResult<Self> {
        {
            let mut seen = HashSet::with_capacity(alarms.len());
            for alarm in &alarms {
                if !seen.insert(alarm.id.as_str()) {
                    return Err(SyncError::validation(format!(
                        "alarms: duplicate id {}",
                        alarm.id
                    )));
                }
            }
        }
        Ok(Self(alarms))
    }

    /// decode an `/alarms` body
    pub fn from_wire(body: Value) -> SyncResult<Self> {
        let wire: AlarmsWire = serde_json::from_value(body)
            .map_err(|e| SyncError::validation(format!("alarms: {e}")))?;

        let mut alarms = Vec::with_capacity(wire.active_alarms.len());
        for a in wire.active_alarms {
            // one unrecognised alarm must not blank the rest of the set
            let kind = AlarmKind::from_wire(&a.kind).unwrap_or_else(|| {
                tracing::warn!(id = %a.id, kind = %a.kind, "unknown alarm type");
                AlarmKind::Other
            });
            let priority = if a.priority.eq_ignore_ascii_case("critical") {
                AlarmPriority::Critical
            } else {
                AlarmPriority::Normal
            };
            // device reports epoch seconds as a float
            let raised_at_ms = (a.timestamp * 1000.0).round() as i64;
            alarms.push(Alarm::new(a.id, kind, a.message, raised_at_ms, priority));
        }
        Self::from_alarms(alarms)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// most recently reported alarm (last in server order)
    pub fn last(&self) -> Option<&Alarm> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Alarm> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Alarm] {
        &self.0
    }
}

#[derive(Deserialize)]
struct AlarmsWire {
    #[serde(default)]
    active_alarms: Vec<AlarmWire>,
}

#[derive(Deserialize)]
struct AlarmWire {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    message: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    timestamp: f64,
}

// ==============================================================================
// history, status, settings
// ==============================================================================

/// one sample of `/historical_data`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp_ms: i64,
    pub temperature_c: f64,
    pub pressure_atm: f64,
    pub boiling_point_c: f64,
}

impl HistoryPoint {
    pub fn new(timestamp_ms: i64, temperature_c: f64, pressure_atm: f64) -> Self {
        Self {
            timestamp_ms,
            temperature_c,
            pressure_atm,
            boiling_point_c: physics::boiling_point(pressure_atm),
        }
    }
}

#[derive(Deserialize)]
struct HistoryWire {
    timestamps: Vec<String>,
    temperatures: Vec<f64>,
    pressures: Vec<f64>,
}

/// decode `/historical_data` (parallel arrays) into points, oldest first
pub fn history_from_wire(body: Value) -> SyncResult<Vec<HistoryPoint>> {
    let wire: HistoryWire = serde_json::from_value(body)
        .map_err(|e| SyncError::validation(format!("historical_data: {e}")))?;
    let n = wire.timestamps.len();
    if wire.temperatures.len() != n || wire.pressures.len() != n {
        return Err(SyncError::validation(
            "historical_data: series have different lengths",
        ));
    }
    wire.timestamps
        .iter()
        .zip(wire.temperatures)
        .zip(wire.pressures)
        .map(|((ts, t), p)| {
            let ms = parse_device_timestamp(ts).ok_or_else(|| {
                SyncError::validation(format!("historical_data: bad timestamp {ts:?}"))
            })?;
            Ok(HistoryPoint::new(ms, t, p))
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorHealth {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub failed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorsStatus {
    #[serde(default)]
    pub temperature: SensorHealth,
    #[serde(default)]
    pub pressure: SensorHealth,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MqttStatus {
    #[serde(default)]
    pub connected: bool,
}

/// `/system/status` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub sensors: SensorsStatus,
    #[serde(default)]
    pub mqtt: MqttStatus,
    #[serde(default)]
    pub data_collection: bool,
}

impl SystemStatus {
    /// what we report when the device cannot be reached: every sensor down
    pub fn offline() -> Self {
        let down = SensorHealth { active: false, failed: true };
        Self {
            sensors: SensorsStatus {
                temperature: down.clone(),
                pressure: down,
            },
            mqtt: MqttStatus { connected: false },
            data_collection: false,
        }
    }
}

/// `/settings` body. unknown keys are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "default_temperature_threshold")]
    pub temperature_threshold: f64,
    #[serde(default = "default_time_threshold")]
    pub time_threshold: u64,
    /// poll cadence requested by the operator (ms)
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_temperature_threshold() -> f64 {
    95.0
}

fn default_time_threshold() -> u64 {
    300
}

fn default_update_interval() -> u64 {
    2000
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            temperature_threshold: default_temperature_threshold(),
            time_threshold: default_time_threshold(),
            update_interval: default_update_interval(),
            extra: serde_json::Map::new(),
        }
    }
}
