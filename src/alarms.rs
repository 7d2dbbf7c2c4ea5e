//! ==============================================================================
//! alarms.rs - alarm reconciliation and alarm configuration
//! ==============================================================================
//!
//! purpose:
//!     decides, poll after poll, whether the presentation layer has to hear
//!     about the alarm set again. the device re-sends the whole active set on
//!     every poll; re-notifying on each one would spam the operator.
//!
//! change detection is COUNT based: two sets are "different" iff their sizes
//! differ. swapping one alarm for another of the same count is not reported.
//! this matches what operators already see from the dashboard and is kept as
//! an auditable limitation - tightening it would change when notifications
//! fire.
//!
//! relationships:
//!     - used by: sync.rs (AlarmTracker holds the last-seen set)
//!     - used by: client.rs (AlarmConfig is the /alarms/configure body)
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};

use crate::config::LimitsConfig;
use crate::domain::{ActiveAlarmSet, Alarm};
use crate::error::{SyncError, SyncResult};

/// outcome of comparing two consecutive alarm sets
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlarmDecision {
    pub changed: bool,
    /// alarm to surface as "new", only when `changed` and the set is non-empty
    pub newest: Option<Alarm>,
}

/// pure comparison of the previous and current active sets
pub fn reconcile(previous: &ActiveAlarmSet, current: &ActiveAlarmSet) -> AlarmDecision {
    if previous.len() == current.len() {
        return AlarmDecision::default();
    }
    AlarmDecision {
        changed: true,
        newest: current.last().cloned(),
    }
}

/// remembers the last-seen set between polls
#[derive(Debug, Default)]
pub struct AlarmTracker {
    last_seen: ActiveAlarmSet,
}

impl AlarmTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// compare against the last-seen set; on change the new set replaces it
    pub fn observe(&mut self, current: ActiveAlarmSet) -> AlarmDecision {
        let decision = reconcile(&self.last_seen, &current);
        if decision.changed {
            self.last_seen = current;
        }
        decision
    }

    pub fn last_seen(&self) -> &ActiveAlarmSet {
        &self.last_seen
    }

    /// forget everything, e.g. after the operator cleared alarms on the device
    pub fn reset(&mut self) {
        self.last_seen = ActiveAlarmSet::empty();
    }
}

// ==============================================================================
// alarm configuration
// ==============================================================================

/// the four mutually exclusive alarm modes the device supports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AlarmConfig {
    /// fire when the probe reaches `threshold` °C
    TemperatureOnly { threshold: f64 },
    /// fire after `duration` seconds
    TimeOnly { duration: u64 },
    /// fire at boiling point + `offset` °C
    BoilingOnly { offset: f64 },
    /// start a `duration` second timer once boiling (+ `offset`) is reached
    BoilingThenTime { duration: u64, offset: f64 },
}

impl AlarmConfig {
    pub fn validate(&self, limits: &LimitsConfig) -> SyncResult<()> {
        match *self {
            AlarmConfig::TemperatureOnly { threshold } => {
                if !threshold.is_finite()
                    || threshold < limits.temp_min
                    || threshold > limits.temp_max
                {
                    return Err(SyncError::validation(format!(
                        "alarm threshold must be between {} and {} °C",
                        limits.temp_min, limits.temp_max
                    )));
                }
            }
            AlarmConfig::TimeOnly { duration } => check_duration(duration)?,
            AlarmConfig::BoilingOnly { offset } => check_offset(offset)?,
            AlarmConfig::BoilingThenTime { duration, offset } => {
                check_duration(duration)?;
                check_offset(offset)?;
            }
        }
        Ok(())
    }
}

fn check_duration(duration: u64) -> SyncResult<()> {
    if duration == 0 {
        return Err(SyncError::validation("alarm duration must be at least one second"));
    }
    Ok(())
}

fn check_offset(offset: f64) -> SyncResult<()> {
    if !offset.is_finite() {
        return Err(SyncError::validation("boiling offset must be a finite number"));
    }
    Ok(())
}
