//! ==============================================================================
//! sync.rs - the sync controller
//! ==============================================================================
//!
//! purpose:
//!     composes client, scheduler, chart buffer and alarm tracker into the
//!     thing presentation code talks to. every poll tick spawns one refresh
//!     cycle; a refresh fetches sensor data and alarms as two independent
//!     futures and applies each one the moment it completes.
//!
//! overlapping refreshes:
//!     the scheduler does not wait for in-flight work, so refresh n may still
//!     be running when refresh n+1 starts. every refresh takes a monotonic
//!     sequence number; a result is applied only if its sequence is newer than
//!     the last one applied for that stream (sensor and alarms are tracked
//!     separately). a stale completion arriving late is discarded instead of
//!     clobbering fresher state.
//!
//! outbound surface:
//!     - snapshot()          pull: {connection, latest_reading, active_alarms, ...}
//!     - subscribe()         push: alarm-set and connection changes, failed commands
//!     - chart_snapshot() / series()   read-only copies of the chart window
//!
//! relationships:
//!     - uses: client.rs, scheduler.rs, chart.rs, alarms.rs
//!     - used by: main.rs (http surface)
//!
//! ==============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::alarms::{AlarmConfig, AlarmTracker};
use crate::chart::{ChartBuffer, ChartPoint, ChartSnapshot, Channel};
use crate::client::{AltitudeTarget, ConnectionStatus, RemoteClient};
use crate::config::{PollConfig, PollingConfig};
use crate::domain::{
    ActiveAlarmSet, Alarm, ConnectionState, DeviceSettings, SensorReading, SystemStatus,
};
use crate::error::{SyncError, SyncResult};
use crate::scheduler::{PollScheduler, TickFn};

const EVENT_CAPACITY: usize = 64;

/// consolidated, read-only view of the synced state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub connection: ConnectionState,
    pub latest_reading: Option<SensorReading>,
    pub active_alarms: ActiveAlarmSet,
    /// did the most recently applied alarm poll change the set
    pub alarm_changed: bool,
    /// whether the device system was last started (true) or stopped (false)
    pub running: bool,
    pub poll_interval_ms: u64,
    /// sequence number of the refresh that produced `latest_reading`
    pub reading_seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    AlarmsChanged {
        alarms: ActiveAlarmSet,
        newest: Option<Alarm>,
    },
    ConnectionChanged {
        connected: bool,
    },
    /// a control command failed and the operator must be told
    CommandFailed {
        command: &'static str,
        error: SyncError,
    },
}

/// poll cadences for the two system states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub running_ms: u64,
    pub stopped_ms: u64,
}

impl From<&PollingConfig> for Cadence {
    fn from(polling: &PollingConfig) -> Self {
        Self {
            running_ms: polling.running_interval_ms,
            stopped_ms: polling.stopped_interval_ms,
        }
    }
}

#[derive(Default)]
struct Applied {
    sensor_seq: u64,
    alarm_seq: u64,
    alarms: AlarmTracker,
    snapshot: SyncSnapshot,
}

pub struct SyncController {
    client: Arc<RemoteClient>,
    chart: Arc<ChartBuffer>,
    scheduler: PollScheduler,
    poll: RwLock<PollConfig>,
    cadence: Cadence,
    next_seq: AtomicU64,
    applied: Mutex<Applied>,
    events: broadcast::Sender<SyncEvent>,
    on_tick: TickFn,
}

impl SyncController {
    pub fn new(
        client: Arc<RemoteClient>,
        chart: Arc<ChartBuffer>,
        scheduler: PollScheduler,
        poll: PollConfig,
        cadence: Cadence,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new_cyclic(|weak: &Weak<SyncController>| {
            let weak = weak.clone();
            let on_tick: TickFn = Arc::new(move || {
                if let Some(controller) = weak.upgrade() {
                    tokio::spawn(async move { controller.refresh().await });
                }
            });
            let applied = Applied {
                snapshot: SyncSnapshot {
                    poll_interval_ms: poll.interval_ms,
                    ..SyncSnapshot::default()
                },
                ..Applied::default()
            };
            Self {
                client,
                chart,
                scheduler,
                poll: RwLock::new(poll),
                cadence,
                next_seq: AtomicU64::new(0),
                applied: Mutex::new(applied),
                events,
                on_tick,
            }
        })
    }

    // ==========================================================================
    // outbound surface
    // ==========================================================================

    pub fn snapshot(&self) -> SyncSnapshot {
        self.applied.lock().snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn chart_snapshot(&self) -> ChartSnapshot {
        self.chart.snapshot()
    }

    pub fn series(&self, channel: Channel) -> Vec<ChartPoint> {
        self.chart.series(channel)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.client.connection_status()
    }

    pub fn poll_config(&self) -> PollConfig {
        *self.poll.read()
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_active()
    }

    fn emit(&self, event: SyncEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    // ==========================================================================
    // polling
    // ==========================================================================

    /// arm the poll timer at the current cadence (first refresh fires now)
    pub fn start_polling(&self) {
        let interval = self.poll.read().interval();
        self.scheduler.start(interval, Arc::clone(&self.on_tick));
    }

    pub fn stop_polling(&self) {
        self.scheduler.stop();
    }

    /// swap in a new cadence; reschedules immediately if polling is active
    pub fn set_poll_interval(&self, interval_ms: u64) -> SyncResult<()> {
        self.reschedule(interval_ms, false)
    }

    /// the new PollConfig is swapped in whole before the timer is re-armed
    fn reschedule(&self, interval_ms: u64, force_start: bool) -> SyncResult<()> {
        if interval_ms == 0 {
            return Err(SyncError::validation("poll interval must be greater than zero"));
        }
        let config = {
            let mut poll = self.poll.write();
            *poll = poll.with_interval(interval_ms);
            *poll
        };
        self.applied.lock().snapshot.poll_interval_ms = interval_ms;
        if force_start || self.scheduler.is_active() {
            self.scheduler.start(config.interval(), Arc::clone(&self.on_tick));
        }
        info!(interval_ms, "poll cadence changed");
        Ok(())
    }

    /// one refresh cycle. sensor and alarm fetches run side by side; each
    /// result is applied as soon as it lands.
    pub async fn refresh(&self) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(seq, "refresh started");

        let sensor = async {
            let reading = self.client.get_sensor_data().await;
            self.apply_reading(seq, reading);
        };
        let alarms = async {
            let set = self.client.get_alarms().await;
            self.apply_alarms(seq, set);
        };
        tokio::join!(sensor, alarms);
    }

    /// alarm-only refresh (after clearing alarms on the device)
    pub async fn refresh_alarms(&self) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let set = self.client.get_alarms().await;
        self.apply_alarms(seq, set);
    }

    fn apply_reading(&self, seq: u64, reading: SensorReading) -> bool {
        let mut applied = self.applied.lock();
        if seq <= applied.sensor_seq {
            debug!(seq, latest = applied.sensor_seq, "discarding stale sensor result");
            return false;
        }
        applied.sensor_seq = seq;
        self.chart.push_reading(&reading);
        applied.snapshot.latest_reading = Some(reading);
        applied.snapshot.reading_seq = seq;
        let change = self.sync_connection(&mut applied);
        drop(applied);

        if let Some(event) = change {
            self.emit(event);
        }
        true
    }

    fn apply_alarms(&self, seq: u64, set: ActiveAlarmSet) -> bool {
        let mut applied = self.applied.lock();
        if seq <= applied.alarm_seq {
            debug!(seq, latest = applied.alarm_seq, "discarding stale alarm result");
            return false;
        }
        applied.alarm_seq = seq;
        let decision = applied.alarms.observe(set);
        applied.snapshot.active_alarms = applied.alarms.last_seen().clone();
        applied.snapshot.alarm_changed = decision.changed;
        let alarm_event = decision.changed.then(|| SyncEvent::AlarmsChanged {
            alarms: applied.snapshot.active_alarms.clone(),
            newest: decision.newest.clone(),
        });
        let connection_event = self.sync_connection(&mut applied);
        drop(applied);

        if let Some(newest) = &decision.newest {
            warn!(id = newest.id(), kind = %newest.kind(), message = newest.message(), "new alarm");
        }
        for event in alarm_event.into_iter().chain(connection_event) {
            self.emit(event);
        }
        true
    }

    /// copy the client's link state into the snapshot, reporting flips
    fn sync_connection(&self, applied: &mut Applied) -> Option<SyncEvent> {
        let state = self.client.connection_state();
        let was = applied.snapshot.connection.connected;
        applied.snapshot.connection = state;
        (was != state.connected).then(|| {
            info!(connected = state.connected, failures = state.consecutive_failures, "connection state changed");
            SyncEvent::ConnectionChanged { connected: state.connected }
        })
    }

    // ==========================================================================
    // startup
    // ==========================================================================

    /// single-shot probe; the result reaches the snapshot and subscribers now,
    /// not on the next applied poll
    pub async fn check_connection(&self) -> bool {
        let reachable = self.client.check_connection().await;
        let change = {
            let mut applied = self.applied.lock();
            self.sync_connection(&mut applied)
        };
        if let Some(event) = change {
            self.emit(event);
        }
        reachable
    }

    /// seed state before the first tick: probe the link, adopt the device's
    /// poll cadence, load alarms and chart history
    pub async fn initialize(&self) {
        let reachable = self.check_connection().await;
        info!(reachable, "initial connection probe");

        let settings = self.client.get_settings().await;
        if settings.update_interval > 0 && settings.update_interval != self.poll.read().interval_ms {
            if let Err(e) = self.set_poll_interval(settings.update_interval) {
                warn!(error = %e, "ignoring device update interval");
            }
        }

        self.refresh_alarms().await;
        self.load_history().await;
    }

    /// seed the chart window from recorded (or simulated) history
    pub async fn load_history(&self) {
        let history = self.client.get_historical_data().await;
        self.chart.extend_history(&history);
        debug!(points = history.len(), "chart seeded from history");
    }

    pub async fn system_status(&self) -> SystemStatus {
        self.client.get_system_status().await
    }

    pub async fn settings(&self) -> DeviceSettings {
        self.client.get_settings().await
    }

    // ==========================================================================
    // control
    // ==========================================================================

    fn report<T>(&self, command: &'static str, result: SyncResult<T>) -> SyncResult<T> {
        match &result {
            Ok(_) => info!(command, "command succeeded"),
            Err(e) => {
                warn!(command, error = %e, "command failed");
                self.emit(SyncEvent::CommandFailed { command, error: e.clone() });
            }
        }
        result
    }

    /// start the device system and switch to the fast cadence
    pub async fn start_system(&self) -> SyncResult<Value> {
        let result = self.client.start_system().await;
        let ack = self.report("start_system", result)?;
        self.applied.lock().snapshot.running = true;
        self.reschedule(self.cadence.running_ms, true)?;
        Ok(ack)
    }

    /// stop the device system and fall back to the slow cadence
    pub async fn stop_system(&self) -> SyncResult<Value> {
        let result = self.client.stop_system().await;
        let ack = self.report("stop_system", result)?;
        self.applied.lock().snapshot.running = false;
        self.reschedule(self.cadence.stopped_ms, true)?;
        Ok(ack)
    }

    pub async fn control_heating(&self, on: bool) -> SyncResult<Value> {
        let result = self.client.control_heating(on).await;
        self.report("control_heating", result)
    }

    pub async fn set_target_temperature(&self, temperature_c: f64) -> SyncResult<Value> {
        let result = self.client.set_target_temperature(temperature_c).await;
        self.report("set_target_temperature", result)
    }

    pub async fn set_altitude(&self, target: &AltitudeTarget) -> SyncResult<Value> {
        let result = self.client.set_altitude(target).await;
        self.report("set_altitude", result)
    }

    pub async fn configure_alarms(&self, config: &AlarmConfig) -> SyncResult<Value> {
        let result = self.client.configure_alarms(config).await;
        self.report("configure_alarms", result)
    }

    /// clear alarms on the device, forget the local set, then re-read
    pub async fn clear_alarms(&self) -> SyncResult<Value> {
        let result = self.client.clear_alarms().await;
        let ack = self.report("clear_alarms", result)?;
        let had_alarms = {
            let mut applied = self.applied.lock();
            let had = !applied.alarms.last_seen().is_empty();
            applied.alarms.reset();
            applied.snapshot.active_alarms = ActiveAlarmSet::empty();
            applied.snapshot.alarm_changed = had;
            had
        };
        if had_alarms {
            self.emit(SyncEvent::AlarmsChanged { alarms: ActiveAlarmSet::empty(), newest: None });
        }
        self.refresh_alarms().await;
        Ok(ack)
    }

    pub fn clear_charts(&self) {
        self.chart.clear();
        info!("charts cleared");
    }

    /// save settings on the device; a changed update interval reschedules polling
    pub async fn update_settings(&self, settings: &DeviceSettings) -> SyncResult<DeviceSettings> {
        let result = self.client.update_settings(settings).await;
        let saved = self.report("update_settings", result)?;
        if saved.update_interval != self.poll.read().interval_ms {
            self.set_poll_interval(saved.update_interval)?;
        }
        Ok(saved)
    }

    // ==========================================================================
    // quick actions
    // ==========================================================================
    // multi-step shortcuts. the first failing step aborts the action and its
    // error is returned; earlier steps are not rolled back.

    /// target 100 °C, then heat
    pub async fn boil_water(&self) -> SyncResult<String> {
        self.warm_to(100.0).await?;
        Ok("Started boiling water at 100°C".to_string())
    }

    pub async fn warm_to(&self, temperature_c: f64) -> SyncResult<String> {
        self.set_target_temperature(temperature_c).await?;
        self.control_heating(true).await?;
        Ok(format!("Started heating to {temperature_c}°C"))
    }

    pub async fn emergency_stop(&self) -> SyncResult<String> {
        self.control_heating(false).await?;
        Ok("Emergency stop activated".to_string())
    }

    /// heating off, alarms cleared, target back to room temperature
    pub async fn reset_all(&self) -> SyncResult<String> {
        self.control_heating(false).await?;
        self.clear_alarms().await?;
        self.set_target_temperature(20.0).await?;
        Ok("All systems reset".to_string())
    }
}
