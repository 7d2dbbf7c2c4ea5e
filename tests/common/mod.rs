//! shared fixtures for the integration tests: an in-memory thermometer that
//! speaks the Transport trait, plus builders for clients and controllers.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use thermo_sync::chart::ChartBuffer;
use thermo_sync::config::{LimitsConfig, PollConfig};
use thermo_sync::scheduler::PollScheduler;
use thermo_sync::transport::{AttemptError, Method, Transport};
use thermo_sync::{Cadence, ClientOptions, RemoteClient, SyncController, SyncEvent};

#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    /// answer only after the delay (on the tokio clock)
    After(Duration, Value),
    Status(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// per-route replies: queued one-shot replies win, then the sticky reply.
/// unknown routes and an offline device fail like a refused connection.
pub struct FakeDevice {
    online: AtomicBool,
    sticky: Mutex<HashMap<String, Reply>>,
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

fn route(method: Method, path: &str) -> String {
    format!("{} {}", method.as_str(), path)
}

impl FakeDevice {
    /// online, with a healthy default for every read endpoint and acks for controls
    pub fn healthy() -> Arc<Self> {
        let device = Arc::new(Self {
            online: AtomicBool::new(true),
            sticky: Mutex::new(HashMap::new()),
            queued: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        });
        device.set(Method::Get, "/sensor_data", sensor_body(25.0, 1.0));
        device.set(Method::Get, "/alarms", alarms_body(&[]));
        device.set(
            Method::Get,
            "/system/status",
            json!({
                "sensors": {
                    "temperature": { "active": true, "failed": false },
                    "pressure": { "active": true, "failed": false }
                },
                "mqtt": { "connected": true },
                "data_collection": true
            }),
        );
        device.set(Method::Get, "/settings", json!({ "update_interval": 2000 }));
        device.set(
            Method::Get,
            "/historical_data",
            json!({ "timestamps": [], "temperatures": [], "pressures": [] }),
        );
        for path in [
            "/control/heating",
            "/control/target_temperature",
            "/control/altitude",
            "/alarms/clear",
            "/alarms/configure",
            "/settings",
        ] {
            device.set(Method::Post, path, json!({ "success": true }));
        }
        device.set(Method::Post, "/system/start", json!({ "status": "success" }));
        device.set(Method::Post, "/system/stop", json!({ "status": "success" }));
        device
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set(&self, method: Method, path: &str, body: Value) {
        self.sticky.lock().insert(route(method, path), Reply::Json(body));
    }

    pub fn set_reply(&self, method: Method, path: &str, reply: Reply) {
        self.sticky.lock().insert(route(method, path), reply);
    }

    pub fn queue(&self, method: Method, path: &str, reply: Reply) {
        self.queued.lock().entry(route(method, path)).or_default().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.method == method && c.path == path).count()
    }

    pub fn posts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == Method::Post)
            .map(|c| c.path.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for FakeDevice {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        _timeout: Duration,
    ) -> Result<Value, AttemptError> {
        self.calls.lock().push(Call { method, path: path.to_string(), body: body.cloned() });
        if !self.online.load(Ordering::SeqCst) {
            return Err(AttemptError::Transport("connection refused".into()));
        }

        let key = route(method, path);
        let queued = self.queued.lock().get_mut(&key).and_then(VecDeque::pop_front);
        let reply = queued.or_else(|| self.sticky.lock().get(&key).cloned());
        match reply {
            Some(Reply::Json(v)) => Ok(v),
            Some(Reply::After(delay, v)) => {
                tokio::time::sleep(delay).await;
                Ok(v)
            }
            Some(Reply::Status(code)) => Err(AttemptError::Status {
                code,
                reason: "Internal Server Error".into(),
            }),
            None => Err(AttemptError::Status { code: 404, reason: "Not Found".into() }),
        }
    }

    fn base_url(&self) -> &str {
        "http://thermometer.test/api"
    }
}

// ==============================================================================
// wire bodies
// ==============================================================================

pub fn sensor_body(temperature: f64, pressure: f64) -> Value {
    json!({
        "temperature": {
            "temperature": temperature,
            "is_heating": true,
            "target_temperature": 100.0
        },
        "pressure": { "pressure": pressure },
        "boiling_point": 0.0
    })
}

/// `(id, message)` pairs, all `TEMPERATURE` alarms
pub fn alarms_body(alarms: &[(&str, &str)]) -> Value {
    let typed: Vec<(&str, &str, &str)> =
        alarms.iter().map(|(id, message)| (*id, "TEMPERATURE", *message)).collect();
    typed_alarms_body(&typed)
}

/// `(id, type, message)` triples, `type` as the device spells it
/// (`TEMPERATURE`, `TIME`, `BOILING`, `BOILING_START`, `TIME_COMPLETE`)
pub fn typed_alarms_body(alarms: &[(&str, &str, &str)]) -> Value {
    let active: Vec<Value> = alarms
        .iter()
        .map(|(id, kind, message)| {
            let priority = if *kind == "BOILING" { "CRITICAL" } else { "HIGH" };
            json!({
                "id": id,
                "type": kind,
                "message": message,
                "priority": priority,
                "timestamp": 1_700_000_000.0
            })
        })
        .collect();
    json!({ "active_alarms": active })
}

// ==============================================================================
// builders
// ==============================================================================

pub const CADENCE: Cadence = Cadence { running_ms: 1000, stopped_ms: 5000 };

pub fn client(device: &Arc<FakeDevice>) -> Arc<RemoteClient> {
    let options = ClientOptions {
        max_retries: 1,
        retry_base_delay: Duration::from_millis(10),
        request_timeout: Duration::from_secs(10),
        probe_timeout: Duration::from_secs(5),
    };
    Arc::new(RemoteClient::new(device.clone(), options, LimitsConfig::default()))
}

pub fn controller(device: &Arc<FakeDevice>) -> Arc<SyncController> {
    let poll = PollConfig { interval_ms: 2000, max_retries: 1, retry_base_delay_ms: 10 };
    SyncController::new(
        client(device),
        Arc::new(ChartBuffer::new(50)),
        PollScheduler::new(),
        poll,
        CADENCE,
    )
}

/// everything already sitting in the channel
pub fn drain(events: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn alarm_events(events: &[SyncEvent]) -> Vec<&SyncEvent> {
    events
        .iter()
        .filter(|e| matches!(e, SyncEvent::AlarmsChanged { .. }))
        .collect()
}
