//! ==============================================================================
//! main.rs - thermo-sync host entry point
//! ==============================================================================
//!
//! purpose:
//!     runs the sync layer against a real thermometer and republishes what it
//!     knows as JSON for the browser dashboard.
//!
//! responsibilities:
//!     - load dashboard.toml (or defaults) and set up tracing
//!     - build transport -> client -> chart -> scheduler -> controller
//!     - seed state (probe, settings, alarms, history) and start polling
//!     - serve the snapshot / chart / control endpoints
//!     - turn controller events into operator-facing log lines
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                    rust host (this file)                     │
//!     │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//!     │  │ poll timer  │  │ web server  │  │ event listener      │  │
//!     │  │ (1s / 5s)   │  │ (port 3000) │  │ (alarms, link)      │  │
//!     │  └──────┬──────┘  └──────┬──────┘  └──────────┬──────────┘  │
//!     │         └────────────────┼────────────────────┘             │
//!     │                   ┌──────┴───────┐                          │
//!     │                   │ SyncController│ <- sync.rs              │
//!     │                   └──────┬───────┘                          │
//!     └──────────────────────────┼──────────────────────────────────┘
//!                                │ http (retry, linear backoff)
//!                         ┌──────┴──────┐
//!                         │ thermometer │
//!                         └─────────────┘
//!
//! ==============================================================================

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use thermo_sync::alarms::AlarmConfig;
use thermo_sync::chart::{ChartBuffer, ChartSnapshot};
use thermo_sync::client::{AltitudeTarget, ClientOptions, ConnectionStatus, RemoteClient};
use thermo_sync::config::DashboardConfig;
use thermo_sync::domain::{DeviceSettings, SystemStatus};
use thermo_sync::scheduler::PollScheduler;
use thermo_sync::transport::HttpTransport;
use thermo_sync::{telemetry, Cadence, SyncController, SyncError, SyncEvent, SyncSnapshot};

type AppState = Arc<SyncController>;

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let config = DashboardConfig::load_or_default();
    telemetry::init(&config.logging);
    config.log_summary();

    // step 2: wire up the sync layer
    let transport = Arc::new(HttpTransport::new(config.device.base_url.clone())?);
    let client = Arc::new(RemoteClient::new(
        transport,
        ClientOptions::from_config(&config),
        config.limits.clone(),
    ));
    let chart = Arc::new(ChartBuffer::new(config.chart.max_points));
    let controller = SyncController::new(
        client,
        chart,
        PollScheduler::new(),
        config.polling.poll_config(),
        Cadence::from(&config.polling),
    );

    // step 3: event listener - stands in for toast notifications
    tokio::spawn(log_events(controller.subscribe()));

    // step 4: seed state and start polling
    controller.initialize().await;
    controller.start_polling();
    info!(interval_ms = controller.poll_config().interval_ms, "polling started");

    // step 5: web server until ctrl-c
    let app = router(controller.clone());
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(address = %listener.local_addr()?, "dashboard api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    controller.stop_polling();
    info!("shut down");
    Ok(())
}

async fn log_events(mut events: tokio::sync::broadcast::Receiver<SyncEvent>) {
    loop {
        match events.recv().await {
            Ok(SyncEvent::AlarmsChanged { alarms, newest }) => match newest {
                Some(alarm) => warn!(active = alarms.len(), message = alarm.message(), "New alarm"),
                None => info!(active = alarms.len(), "alarm set changed"),
            },
            Ok(SyncEvent::ConnectionChanged { connected }) => {
                if connected {
                    info!("thermometer online");
                } else {
                    warn!("thermometer offline - showing estimated readings");
                }
            }
            Ok(SyncEvent::CommandFailed { command, error }) => {
                error!(command, error = %error, "command failed");
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event listener lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

// ==============================================================================
// web server
// ==============================================================================

fn router(controller: AppState) -> Router {
    Router::new()
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/chart", get(chart_handler))
        .route("/api/connection", get(connection_handler))
        .route("/api/status", get(status_handler))
        .route("/api/settings", get(settings_handler).post(update_settings_handler))
        .route("/api/system/start", post(start_handler))
        .route("/api/system/stop", post(stop_handler))
        .route("/api/control/heating", post(heating_handler))
        .route("/api/control/target_temperature", post(target_handler))
        .route("/api/control/altitude", post(altitude_handler))
        .route("/api/alarms/clear", post(clear_alarms_handler))
        .route("/api/alarms/configure", post(configure_alarms_handler))
        .route("/api/charts/clear", post(clear_charts_handler))
        .route("/api/quick/boil_water", post(boil_handler))
        .route("/api/quick/warm_to", post(warm_handler))
        .route("/api/quick/emergency_stop", post(emergency_stop_handler))
        .route("/api/quick/reset_all", post(reset_handler))
        .layer(CorsLayer::permissive())
        .with_state(controller)
}

async fn snapshot_handler(State(controller): State<AppState>) -> Json<SyncSnapshot> {
    Json(controller.snapshot())
}

async fn chart_handler(State(controller): State<AppState>) -> Json<ChartSnapshot> {
    Json(controller.chart_snapshot())
}

async fn connection_handler(State(controller): State<AppState>) -> Json<ConnectionStatus> {
    Json(controller.connection_status())
}

async fn status_handler(State(controller): State<AppState>) -> Json<SystemStatus> {
    Json(controller.system_status().await)
}

async fn settings_handler(State(controller): State<AppState>) -> Json<DeviceSettings> {
    Json(controller.settings().await)
}

async fn update_settings_handler(
    State(controller): State<AppState>,
    Json(settings): Json<DeviceSettings>,
) -> Response {
    command_response(controller.update_settings(&settings).await)
}

async fn start_handler(State(controller): State<AppState>) -> Response {
    command_response(controller.start_system().await)
}

async fn stop_handler(State(controller): State<AppState>) -> Response {
    command_response(controller.stop_system().await)
}

#[derive(Deserialize)]
struct HeatingBody {
    heating: bool,
}

async fn heating_handler(
    State(controller): State<AppState>,
    Json(body): Json<HeatingBody>,
) -> Response {
    command_response(controller.control_heating(body.heating).await)
}

#[derive(Deserialize)]
struct TargetBody {
    temperature: f64,
}

async fn target_handler(
    State(controller): State<AppState>,
    Json(body): Json<TargetBody>,
) -> Response {
    command_response(controller.set_target_temperature(body.temperature).await)
}

#[derive(Deserialize)]
struct AltitudeBody {
    altitude: Option<f64>,
    preset: Option<String>,
}

async fn altitude_handler(
    State(controller): State<AppState>,
    Json(body): Json<AltitudeBody>,
) -> Response {
    let target = match (body.preset, body.altitude) {
        (Some(preset), _) => AltitudeTarget::Preset(preset),
        (None, Some(m)) => AltitudeTarget::Meters(m),
        (None, None) => {
            return command_response::<Value>(Err(SyncError::validation("no altitude specified")))
        }
    };
    command_response(controller.set_altitude(&target).await)
}

async fn clear_alarms_handler(State(controller): State<AppState>) -> Response {
    command_response(controller.clear_alarms().await)
}

async fn configure_alarms_handler(
    State(controller): State<AppState>,
    Json(config): Json<AlarmConfig>,
) -> Response {
    command_response(controller.configure_alarms(&config).await)
}

async fn clear_charts_handler(State(controller): State<AppState>) -> Json<Value> {
    controller.clear_charts();
    Json(json!({ "status": "ok" }))
}

// ==============================================================================
// quick actions
// ==============================================================================

async fn boil_handler(State(controller): State<AppState>) -> Response {
    command_response(controller.boil_water().await)
}

async fn warm_handler(
    State(controller): State<AppState>,
    Json(body): Json<TargetBody>,
) -> Response {
    command_response(controller.warm_to(body.temperature).await)
}

async fn emergency_stop_handler(State(controller): State<AppState>) -> Response {
    command_response(controller.emergency_stop().await)
}

async fn reset_handler(State(controller): State<AppState>) -> Response {
    command_response(controller.reset_all().await)
}

/// map a command outcome onto an http status the browser can toast
fn command_response<T: serde::Serialize>(result: Result<T, SyncError>) -> Response {
    match result {
        Ok(ack) => Json(json!({ "status": "ok", "ack": ack })).into_response(),
        Err(e) => {
            let code = match e {
                SyncError::Validation(_) => StatusCode::BAD_REQUEST,
                SyncError::Rejected(_) => StatusCode::CONFLICT,
                SyncError::Network(_) => StatusCode::BAD_GATEWAY,
            };
            (code, Json(json!({ "status": "error", "message": e.to_string() }))).into_response()
        }
    }
}
