//! HttpTransport + RemoteClient against a real socket: a tiny axum app plays
//! the thermometer on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use thermo_sync::config::LimitsConfig;
use thermo_sync::transport::{HttpTransport, Method};
use thermo_sync::{ClientOptions, RemoteClient};

async fn spawn_device() -> SocketAddr {
    let app = Router::new()
        .route(
            "/api/sensor_data",
            get(|| async {
                Json(json!({
                    "temperature": { "temperature": 71.5, "is_heating": true, "target_temperature": 95.0 },
                    "pressure": { "pressure": 0.82 },
                    "boiling_point": 42.0,
                    "timestamp": "2024-05-01T10:00:00+00:00"
                }))
            }),
        )
        .route("/api/alarms", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route(
            "/api/control/heating",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "success": true, "echo": body }))
            }),
        )
        .route("/api/alarms/clear", post(|| async { "" }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(base_url: String) -> RemoteClient {
    let options = ClientOptions {
        max_retries: 2,
        retry_base_delay: Duration::from_millis(1),
        request_timeout: Duration::from_secs(2),
        probe_timeout: Duration::from_secs(1),
    };
    let transport = Arc::new(HttpTransport::new(base_url).unwrap());
    RemoteClient::new(transport, options, LimitsConfig::default())
}

#[tokio::test]
async fn live_reading_is_decoded_with_derived_boiling_point() {
    let addr = spawn_device().await;
    let client = client(format!("http://{addr}/api"));

    let reading = client.get_sensor_data().await;
    assert_eq!(reading.temperature_c, Some(71.5));
    assert!(reading.is_heating);
    assert_eq!(reading.pressure_atm, 0.82);
    // the device's own boiling point is ignored
    assert!((reading.boiling_point_c() - thermo_sync::physics::boiling_point(0.82)).abs() < 1e-9);
    assert_eq!(reading.timestamp_ms, 1_714_557_600_000);
    assert!(client.is_connected());
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let addr = spawn_device().await;
    let client = client(format!("http://{addr}/api"));

    let err = client.request(Method::Get, "/alarms", None).await.unwrap_err();
    assert_eq!(err.attempts, 3);
    assert_eq!(err.cause, "HTTP 500: Internal Server Error");
    assert!(!client.is_connected());

    // degraded read: empty, never invented
    assert!(client.get_alarms().await.is_empty());
}

#[tokio::test]
async fn control_posts_json_and_accepts_empty_acks() {
    let addr = spawn_device().await;
    let client = client(format!("http://{addr}/api/"));

    let ack = client.control_heating(true).await.unwrap();
    assert_eq!(ack["echo"], json!({ "heating": true }));

    assert_eq!(client.clear_alarms().await.unwrap(), Value::Null);
}

#[tokio::test]
async fn refused_connection_marks_link_down() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = client(format!("http://{addr}/api"));

    assert!(!client.check_connection().await);
    let status = client.connection_status();
    assert!(!status.connected);
    assert_eq!(status.base_url, format!("http://{addr}/api"));

    let err = client.control_heating(false).await.unwrap_err();
    assert!(err.is_network());
    assert_eq!(client.connection_state().consecutive_failures, 1);
}
