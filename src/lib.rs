//! ==============================================================================
//! thermo-sync - resilient data sync for a remote smart thermometer
//! ==============================================================================
//!
//! the library half of the dashboard host. it talks to the thermometer over
//! an unreliable network, infers whether the link is up, substitutes
//! physically consistent synthetic readings while it is down, polls on a
//! fixed cadence, reconciles alarms across polls and feeds a bounded chart
//! window.
//!
//! module map (leaf first):
//!
//! ```text
//!     physics     pressure / altitude / boiling point
//!     domain      readings, alarms, wire decoding
//!     error       NetworkError, SyncError
//!     config      dashboard.toml
//!     transport   one HTTP attempt (Transport trait, HttpTransport)
//!     client      RemoteClient: retries, link health, degraded reads
//!     scheduler   PollScheduler
//!     alarms      reconciliation + alarm modes
//!     chart       ChartBuffer
//!     sync        SyncController
//!     telemetry   tracing setup
//! ```
//!
//! ==============================================================================

pub mod alarms;
pub mod chart;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod physics;
pub mod scheduler;
pub mod sync;
pub mod telemetry;
pub mod transport;

pub use client::{AltitudeTarget, ClientOptions, RemoteClient};
pub use config::{DashboardConfig, PollConfig};
pub use error::{NetworkError, SyncError, SyncResult};
pub use sync::{Cadence, SyncController, SyncEvent, SyncSnapshot};
