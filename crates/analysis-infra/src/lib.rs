//! Upload analysis infrastructure
//!
//! Telemetry initialisation shared by the worker service and the operator CLIs.

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryError};
