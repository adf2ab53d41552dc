//! Runtime Telemetry
//!
//! Console buffers fed by the preview sandbox and the monitor that reads them.

mod hub;
mod monitor;

pub use hub::{TelemetryHub, TELEMETRY_CAPACITY};
pub use monitor::{ErrorFeedbackMonitor, Verdict};
