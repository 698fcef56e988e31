// Vigil core library: canonical alert model, inbound schema normalization,
// and host-telemetry snapshot types. Pure and I/O-free so the whole
// normalization contract is unit-testable without a running server.

pub mod alert;
pub mod telemetry;
pub mod timefmt;

pub use alert::{normalize, Alert, FormatError, InboundAlert, DEFAULT_THREAT_LEVEL};
pub use telemetry::{HostReport, TelemetrySnapshot};
