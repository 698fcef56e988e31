pub mod alerts;
pub mod telemetry;
pub mod trace;
