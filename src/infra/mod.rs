//! Infrastructure scaffolding.

pub mod store;
pub mod telemetry;
