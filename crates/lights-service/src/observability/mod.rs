//! Observability: health probes and the write-only metrics sink.

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
