//! Referee Lights Service Library
//!
//! Real-time meet coordination for powerlifting referee lights: referees
//! submit lift decisions over a WebSocket, and display pages for the same
//! meet render red/white lights and countdowns in step with them.
//!
//! # Architecture
//!
//! ```text
//! LightsService
//! ├── ConnectionRegistry   live connections tagged (meetName, judgeId)
//! ├── MeetStateStore       per-meet state, created lazily
//! ├── BroadcastActor       single distribution task, per-meet FIFO
//! ├── TimerEngine          Platform-Ready + Next-Attempt countdown tasks
//! └── DecisionCoordinator  round accumulation and completion
//! ```
//!
//! # Key Design Decisions
//!
//! - **Drop, don't block**: every queue is bounded; a full queue drops the
//!   newest message for that one destination
//! - **Self-validating timers**: ticks check a generation (Platform-Ready) or
//!   look up their id (Next-Attempt) before touching state
//! - **Ephemeral state**: nothing survives a restart; an admin reset discards
//!   a meet and stops its background tasks
//!
//! # Modules
//!
//! - [`actors`] - broadcast distribution and per-connection actors
//! - [`meet`] - meet state, timers and decisions
//! - [`registry`] - connection membership and fan-out
//! - [`protocol`] - inbound/outbound wire records
//! - [`service`] - component wiring and command dispatch
//! - [`config`] - service configuration from environment
//! - [`errors`] - error types

pub mod actors;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod meet;
pub mod observability;
pub mod protocol;
pub mod registry;
pub mod routes;
pub mod service;
