//! # Lights Test Utilities
//!
//! Shared test utilities for the referee lights service.
//!
//! ## Modules
//!
//! - `client` - in-memory client attached to a [`LightsService`] without a socket
//! - `fixtures` - service builders and canned client frames
//! - `mock_store` - a [`StateProvider`] that records every lookup
//! - `assertions` - helpers for inspecting captured server messages
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lights_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let harness = TestService::new();
//!     let mut display = harness.client("M1").await;
//!     let left = harness.referee("M1", "left").await;
//!
//!     left.submit("good").await;
//!     settle().await;
//!
//!     assert_actions(&display.drain(), &["judgeSubmitted"]);
//! }
//! ```
//!
//! [`LightsService`]: lights_service::service::LightsService
//! [`StateProvider`]: lights_service::meet::StateProvider

pub mod assertions;
pub mod client;
pub mod fixtures;
pub mod mock_store;

pub use assertions::*;
pub use client::*;
pub use fixtures::*;
pub use mock_store::*;
