//! HTTP request handlers.

pub mod admin;
pub mod referee_updates;

pub use admin::{get_meet, list_meets, reset_meet};
pub use referee_updates::referee_updates;
