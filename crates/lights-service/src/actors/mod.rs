//! Long-running tasks: the broadcast distribution actor and the per-socket
//! connection actor, plus queue depth monitoring shared by both.
//!
//! ```text
//! BroadcastActor (singleton)
//! └── fans out through ConnectionRegistry
//!     └── ConnectionActor (one per WebSocket)
//!         ├── read pump  -> LightsService::handle_text
//!         └── write pump <- outbound queue + keepalive pings
//! ```

pub mod broadcaster;
pub mod connection;
pub mod metrics;

pub use broadcaster::{Audience, BroadcasterHandle};
pub use connection::ConnectionActor;
pub use metrics::{MailboxMonitor, QueueKind};
