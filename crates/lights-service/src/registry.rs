//! Connection registry.
//!
//! Owns membership of live connections, each tagged with the meet it joined
//! and, once it has sent `registerRef`, a judge id. The registry holds only
//! the sending half of each connection's outbound queue; the connection task
//! owns the socket.
//!
//! Delivery never waits: a full outbound queue drops the message for that one
//! connection and records the drop.

use crate::actors::metrics::MailboxMonitor;
use crate::observability::metrics;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Sending half of a connection's outbound queue. Payloads are serialized
/// once per broadcast and shared.
pub type OutboundSender = mpsc::Sender<Arc<str>>;

#[derive(Debug)]
struct ConnectionEntry {
    meet_name: String,
    judge_id: Option<String>,
    sender: OutboundSender,
    monitor: Arc<MailboxMonitor>,
}

/// What the registry knew about a connection when it was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedConnection {
    pub meet_name: String,
    pub judge_id: Option<String>,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Live connection membership.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the live set.
    pub async fn register(
        &self,
        connection_id: Uuid,
        meet_name: &str,
        sender: OutboundSender,
        monitor: Arc<MailboxMonitor>,
    ) {
        let mut connections = self.connections.write().await;
        connections.insert(
            connection_id,
            ConnectionEntry {
                meet_name: meet_name.to_string(),
                judge_id: None,
                sender,
                monitor,
            },
        );
        metrics::set_connections_active(connections.len());

        info!(
            target: "lights.registry",
            connection_id = %connection_id,
            meet_name = %meet_name,
            total = connections.len(),
            "Connection registered"
        );
    }

    /// Remove a connection. Removing an absent connection is a no-op.
    pub async fn unregister(&self, connection_id: Uuid) -> Option<RemovedConnection> {
        let mut connections = self.connections.write().await;
        let entry = connections.remove(&connection_id)?;
        metrics::set_connections_active(connections.len());

        info!(
            target: "lights.registry",
            connection_id = %connection_id,
            meet_name = %entry.meet_name,
            judge_id = entry.judge_id.as_deref().unwrap_or(""),
            total = connections.len(),
            "Connection unregistered"
        );

        Some(RemovedConnection {
            meet_name: entry.meet_name,
            judge_id: entry.judge_id,
        })
    }

    /// Tag a connection with its judge id. Returns `false` if the connection
    /// is no longer registered.
    pub async fn set_judge_id(&self, connection_id: Uuid, judge_id: &str) -> bool {
        let mut connections = self.connections.write().await;
        let Some(entry) = connections.get_mut(&connection_id) else {
            return false;
        };
        entry.judge_id = Some(judge_id.to_string());

        debug!(
            target: "lights.registry",
            connection_id = %connection_id,
            meet_name = %entry.meet_name,
            judge_id = %judge_id,
            "Judge registered on connection"
        );
        true
    }

    /// The judge id a connection registered with, if any.
    pub async fn judge_id(&self, connection_id: Uuid) -> Option<String> {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .and_then(|entry| entry.judge_id.clone())
    }

    /// Deliver to every connection of one meet.
    pub async fn send_to_meet(&self, meet_name: &str, payload: &Arc<str>) -> DeliveryReport {
        let connections = self.connections.read().await;
        let mut report = DeliveryReport::default();
        for (id, entry) in connections.iter().filter(|(_, e)| e.meet_name == meet_name) {
            deliver(*id, entry, payload, &mut report);
        }
        report
    }

    /// Deliver to every live connection.
    pub async fn send_to_all(&self, payload: &Arc<str>) -> DeliveryReport {
        let connections = self.connections.read().await;
        let mut report = DeliveryReport::default();
        for (id, entry) in connections.iter() {
            deliver(*id, entry, payload, &mut report);
        }
        report
    }

    /// Distinct judge ids registered on a meet's connections, sorted.
    pub async fn connected_judge_ids(&self, meet_name: &str) -> Vec<String> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|entry| entry.meet_name == meet_name)
            .filter_map(|entry| entry.judge_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of connections joined to a meet.
    pub async fn meet_connection_count(&self, meet_name: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|entry| entry.meet_name == meet_name)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

fn deliver(id: Uuid, entry: &ConnectionEntry, payload: &Arc<str>, report: &mut DeliveryReport) {
    match entry.sender.try_send(Arc::clone(payload)) {
        Ok(()) => {
            entry.monitor.record_enqueue();
            report.delivered += 1;
        }
        Err(mpsc::error::TrySendError::Full(_)) => {
            entry.monitor.record_drop();
            metrics::record_message_dropped(entry.monitor.kind().as_str());
            report.dropped += 1;
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            // Connection is tearing down and will unregister itself
            debug!(
                target: "lights.registry",
                connection_id = %id,
                "Skipping closed connection"
            );
            report.dropped += 1;
        }
    }
}
