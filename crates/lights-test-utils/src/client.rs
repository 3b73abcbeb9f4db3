//! In-memory client.
//!
//! Joins a meet through [`LightsService::connect`] with a plain channel in
//! place of a WebSocket writer, so tests observe exactly what the registry
//! would have written to the wire.

use lights_service::actors::{MailboxMonitor, QueueKind};
use lights_service::errors::LightsError;
use lights_service::protocol::ServerMessage;
use lights_service::service::LightsService;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound queue capacity for test clients.
pub const TEST_CLIENT_QUEUE: usize = 256;

/// A connection joined to one meet.
pub struct TestClient {
    service: Arc<LightsService>,
    connection_id: Uuid,
    meet_name: String,
    receiver: mpsc::Receiver<Arc<str>>,
    monitor: Arc<MailboxMonitor>,
}

impl TestClient {
    /// Join `meet_name` with the default queue capacity.
    pub async fn connect(service: &Arc<LightsService>, meet_name: &str) -> Self {
        Self::connect_with_capacity(service, meet_name, TEST_CLIENT_QUEUE).await
    }

    /// Join `meet_name` with a specific outbound queue capacity.
    pub async fn connect_with_capacity(
        service: &Arc<LightsService>,
        meet_name: &str,
        capacity: usize,
    ) -> Self {
        let connection_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(capacity);
        let monitor = Arc::new(MailboxMonitor::new(
            QueueKind::Outbound,
            connection_id.to_string(),
        ));
        service
            .connect(connection_id, meet_name, sender, Arc::clone(&monitor))
            .await;

        Self {
            service: Arc::clone(service),
            connection_id,
            meet_name: meet_name.to_string(),
            receiver,
            monitor,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn meet_name(&self) -> &str {
        &self.meet_name
    }

    pub fn monitor(&self) -> &Arc<MailboxMonitor> {
        &self.monitor
    }

    /// Deliver a raw text frame as if it arrived on the socket.
    pub async fn send_text(&self, text: &str) -> Result<(), LightsError> {
        self.service
            .handle_text(self.connection_id, &self.meet_name, text)
            .await
    }

    /// Deliver a JSON value as a text frame.
    pub async fn send_json(&self, value: &serde_json::Value) -> Result<(), LightsError> {
        self.send_text(&value.to_string()).await
    }

    /// Deliver a frame that must be accepted.
    pub async fn send(&self, value: serde_json::Value) {
        self.send_json(&value)
            .await
            .expect("frame should be accepted");
    }

    /// Register this connection as a judge.
    pub async fn register(&self, judge_id: &str) {
        self.send(crate::fixtures::register_ref(&self.meet_name, judge_id))
            .await;
    }

    /// Submit a decision, relying on the registered judge id.
    pub async fn submit(&self, decision: &str) {
        self.send(serde_json::json!({
            "action": "submitDecision",
            "meetName": self.meet_name,
            "decision": decision,
        }))
        .await;
    }

    /// Submit a decision for an explicit position.
    pub async fn submit_as(&self, judge_id: &str, decision: &str) {
        self.send(crate::fixtures::submit_decision(
            &self.meet_name,
            judge_id,
            decision,
        ))
        .await;
    }

    /// Send a bare action for this client's meet.
    pub async fn action(&self, action: &str) {
        self.send(crate::fixtures::bare_action(&self.meet_name, action))
            .await;
    }

    /// Take every message already queued for this client.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(payload) = self.receiver.try_recv() {
            messages.push(decode(&payload));
        }
        messages
    }

    /// Leave the meet.
    pub async fn disconnect(self) {
        self.service.disconnect(self.connection_id).await;
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("connection_id", &self.connection_id)
            .field("meet_name", &self.meet_name)
            .finish_non_exhaustive()
    }
}

/// Decode one outbound payload, failing the test on anything unexpected.
pub fn decode(payload: &str) -> ServerMessage {
    serde_json::from_str(payload)
        .unwrap_or_else(|e| panic!("server sent undecodable payload {payload}: {e}"))
}

/// Let spawned tasks (broadcaster, tickers) run until they block again.
///
/// Does not advance time, so with a paused clock no countdown moves.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
