//! Broadcast distribution actor.
//!
//! A single process-wide task owns the receive side of the broadcast queue.
//! Producers (timers, the decision coordinator, connection handlers) enqueue
//! with a non-blocking `try_send` through [`BroadcasterHandle`]; the task
//! serializes each [`ServerMessage`] once and fans the bytes out through the
//! [`ConnectionRegistry`].
//!
//! Because one task drains one FIFO queue, every connection of a meet sees
//! that meet's messages in enqueue order.

use crate::actors::metrics::{MailboxMonitor, QueueKind};
use crate::errors::LightsError;
use crate::observability::metrics;
use crate::protocol::ServerMessage;
use crate::registry::{ConnectionRegistry, DeliveryReport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Who a broadcast is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every connection joined to one meet.
    Meet(String),
    /// Every live connection.
    All,
}

#[derive(Debug)]
struct Envelope {
    audience: Audience,
    message: ServerMessage,
}

/// Handle to the distribution task.
#[derive(Clone, Debug)]
pub struct BroadcasterHandle {
    sender: mpsc::Sender<Envelope>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl BroadcasterHandle {
    /// Spawn the distribution task.
    ///
    /// The task stops once `cancel_token` fires, after draining whatever is
    /// already queued.
    pub fn spawn(
        registry: Arc<ConnectionRegistry>,
        capacity: usize,
        cancel_token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let mailbox = Arc::new(MailboxMonitor::new(QueueKind::Broadcast, "distribution"));

        let actor = BroadcastActor {
            receiver,
            registry,
            cancel_token: cancel_token.clone(),
            mailbox: Arc::clone(&mailbox),
        };
        let task_handle = tokio::spawn(actor.run());

        (
            Self {
                sender,
                cancel_token,
                mailbox,
            },
            task_handle,
        )
    }

    /// Enqueue a message without waiting.
    ///
    /// # Errors
    ///
    /// - [`LightsError::QueueFull`] if the broadcast queue is at capacity
    /// - [`LightsError::ChannelClosed`] if the distribution task has stopped
    pub fn enqueue(&self, audience: Audience, message: ServerMessage) -> Result<(), LightsError> {
        match self.sender.try_send(Envelope { audience, message }) {
            Ok(()) => {
                self.mailbox.record_enqueue();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.mailbox.record_drop();
                metrics::record_message_dropped(QueueKind::Broadcast.as_str());
                Err(LightsError::QueueFull("broadcast"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(LightsError::ChannelClosed("broadcast"))
            }
        }
    }

    /// Broadcast to every connection of one meet. Failures are logged.
    pub fn to_meet(&self, meet_name: &str, message: ServerMessage) {
        let action = message.action();
        if let Err(e) = self.enqueue(Audience::Meet(meet_name.to_string()), message) {
            warn!(
                target: "lights.broadcast",
                meet_name = %meet_name,
                action,
                error = %e,
                "Broadcast not enqueued"
            );
        }
    }

    /// Broadcast to every live connection. Failures are logged.
    pub fn to_all(&self, message: ServerMessage) {
        let action = message.action();
        if let Err(e) = self.enqueue(Audience::All, message) {
            warn!(
                target: "lights.broadcast",
                action,
                error = %e,
                "Process-wide broadcast not enqueued"
            );
        }
    }

    /// Messages currently waiting in the broadcast queue.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.mailbox.current_depth()
    }

    /// Stop the distribution task after it drains.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

struct BroadcastActor {
    receiver: mpsc::Receiver<Envelope>,
    registry: Arc<ConnectionRegistry>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl BroadcastActor {
    #[instrument(skip_all, name = "lights.broadcast")]
    async fn run(mut self) {
        info!(target: "lights.broadcast", "Broadcast distribution started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    // Close first so late producers get ChannelClosed, then drain
                    self.receiver.close();
                    while let Some(envelope) = self.receiver.recv().await {
                        self.distribute(envelope).await;
                    }
                    break;
                }

                envelope = self.receiver.recv() => {
                    match envelope {
                        Some(envelope) => self.distribute(envelope).await,
                        None => break,
                    }
                }
            }
        }

        metrics::set_broadcast_queue_depth(0);
        info!(
            target: "lights.broadcast",
            messages_processed = self.mailbox.messages_processed(),
            messages_dropped = self.mailbox.messages_dropped(),
            peak_depth = self.mailbox.peak_depth(),
            "Broadcast distribution stopped"
        );
    }

    async fn distribute(&self, envelope: Envelope) {
        self.mailbox.record_dequeue();
        metrics::set_broadcast_queue_depth(self.mailbox.current_depth());

        let action = envelope.message.action();
        let payload: Arc<str> = match serde_json::to_string(&envelope.message) {
            Ok(text) => Arc::from(text),
            Err(e) => {
                error!(
                    target: "lights.broadcast",
                    action,
                    error = %e,
                    "Failed to serialize broadcast"
                );
                return;
            }
        };

        let report: DeliveryReport = match &envelope.audience {
            Audience::Meet(meet_name) => self.registry.send_to_meet(meet_name, &payload).await,
            Audience::All => self.registry.send_to_all(&payload).await,
        };

        debug!(
            target: "lights.broadcast",
            audience = ?envelope.audience,
            action,
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast distributed"
        );
    }
}
