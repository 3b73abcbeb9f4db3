//! `ConnectionActor` - one per WebSocket connection.
//!
//! Each connection runs a read pump (in the actor's own task) and a write
//! pump (spawned). The registry only ever holds the sending half of the
//! outbound queue; the pumps own the socket halves.
//!
//! # Lifecycle
//!
//! 1. Joined to its meet (registry + lazily created meet state)
//! 2. Read pump applies inbound text frames until close, read error,
//!    oversize frame, idle timeout or cancellation
//! 3. Write pump drains the outbound queue and sends keepalive pings; a
//!    write failure cancels the read pump
//! 4. Always unregistered before the socket is dropped

use crate::actors::metrics::{MailboxMonitor, QueueKind};
use crate::config::ConnectionSettings;
use crate::errors::LightsError;
use crate::service::LightsService;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Longest a single frame write may take.
const WRITE_WAIT: Duration = Duration::from_secs(10);

pub struct ConnectionActor {
    connection_id: Uuid,
    meet_name: String,
    service: Arc<LightsService>,
    cancel_token: CancellationToken,
}

impl ConnectionActor {
    #[must_use]
    pub fn new(meet_name: String, service: Arc<LightsService>) -> Self {
        let cancel_token = service.child_token();
        Self {
            connection_id: Uuid::new_v4(),
            meet_name,
            service,
            cancel_token,
        }
    }

    #[must_use]
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Serve an upgraded WebSocket until it closes.
    pub async fn serve(self, socket: WebSocket) {
        let (sink, stream) = socket.split();
        self.run(sink, stream).await;
    }

    /// Drive the connection over any message sink/stream pair.
    #[instrument(
        skip_all,
        name = "lights.connection",
        fields(connection_id = %self.connection_id, meet_name = %self.meet_name)
    )]
    pub async fn run<K, S, E>(self, sink: K, stream: S)
    where
        K: Sink<Message> + Unpin + Send + 'static,
        K::Error: Display,
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let settings = *self.service.connection_settings();
        let (sender, receiver) = mpsc::channel(settings.outbound_queue_capacity);
        let monitor = Arc::new(MailboxMonitor::new(
            QueueKind::Outbound,
            self.connection_id.to_string(),
        ));

        self.service
            .connect(
                self.connection_id,
                &self.meet_name,
                sender,
                Arc::clone(&monitor),
            )
            .await;
        info!(
            target: "lights.connection",
            connection_id = %self.connection_id,
            meet_name = %self.meet_name,
            "Connection opened"
        );

        let writer = tokio::spawn(write_pump(
            sink,
            receiver,
            Arc::clone(&monitor),
            settings.keepalive_interval,
            self.cancel_token.clone(),
        ));

        let outcome = self.read_pump(stream, &settings).await;

        self.service.disconnect(self.connection_id).await;
        self.cancel_token.cancel();
        if let Err(e) = writer.await {
            warn!(
                target: "lights.connection",
                connection_id = %self.connection_id,
                error = %e,
                "Write pump task failed"
            );
        }

        match outcome {
            Ok(()) => info!(
                target: "lights.connection",
                connection_id = %self.connection_id,
                meet_name = %self.meet_name,
                peak_queue_depth = monitor.peak_depth(),
                messages_dropped = monitor.messages_dropped(),
                "Connection closed"
            ),
            Err(e) => info!(
                target: "lights.connection",
                connection_id = %self.connection_id,
                meet_name = %self.meet_name,
                peak_queue_depth = monitor.peak_depth(),
                messages_dropped = monitor.messages_dropped(),
                error_type = e.error_type(),
                error = %e,
                "Connection closed on transport fault"
            ),
        }
    }

    async fn read_pump<S, E>(
        &self,
        mut stream: S,
        settings: &ConnectionSettings,
    ) -> Result<(), LightsError>
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        loop {
            let next = tokio::select! {
                () = self.cancel_token.cancelled() => return Ok(()),
                next = timeout(settings.read_timeout, stream.next()) => next,
            };

            let frame = match next {
                Err(_) => {
                    return Err(LightsError::Transport(format!(
                        "no frame within {}s",
                        settings.read_timeout.as_secs()
                    )))
                }
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) => return Err(LightsError::Transport(e.to_string())),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => {
                    if text.len() > settings.max_message_bytes {
                        return Err(LightsError::FrameTooLarge {
                            size: text.len(),
                            limit: settings.max_message_bytes,
                        });
                    }
                    // Faults are logged by the service; the connection stays open
                    let _ = self
                        .service
                        .handle_text(self.connection_id, &self.meet_name, &text)
                        .await;
                }
                Message::Binary(bytes) => {
                    debug!(
                        target: "lights.connection",
                        connection_id = %self.connection_id,
                        len = bytes.len(),
                        "Ignoring binary frame"
                    );
                }
                // Pings are answered by the WebSocket layer
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(_) => return Ok(()),
            }
        }
    }
}

async fn write_pump<K>(
    mut sink: K,
    mut receiver: mpsc::Receiver<Arc<str>>,
    monitor: Arc<MailboxMonitor>,
    keepalive_interval: Duration,
    cancel_token: CancellationToken,
) where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let mut keepalive = interval_at(Instant::now() + keepalive_interval, keepalive_interval);

    let result = loop {
        tokio::select! {
            biased;

            () = cancel_token.cancelled() => {
                // Flush what was already queued (e.g. serverShutdown), then close
                while let Ok(payload) = receiver.try_recv() {
                    monitor.record_dequeue();
                    if write(&mut sink, Message::Text(payload.to_string())).await.is_err() {
                        return;
                    }
                }
                let _ = write(&mut sink, Message::Close(None)).await;
                return;
            }

            payload = receiver.recv() => {
                let Some(payload) = payload else {
                    break Ok(());
                };
                monitor.record_dequeue();
                if let Err(e) = write(&mut sink, Message::Text(payload.to_string())).await {
                    break Err(e);
                }
            }

            _ = keepalive.tick() => {
                if let Err(e) = write(&mut sink, Message::Ping(Vec::new())).await {
                    break Err(e);
                }
            }
        }
    };

    if let Err(e) = result {
        debug!(target: "lights.connection", error = %e, "Write pump stopped");
    }
    // Take the read pump down with us
    cancel_token.cancel();
}

async fn write<K>(sink: &mut K, message: Message) -> Result<(), LightsError>
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    match timeout(WRITE_WAIT, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(LightsError::Transport(e.to_string())),
        Err(_) => Err(LightsError::Transport("write timed out".to_string())),
    }
}
