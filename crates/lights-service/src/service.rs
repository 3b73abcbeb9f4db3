//! The referee lights service: wires the registry, state store, broadcaster,
//! timer engine and decision coordinator together and dispatches inbound
//! commands from connections and the admin surface.

use crate::actors::broadcaster::BroadcasterHandle;
use crate::actors::metrics::MailboxMonitor;
use crate::config::{Config, ConnectionSettings};
use crate::errors::LightsError;
use crate::meet::{DecisionCoordinator, MeetState, MeetStateStore, StateProvider, TimerEngine};
use crate::observability::{metrics, HealthState};
use crate::protocol::{parse_client_message, InboundCommand, ServerMessage, TimerView};
use crate::registry::{ConnectionRegistry, OutboundSender};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Point-in-time view of one meet for the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetSnapshot {
    pub meet_name: String,
    pub decisions: BTreeMap<String, String>,
    pub platform_ready: PlatformReadySnapshot,
    pub next_attempt_timers: Vec<TimerView>,
    pub connected_judge_ids: Vec<String>,
    pub connections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformReadySnapshot {
    pub active: bool,
    pub time_left: Option<u64>,
}

pub struct LightsService {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn StateProvider>,
    broadcaster: BroadcasterHandle,
    timers: Arc<TimerEngine>,
    decisions: DecisionCoordinator,
    connection_settings: ConnectionSettings,
    health: Arc<HealthState>,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for LightsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightsService")
            .field("quorum", &self.decisions.quorum())
            .field("connection_settings", &self.connection_settings)
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl LightsService {
    /// Build the service with an in-memory state store and spawn the
    /// broadcast distribution task.
    pub fn new(config: &Config, cancel_token: CancellationToken) -> (Arc<Self>, JoinHandle<()>) {
        Self::with_store(config, Arc::new(MeetStateStore::new()), cancel_token)
    }

    /// Build the service around a caller-supplied state provider.
    pub fn with_store(
        config: &Config,
        store: Arc<dyn StateProvider>,
        cancel_token: CancellationToken,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let (broadcaster, task_handle) = BroadcasterHandle::spawn(
            Arc::clone(&registry),
            config.broadcast_queue_capacity,
            cancel_token.child_token(),
        );
        let timers = Arc::new(TimerEngine::new(broadcaster.clone(), config.timers));
        let decisions = DecisionCoordinator::new(
            broadcaster.clone(),
            Arc::clone(&timers),
            config.required_referees,
            config.timers.results_display,
        );

        let service = Arc::new(Self {
            registry,
            store,
            broadcaster,
            timers,
            decisions,
            connection_settings: config.connection,
            health: Arc::new(HealthState::new()),
            cancel_token,
        });
        (service, task_handle)
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateProvider> {
        &self.store
    }

    #[must_use]
    pub fn broadcaster(&self) -> &BroadcasterHandle {
        &self.broadcaster
    }

    #[must_use]
    pub fn timers(&self) -> &Arc<TimerEngine> {
        &self.timers
    }

    #[must_use]
    pub fn decisions(&self) -> &DecisionCoordinator {
        &self.decisions
    }

    #[must_use]
    pub fn connection_settings(&self) -> &ConnectionSettings {
        &self.connection_settings
    }

    #[must_use]
    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    /// Token for a task that must stop with the service.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    /// Join a connection to a meet, creating the meet's state on first use.
    pub async fn connect(
        &self,
        connection_id: Uuid,
        meet_name: &str,
        sender: OutboundSender,
        monitor: Arc<MailboxMonitor>,
    ) {
        self.store.get_or_create(meet_name).await;
        self.registry
            .register(connection_id, meet_name, sender, monitor)
            .await;
    }

    /// Remove a connection. If it had registered as a judge, the meet is told
    /// the new referee roster.
    pub async fn disconnect(&self, connection_id: Uuid) {
        let Some(removed) = self.registry.unregister(connection_id).await else {
            return;
        };
        if removed.judge_id.is_some() {
            self.broadcast_referee_health(&removed.meet_name).await;
        }
    }

    /// Parse and apply one inbound text frame. Protocol and state faults are
    /// logged here; the connection stays open either way.
    pub async fn handle_text(
        &self,
        connection_id: Uuid,
        meet_name: &str,
        text: &str,
    ) -> Result<(), LightsError> {
        let result = match parse_client_message(text) {
            Ok((message, command)) => {
                if let Some(claimed) = message.meet_name.as_deref() {
                    if !claimed.is_empty() && claimed != meet_name {
                        warn!(
                            target: "lights.connection",
                            connection_id = %connection_id,
                            meet_name = %meet_name,
                            claimed_meet = %claimed,
                            action = command.name(),
                            "Message names a different meet, using the connection's meet"
                        );
                    }
                }
                self.dispatch(connection_id, meet_name, command).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            metrics::record_protocol_error(e.error_type());
            warn!(
                target: "lights.connection",
                connection_id = %connection_id,
                meet_name = %meet_name,
                error = %e,
                "Inbound message discarded"
            );
        }
        result
    }

    /// Apply a validated command on behalf of a connection.
    pub async fn dispatch(
        &self,
        connection_id: Uuid,
        meet_name: &str,
        command: InboundCommand,
    ) -> Result<(), LightsError> {
        let meet_owned = meet_name.to_string();
        match command {
            InboundCommand::RegisterRef { judge_id } => {
                if self.registry.set_judge_id(connection_id, &judge_id).await {
                    self.broadcast_referee_health(meet_name).await;
                }
            }
            InboundCommand::StartTimer => {
                let meet = self.store.get_or_create(meet_name).await;
                meet.clear_round().await;
                // Engine emits clearResults, then the startTimer cue
                self.timers.start_platform_ready(&meet).await;
            }
            InboundCommand::ResetTimer => {
                let meet = self.store.get_or_create(meet_name).await;
                self.broadcaster.to_meet(
                    meet_name,
                    ServerMessage::ResetTimer {
                        meet_name: meet_owned.clone(),
                    },
                );
                self.timers.reset_platform_ready(&meet).await;
                meet.clear_round().await;
                self.broadcaster.to_meet(
                    meet_name,
                    ServerMessage::ClearResults {
                        meet_name: meet_owned,
                    },
                );
            }
            InboundCommand::ResetLights => {
                self.broadcaster.to_meet(
                    meet_name,
                    ServerMessage::ResetLights {
                        meet_name: meet_owned,
                    },
                );
            }
            InboundCommand::StartNextAttemptTimer => {
                let meet = self.store.get_or_create(meet_name).await;
                self.timers.start_next_attempt(&meet).await;
            }
            InboundCommand::SubmitDecision { judge_id, decision } => {
                let registered = self
                    .registry
                    .judge_id(connection_id)
                    .await
                    .ok_or(LightsError::UnregisteredJudge)?;
                if let Some(claimed) = judge_id {
                    if claimed != registered {
                        return Err(LightsError::JudgeMismatch {
                            registered,
                            claimed,
                        });
                    }
                }
                let meet = self.store.get_or_create(meet_name).await;
                self.decisions.submit(&meet, &registered, &decision).await?;
            }
            InboundCommand::TimerEcho => {
                debug!(
                    target: "lights.connection",
                    connection_id = %connection_id,
                    "Ignoring echoed timer update"
                );
            }
            InboundCommand::Unknown(action) => {
                debug!(
                    target: "lights.connection",
                    connection_id = %connection_id,
                    action = %action,
                    "Ignoring unrecognized action"
                );
            }
        }
        Ok(())
    }

    /// Tell a meet which judges are connected.
    pub async fn broadcast_referee_health(&self, meet_name: &str) {
        let connected_ref_ids = self.registry.connected_judge_ids(meet_name).await;
        self.broadcaster.to_meet(
            meet_name,
            ServerMessage::RefereeHealth {
                connected_referees: connected_ref_ids.len(),
                connected_ref_ids,
                required_referees: self.decisions.quorum(),
                meet_name: meet_name.to_string(),
            },
        );
    }

    // ------------------------------------------------------------------
    // Administrative operations
    // ------------------------------------------------------------------

    pub async fn meet_names(&self) -> Vec<String> {
        self.store.meet_names().await
    }

    /// Snapshot one meet.
    ///
    /// # Errors
    ///
    /// Returns [`LightsError::MeetNotFound`] if the meet has no state.
    pub async fn snapshot(&self, meet_name: &str) -> Result<MeetSnapshot, LightsError> {
        let meet = self
            .store
            .get(meet_name)
            .await
            .ok_or_else(|| LightsError::MeetNotFound(meet_name.to_string()))?;
        Ok(self.snapshot_of(&meet).await)
    }

    async fn snapshot_of(&self, meet: &MeetState) -> MeetSnapshot {
        let meet_name = meet.meet_name();
        let time_left = self.timers.platform_ready_remaining(meet).await;
        MeetSnapshot {
            meet_name: meet_name.to_string(),
            decisions: meet.decisions().await.into_iter().collect(),
            platform_ready: PlatformReadySnapshot {
                active: time_left.is_some(),
                time_left,
            },
            next_attempt_timers: self.timers.next_attempt_views(meet).await,
            connected_judge_ids: self.registry.connected_judge_ids(meet_name).await,
            connections: self.registry.meet_connection_count(meet_name).await,
        }
    }

    /// Hard-reset a meet: discard its state, stop its timers and clear the
    /// displays. Connections stay joined; the next reference recreates state.
    ///
    /// # Errors
    ///
    /// Returns [`LightsError::MeetNotFound`] if the meet has no state.
    pub async fn reset_meet(&self, meet_name: &str) -> Result<(), LightsError> {
        self.store
            .clear(meet_name)
            .await
            .ok_or_else(|| LightsError::MeetNotFound(meet_name.to_string()))?;

        self.broadcaster.to_meet(
            meet_name,
            ServerMessage::ClearResults {
                meet_name: meet_name.to_string(),
            },
        );
        info!(target: "lights.admin", meet_name = %meet_name, "Meet reset");
        Ok(())
    }

    /// Begin graceful shutdown: stop advertising readiness and tell every
    /// connection the server is going away.
    pub fn begin_shutdown(&self, reason: &str) {
        self.health.set_not_ready();
        self.broadcaster.to_all(ServerMessage::ServerShutdown {
            reason: reason.to_string(),
        });
        info!(target: "lights.admin", reason = %reason, "Shutdown announced");
    }

    /// Cancel every connection, timer and the distribution task.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}
