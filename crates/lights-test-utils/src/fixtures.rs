//! Service builders and canned client frames.

use crate::client::TestClient;
use lights_service::config::Config;
use lights_service::meet::StateProvider;
use lights_service::routes::{build_routes, AppState};
use lights_service::service::LightsService;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default meet name used across tests.
pub const TEST_MEET: &str = "spring-open";

/// A running service and the handles needed to tear it down.
pub struct TestService {
    pub service: Arc<LightsService>,
    pub cancel_token: CancellationToken,
    pub broadcast_task: JoinHandle<()>,
}

impl TestService {
    /// Service with default timings. Pair with `start_paused = true` so
    /// countdowns only move when the test advances the clock.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let cancel_token = CancellationToken::new();
        let (service, broadcast_task) = LightsService::new(config, cancel_token.clone());
        Self {
            service,
            cancel_token,
            broadcast_task,
        }
    }

    pub fn with_store(config: &Config, store: Arc<dyn StateProvider>) -> Self {
        let cancel_token = CancellationToken::new();
        let (service, broadcast_task) =
            LightsService::with_store(config, store, cancel_token.clone());
        Self {
            service,
            cancel_token,
            broadcast_task,
        }
    }

    /// A display-only client.
    pub async fn client(&self, meet_name: &str) -> TestClient {
        TestClient::connect(&self.service, meet_name).await
    }

    /// A client registered as the given judge.
    pub async fn referee(&self, meet_name: &str, judge_id: &str) -> TestClient {
        let client = TestClient::connect(&self.service, meet_name).await;
        client.register(judge_id).await;
        client
    }

    /// Left, center and right referees for one meet.
    pub async fn panel(&self, meet_name: &str) -> [TestClient; 3] {
        [
            self.referee(meet_name, "left").await,
            self.referee(meet_name, "center").await,
            self.referee(meet_name, "right").await,
        ]
    }

    /// The HTTP router over this service, without a metrics endpoint.
    pub fn router(&self) -> axum::Router {
        build_routes(Arc::new(AppState::new(Arc::clone(&self.service))), None)
    }

    /// Cancel everything and wait for the broadcast task to drain.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        self.broadcast_task
            .await
            .expect("broadcast task should not panic");
    }
}

impl Default for TestService {
    fn default() -> Self {
        Self::new()
    }
}

pub fn register_ref(meet_name: &str, judge_id: &str) -> serde_json::Value {
    serde_json::json!({
        "action": "registerRef",
        "meetName": meet_name,
        "judgeId": judge_id,
    })
}

pub fn submit_decision(meet_name: &str, judge_id: &str, decision: &str) -> serde_json::Value {
    serde_json::json!({
        "action": "submitDecision",
        "meetName": meet_name,
        "judgeId": judge_id,
        "decision": decision,
    })
}

/// A frame carrying only an action and meet, e.g. `startTimer`.
pub fn bare_action(meet_name: &str, action: &str) -> serde_json::Value {
    serde_json::json!({
        "action": action,
        "meetName": meet_name,
    })
}
