//! Recording state provider.
//!
//! Wraps the in-memory [`MeetStateStore`] and counts calls so tests can see
//! which paths create state and which only look it up.

use async_trait::async_trait;
use lights_service::meet::{MeetState, MeetStateStore, StateProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MeetStateStore,
    get_or_create_calls: AtomicUsize,
    get_calls: AtomicUsize,
    clear_calls: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_calls(&self) -> usize {
        self.get_or_create_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateProvider for RecordingStore {
    async fn get_or_create(&self, meet_name: &str) -> Arc<MeetState> {
        self.get_or_create_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_or_create(meet_name).await
    }

    async fn get(&self, meet_name: &str) -> Option<Arc<MeetState>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(meet_name).await
    }

    async fn clear(&self, meet_name: &str) -> Option<Arc<MeetState>> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.clear(meet_name).await
    }

    async fn meet_names(&self) -> Vec<String> {
        self.inner.meet_names().await
    }
}
