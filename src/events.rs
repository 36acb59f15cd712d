//! Event bus for broadcasting live counter snapshots

use crate::db::LiveSnapshot;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<LiveSnapshot>>,
}

impl EventBus {
    pub fn new(sender: broadcast::Sender<Arc<LiveSnapshot>>) -> Self {
        Self { sender }
    }

    pub fn publish(&self, snapshot: LiveSnapshot) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(snapshot));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LiveSnapshot>> {
        self.sender.subscribe()
    }
}
