//! User activity signals
//!
//! The host forwards every pointer, key, scroll and touch interaction to an
//! [`ActivityBus`]. Listeners subscribe to the bus instead of to individual
//! widgets, so activity anywhere in the application is observed.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const ACTIVITY_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Pointer,
    Key,
    Scroll,
    Touch,
}

#[derive(Debug, Clone)]
pub struct ActivityBus {
    tx: broadcast::Sender<ActivityKind>,
}

impl ActivityBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ACTIVITY_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Report one interaction. Dropped silently when nobody listens.
    pub fn emit(&self, kind: ActivityKind) {
        let _ = self.tx.send(kind);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityKind> {
        self.tx.subscribe()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ActivityBus {
    fn default() -> Self {
        Self::new()
    }
}
