use std::collections::HashMap;
use std::future::poll_fn;
use std::time::Duration;

use serde::Serialize;
use tokio_util::time::{delay_queue, DelayQueue};

use crate::model::{EntityId, EntityKind};

/// Identifies one highlighted entity across all collections of a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HighlightKey {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl HighlightKey {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

/// Clear-timers for `justUpdated` flags.
///
/// One timer per key: flagging a key again restarts its timer, cancelling
/// drops it, and dropping the queue drops them all. Needs a tokio runtime
/// with the time driver once a timer is scheduled.
#[derive(Debug)]
pub struct Highlights {
    duration: Duration,
    queue: DelayQueue<HighlightKey>,
    keys: HashMap<HighlightKey, delay_queue::Key>,
}

impl Highlights {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            queue: DelayQueue::new(),
            keys: HashMap::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn schedule(&mut self, key: HighlightKey) {
        match self.keys.get(&key) {
            Some(timer) => self.queue.reset(timer, self.duration),
            None => {
                let timer = self.queue.insert(key.clone(), self.duration);
                self.keys.insert(key, timer);
            }
        }
    }

    pub fn cancel(&mut self, key: &HighlightKey) -> bool {
        match self.keys.remove(key) {
            Some(timer) => {
                self.queue.remove(&timer);
                true
            }
            None => false,
        }
    }

    pub fn cancel_kind(&mut self, kind: EntityKind) {
        let doomed: Vec<HighlightKey> = self
            .keys
            .keys()
            .filter(|key| key.kind == kind)
            .cloned()
            .collect();
        for key in doomed {
            self.cancel(&key);
        }
    }

    pub fn is_pending(&self, key: &HighlightKey) -> bool {
        self.keys.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Wait for the next timer to fire. Pending forever while nothing is
    /// scheduled, so it can sit in a `select!` loop unguarded.
    ///
    /// Cancel safe: a key is only taken out of the queue in the poll that
    /// completes the future.
    pub async fn next_expired(&mut self) -> HighlightKey {
        if self.queue.is_empty() {
            return std::future::pending().await;
        }
        match poll_fn(|cx| self.queue.poll_expired(cx)).await {
            Some(expired) => {
                let key = expired.into_inner();
                self.keys.remove(&key);
                key
            }
            None => std::future::pending().await,
        }
    }
}
