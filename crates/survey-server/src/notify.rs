//! Topic-based event fan-out.
//!
//! `EventBus` keeps a firehose channel that sees every event plus one
//! broadcast channel per mission topic. Publication is ordered per publisher
//! and delivered at-least-once to subscribers that keep up; lagging
//! subscribers skip ahead. After `close()` every publish fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use survey_core::MissionEvent;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

pub type EventReceiver = broadcast::Receiver<Arc<MissionEvent>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("event bus is closed")]
    Closed,
    #[error("publish to {topic} failed: {reason}")]
    Rejected { topic: String, reason: String },
}

/// Outbound notification seam used by the orchestrator.
pub trait Notifier: Send + Sync {
    fn publish(&self, topic: &str, event: &MissionEvent) -> Result<(), NotifyError>;
}

pub struct EventBus {
    firehose: RwLock<Option<broadcast::Sender<Arc<MissionEvent>>>>,
    topics: DashMap<String, broadcast::Sender<Arc<MissionEvent>>>,
    capacity: usize,
    closed: AtomicBool,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (firehose, _) = broadcast::channel(capacity);
        Self {
            firehose: RwLock::new(Some(firehose)),
            topics: DashMap::new(),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Receive every event published on any topic.
    pub fn subscribe_all(&self) -> Result<EventReceiver, NotifyError> {
        let guard = self.firehose.read().unwrap_or_else(|p| p.into_inner());
        guard.as_ref().map(|tx| tx.subscribe()).ok_or(NotifyError::Closed)
    }

    /// Receive events published on `topic` only.
    pub fn subscribe(&self, topic: &str) -> Result<EventReceiver, NotifyError> {
        if self.is_closed() {
            return Err(NotifyError::Closed);
        }
        let sender = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.subscribe())
    }

    /// Drop a topic channel once its last subscriber is gone.
    pub fn forget_topic(&self, topic: &str) {
        self.topics
            .remove_if(topic, |_, tx| tx.receiver_count() == 0);
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Stop accepting events and close every subscriber stream.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.firehose
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        self.topics.clear();
        debug!("Event bus closed");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl Notifier for EventBus {
    fn publish(&self, topic: &str, event: &MissionEvent) -> Result<(), NotifyError> {
        if self.is_closed() {
            return Err(NotifyError::Closed);
        }
        let event = Arc::new(event.clone());

        {
            let guard = self.firehose.read().unwrap_or_else(|p| p.into_inner());
            let tx = guard.as_ref().ok_or(NotifyError::Closed)?;
            // No subscribers is not a failure.
            let _ = tx.send(event.clone());
        }

        let idle = match self.topics.get(topic) {
            Some(tx) => tx.send(event).is_err(),
            None => false,
        };
        if idle {
            self.topics.remove_if(topic, |_, tx| tx.receiver_count() == 0);
        }
        Ok(())
    }
}
