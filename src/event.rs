//! Event recorder
//!
//! Decouples the engine from whoever wants to observe what it did. Plans and
//! transformers publish [`ClusterEvent`]s; subscribers receive every event
//! published after they subscribed.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::ObjectKey;

/// Fans recorded events out to every subscriber
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    /// Create a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns how many subscribers got the event
    ///
    /// A lagging subscriber loses its oldest buffered events.
    pub fn publish(&self, event: E) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Publish several events, returning the total number of deliveries
    pub fn publish_batch(&self, events: Vec<E>) -> usize {
        events.into_iter().map(|e| self.publish(e)).sum()
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// A recorded occurrence against one object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub object: ObjectKey,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

impl ClusterEvent {
    pub fn normal(object: ObjectKey, reason: &str, message: impl Into<String>) -> Self {
        Self {
            object,
            event_type: EventType::Normal,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(object: ObjectKey, reason: &str, message: impl Into<String>) -> Self {
        Self {
            object,
            event_type: EventType::Warning,
            reason: reason.to_string(),
            message: message.into(),
        }
    }
}

/// Event reasons emitted by the engine
pub mod reasons {
    pub const PRECHECK_FAILED: &str = "PreCheckFailed";
    pub const DELETION_BLOCKED: &str = "DeletionBlocked";
    pub const HORIZONTAL_SCALE: &str = "HorizontalScale";
    pub const VOLUME_SHRINK: &str = "VolumeShrinkUnsupported";
    pub const COMPONENT_PHASE: &str = "ComponentPhaseTransition";
    pub const CLUSTER_PHASE: &str = "ClusterPhaseTransition";
    pub const APPLY_FAILED: &str = "ApplyResourcesFailed";
}
