//! Error types for event streaming.

use crate::domain::event::{EventId, PartitionId};
use shared_types::ControlPlaneError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamingError {
    /// Backpressure: the partition is at capacity
    #[error("Partition {partition} overloaded: capacity {capacity} reached")]
    PartitionOverloaded {
        partition: PartitionId,
        capacity: usize,
    },

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Unknown consumer: {0}")]
    UnknownConsumer(String),

    /// The consumer was declared dead and must re-register
    #[error("Consumer {0} is dead")]
    ConsumerDead(String),

    #[error("Event {event_id} is not in flight for consumer {consumer}")]
    NotInFlight { consumer: String, event_id: EventId },

    #[error("Dead letter not found: {0}")]
    DeadLetterNotFound(EventId),

    #[error("Dead letter {event_id} exhausted after {replays} replays")]
    DeadLetterExhausted { event_id: EventId, replays: u32 },
}

/// Rejected streaming configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamingConfigError {
    #[error("at least one region must be configured")]
    NoRegions,

    #[error("region '{0}' configured twice")]
    DuplicateRegion(String),

    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
}

pub type StreamingResult<T> = Result<T, StreamingError>;

impl StreamingError {
    pub fn is_backpressure(&self) -> bool {
        matches!(self, StreamingError::PartitionOverloaded { .. })
    }
}

impl From<StreamingError> for ControlPlaneError {
    fn from(err: StreamingError) -> Self {
        match err {
            StreamingError::PartitionOverloaded {
                partition,
                capacity,
            } => ControlPlaneError::PartitionOverloaded {
                partition,
                capacity,
            },
            StreamingError::UnknownRegion(id) => ControlPlaneError::NotFound { kind: "region", id },
            StreamingError::UnknownConsumer(id) => {
                ControlPlaneError::NotFound { kind: "consumer", id }
            }
            StreamingError::ConsumerDead(id) => ControlPlaneError::NotFound {
                kind: "live consumer",
                id,
            },
            StreamingError::NotInFlight { event_id, .. } => ControlPlaneError::NotFound {
                kind: "in-flight event",
                id: event_id.to_string(),
            },
            StreamingError::DeadLetterNotFound(event_id) => ControlPlaneError::NotFound {
                kind: "dead letter",
                id: event_id.to_string(),
            },
            StreamingError::DeadLetterExhausted { event_id, replays } => {
                ControlPlaneError::DeadLetterExhausted {
                    event_id: event_id.0,
                    replays,
                }
            }
        }
    }
}
