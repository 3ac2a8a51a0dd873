//! # cp-05-event-streaming
//!
//! Region-partitioned, capacity-bounded event ingestion with supervised
//! consumers and a dead-letter store.
//!
//! ```text
//!  publish(region, payload)
//!          │ FNV-1a(key) % fan_out
//!          ▼
//!   ┌─────────────┐ claim  ┌──────────┐  ack   ┌─────────────┐
//!   │  Partition  │ ─────► │ Consumer │ ─────► │  released   │
//!   │ (bounded)   │ ◄───── │(in flight)│        └─────────────┘
//!   └─────────────┘  nack  └──────────┘
//!          ▲  retry < max     │ retries exhausted / consumer dead
//!          │                  ▼
//!          │ replay    ┌──────────────┐
//!          └────────── │ Dead letters │
//!                      └──────────────┘
//! ```
//!
//! A partition's load counts queued and in-flight events, so a full
//! partition rejects publishes with [`StreamingError::PartitionOverloaded`]
//! until work is acknowledged or dead-lettered. Rejection is backpressure: no
//! event is ever dropped silently.

pub mod domain;
pub mod error;
pub mod partition;
pub mod supervisor;

pub use domain::config::{StreamingConfig, SupervisorConfig};
pub use domain::consumer::{ConsumerId, ConsumerState, ConsumerStatus, StatusChange, ANY_EVENT_TYPE};
pub use domain::dead_letter::{
    DeadLetterEntry, DeadLetterStore, REASON_CONSUMER_DEAD, REASON_PROCESSING_TIMEOUT,
};
pub use domain::event::{Ack, EventId, EventPayload, PartitionId, StreamEvent};
pub use error::{StreamingConfigError, StreamingError, StreamingResult};
pub use partition::{EventPartitionManager, Partition, PartitionSnapshot, PartitionStatus};
pub use supervisor::{
    ConsumerSupervisor, DeregisterReport, Redelivery, RetryOutcome, SupervisionReport,
};
