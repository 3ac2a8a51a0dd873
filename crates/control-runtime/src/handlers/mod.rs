//! # Background Tasks
//!
//! Async tasks the binary runs around the [`ControlPlane`]:
//!
//! - `worker` - consumer workers that claim, process and acknowledge events
//! - `background` - the liveness sweep, the periodic snapshot logger and
//!   the Prometheus file export
//!
//! Every task takes a `watch::Receiver<bool>` and exits once `true` is sent.
//!
//! [`ControlPlane`]: crate::container::ControlPlane

pub mod background;
pub mod worker;

pub use background::{export_metrics, spawn_snapshot_logger, spawn_supervisor};
pub use worker::{ConsumerWorker, EventHandler, LoggingHandler, WorkerReport};
