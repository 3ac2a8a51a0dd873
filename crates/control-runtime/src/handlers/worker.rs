//! # Consumer Worker
//!
//! Runs one stream consumer as a tokio task.
//!
//! ## Loop
//!
//! ```text
//! register ──→ claim ──→ handler.handle ──→ ack / nack
//!                ↑                              │
//!                └──────── heartbeat ←──────────┘
//!
//! shutdown: finish current event → begin_drain → deregister
//! ```
//!
//! The worker never abandons an event it has claimed: shutdown is only
//! observed between events. Work still queued for it when it deregisters is
//! redelivered by the supervisor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cp_05_event_streaming::{DeregisterReport, StreamEvent};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::container::ControlPlane;

/// Processes one claimed event. An `Err` is reported as a nack with the
/// returned reason.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &StreamEvent) -> Result<(), String>;
}

/// Acknowledges everything; used by the demo consumers.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &StreamEvent) -> Result<(), String> {
        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            partition = event.partition,
            "Event handled"
        );
        Ok(())
    }
}

/// Totals for one worker run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub consumer: String,
    pub processed: u64,
    pub failed: u64,
    /// `None` when the consumer was declared dead before it could deregister
    pub deregistered: Option<DeregisterReport>,
}

pub struct ConsumerWorker<H> {
    id: String,
    event_types: Vec<String>,
    plane: Arc<ControlPlane>,
    handler: H,
    heartbeat_every: Duration,
    idle_backoff: Duration,
}

impl<H: EventHandler> ConsumerWorker<H> {
    pub fn new(
        id: impl Into<String>,
        event_types: Vec<String>,
        plane: Arc<ControlPlane>,
        handler: H,
    ) -> Self {
        let heartbeat_ms = plane.config().streaming.supervisor.heartbeat_interval_ms;
        Self {
            id: id.into(),
            event_types,
            plane,
            handler,
            // Half the window, so one late tick never costs a missed heartbeat.
            heartbeat_every: Duration::from_millis((heartbeat_ms / 2).max(1)),
            idle_backoff: Duration::from_millis(50),
        }
    }

    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run until `shutdown` flips to `true` or the consumer is declared dead.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> WorkerReport {
        let mut report = WorkerReport {
            consumer: self.id.clone(),
            ..WorkerReport::default()
        };
        self.plane.register_consumer(&self.id, self.event_types.clone());
        info!(consumer = %self.id, event_types = ?self.event_types, "Consumer worker started");

        let mut last_heartbeat = Instant::now();
        loop {
            if *shutdown.borrow() {
                break;
            }

            if last_heartbeat.elapsed() >= self.heartbeat_every {
                if let Err(e) = self.plane.heartbeat(&self.id) {
                    warn!(consumer = %self.id, error = %e, "Heartbeat rejected, stopping worker");
                    return report;
                }
                last_heartbeat = Instant::now();
            }

            match self.plane.claim(&self.id) {
                Ok(Some(event)) => self.process(event, &mut report).await,
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(self.idle_backoff) => {}
                    }
                }
                Err(e) => {
                    warn!(consumer = %self.id, error = %e, "Claim rejected, stopping worker");
                    return report;
                }
            }
        }

        info!(consumer = %self.id, "Shutdown signal received, draining");
        if let Err(e) = self.plane.begin_drain(&self.id) {
            warn!(consumer = %self.id, error = %e, "Drain failed");
        }
        match self.plane.deregister_consumer(&self.id) {
            Ok(deregistered) => {
                info!(
                    consumer = %self.id,
                    processed = report.processed,
                    redelivered = deregistered.redelivered.len(),
                    returned = deregistered.returned_to_partition.len(),
                    "Consumer worker stopped"
                );
                report.deregistered = Some(deregistered);
            }
            Err(e) => warn!(consumer = %self.id, error = %e, "Deregister failed"),
        }
        report
    }

    async fn process(&self, event: StreamEvent, report: &mut WorkerReport) {
        let event_id = event.id;
        match self.handler.handle(&event).await {
            Ok(()) => match self.plane.ack(&self.id, event_id) {
                Ok(()) => report.processed += 1,
                // Timed out and reassigned while we were working on it.
                Err(e) => {
                    debug!(consumer = %self.id, event_id = %event_id, error = %e, "Late ack dropped")
                }
            },
            Err(reason) => {
                report.failed += 1;
                match self.plane.nack(&self.id, event_id, &reason) {
                    Ok(outcome) => debug!(
                        consumer = %self.id,
                        event_id = %event_id,
                        ?outcome,
                        reason = %reason,
                        "Event nacked"
                    ),
                    Err(e) => {
                        debug!(consumer = %self.id, event_id = %event_id, error = %e, "Late nack dropped")
                    }
                }
            }
        }
    }
}
