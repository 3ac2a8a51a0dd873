//! Consumer Supervisor
//!
//! Tracks consumer liveness, hands out work, and routes failed or orphaned
//! events to retries, other consumers, or the dead-letter store.
//!
//! ## Lock order
//!
//! consumer record → partition → dead-letter store. Work taken from one
//! consumer is detached (its record unlocked) before any other consumer's
//! record is locked, so two records are never held at once.

use crate::domain::config::SupervisorConfig;
use crate::domain::consumer::{subscribes_to, ConsumerId, ConsumerState, ConsumerStatus, StatusChange};
use crate::domain::dead_letter::{
    DeadLetterEntry, DeadLetterStore, REASON_CONSUMER_DEAD, REASON_PROCESSING_TIMEOUT,
};
use crate::domain::event::{Ack, EventId, StreamEvent};
use crate::error::{StreamingError, StreamingResult};
use crate::partition::EventPartitionManager;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::{TimeSource, Timestamp, MILLIS_PER_SECOND};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct InFlight {
    event: StreamEvent,
    claimed_at: Timestamp,
}

#[derive(Debug)]
struct ConsumerRecord {
    id: ConsumerId,
    event_types: Vec<String>,
    status: ConsumerStatus,
    last_heartbeat: Timestamp,
    acked_since_heartbeat: u64,
    processing_rate: f64,
    in_flight: HashMap<EventId, InFlight>,
    redelivery: VecDeque<StreamEvent>,
    acked_total: u64,
    nacked_total: u64,
}

impl ConsumerRecord {
    fn new(id: ConsumerId, event_types: Vec<String>, now: Timestamp) -> Self {
        Self {
            id,
            event_types,
            status: ConsumerStatus::Active,
            last_heartbeat: now,
            acked_since_heartbeat: 0,
            processing_rate: 0.0,
            in_flight: HashMap::new(),
            redelivery: VecDeque::new(),
            acked_total: 0,
            nacked_total: 0,
        }
    }

    fn state(&self) -> ConsumerState {
        ConsumerState {
            id: self.id.clone(),
            subscribed_event_types: self.event_types.clone(),
            status: self.status,
            processing_rate: self.processing_rate,
            last_heartbeat: self.last_heartbeat,
            in_flight: self.in_flight.len(),
            pending_redeliveries: self.redelivery.len(),
            acked_total: self.acked_total,
            nacked_total: self.nacked_total,
        }
    }

    /// Take all claimed and pending work off this consumer.
    fn detach_work(&mut self) -> Vec<StreamEvent> {
        let mut work: Vec<StreamEvent> = self.redelivery.drain(..).collect();
        let mut claimed: Vec<_> = self.in_flight.drain().map(|(_, f)| f.event).collect();
        claimed.sort_by_key(|e| e.id);
        work.extend(claimed);
        work
    }
}

/// What happened to a nacked or timed-out event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum RetryOutcome {
    Requeued { retry_count: u32 },
    DeadLettered { retry_count: u32 },
}

/// Redelivery of an orphaned event to another consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redelivery {
    pub event_id: EventId,
    pub from: ConsumerId,
    pub to: ConsumerId,
}

/// Result of one `supervise()` sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupervisionReport {
    pub status_changes: Vec<StatusChange>,
    pub redelivered: Vec<Redelivery>,
    pub dead_lettered: Vec<EventId>,
    pub timed_out: Vec<(EventId, RetryOutcome)>,
    /// Dead-letter count after the sweep
    pub dead_letter_count: usize,
}

impl SupervisionReport {
    pub fn is_quiet(&self) -> bool {
        self.status_changes.is_empty()
            && self.redelivered.is_empty()
            && self.dead_lettered.is_empty()
            && self.timed_out.is_empty()
    }
}

/// Work handed back when a consumer deregisters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeregisterReport {
    pub consumer: ConsumerId,
    pub redelivered: Vec<Redelivery>,
    /// Events with no live subscriber, returned to their partition head.
    pub returned_to_partition: Vec<EventId>,
}

pub struct ConsumerSupervisor {
    config: SupervisorConfig,
    partitions: Arc<EventPartitionManager>,
    dead_letters: Arc<DeadLetterStore>,
    consumers: DashMap<ConsumerId, Arc<Mutex<ConsumerRecord>>>,
    cursor: AtomicUsize,
    clock: Arc<dyn TimeSource>,
}

impl ConsumerSupervisor {
    pub fn new(
        config: SupervisorConfig,
        partitions: Arc<EventPartitionManager>,
        dead_letters: Arc<DeadLetterStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            partitions,
            dead_letters,
            consumers: DashMap::new(),
            cursor: AtomicUsize::new(0),
            clock,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn partitions(&self) -> &Arc<EventPartitionManager> {
        &self.partitions
    }

    pub fn dead_letters(&self) -> &Arc<DeadLetterStore> {
        &self.dead_letters
    }

    fn record(&self, id: &str) -> StreamingResult<Arc<Mutex<ConsumerRecord>>> {
        self.consumers
            .get(id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| StreamingError::UnknownConsumer(id.to_string()))
    }

    fn records(&self) -> Vec<Arc<Mutex<ConsumerRecord>>> {
        let mut records: Vec<_> = self
            .consumers
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        records.into_iter().map(|(_, r)| r).collect()
    }

    /// Register (or re-register) a consumer for `event_types`; `"*"`
    /// subscribes to everything. Re-registering a known consumer replaces its
    /// subscription and marks it active.
    pub fn register(&self, id: &str, event_types: Vec<String>) -> ConsumerState {
        let now = self.clock.now();
        let record = self
            .consumers
            .entry(id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ConsumerRecord::new(id.to_string(), Vec::new(), now)))
            })
            .clone();

        let mut record = record.lock();
        record.event_types = event_types;
        record.status = ConsumerStatus::Active;
        record.last_heartbeat = now;
        info!(consumer = id, types = ?record.event_types, "Consumer registered");
        record.state()
    }

    /// Liveness signal. Recomputes the processing rate from acks since the
    /// previous heartbeat and revives a degraded consumer.
    pub fn heartbeat(&self, id: &str) -> StreamingResult<ConsumerState> {
        let now = self.clock.now();
        let record = self.record(id)?;
        let mut record = record.lock();
        if record.status == ConsumerStatus::Dead {
            return Err(StreamingError::ConsumerDead(id.to_string()));
        }

        let elapsed_ms = now.saturating_sub(record.last_heartbeat);
        if elapsed_ms > 0 {
            record.processing_rate =
                record.acked_since_heartbeat as f64 * MILLIS_PER_SECOND as f64 / elapsed_ms as f64;
        }
        record.acked_since_heartbeat = 0;
        record.last_heartbeat = now;
        if record.status == ConsumerStatus::Degraded {
            record.status = ConsumerStatus::Active;
            info!(consumer = id, "Consumer recovered");
        }
        Ok(record.state())
    }

    /// Next event for this consumer: pending redeliveries first, then the
    /// oldest subscribed event across partitions, visited round-robin.
    /// Draining consumers get nothing.
    pub fn claim(&self, id: &str) -> StreamingResult<Option<StreamEvent>> {
        let now = self.clock.now();
        let record = self.record(id)?;
        let mut record = record.lock();
        match record.status {
            ConsumerStatus::Dead => return Err(StreamingError::ConsumerDead(id.to_string())),
            ConsumerStatus::Draining => return Ok(None),
            ConsumerStatus::Active | ConsumerStatus::Degraded => {}
        }

        let event = match record.redelivery.pop_front() {
            Some(event) => Some(event),
            None => {
                let partitions = self.partitions.partitions();
                let start = self.cursor.fetch_add(1, Ordering::Relaxed);
                (0..partitions.len())
                    .map(|offset| &partitions[(start + offset) % partitions.len()])
                    .find_map(|partition| partition.pop_matching(&record.event_types))
            }
        };

        if let Some(event) = &event {
            debug!(consumer = id, event_id = %event.id, partition = event.partition, "Event claimed");
            record.in_flight.insert(
                event.id,
                InFlight {
                    event: event.clone(),
                    claimed_at: now,
                },
            );
        }
        Ok(event)
    }

    /// Successful processing; releases the partition slot.
    pub fn ack(&self, id: &str, event_id: EventId) -> StreamingResult<()> {
        let record = self.record(id)?;
        let mut record = record.lock();
        let in_flight = record
            .in_flight
            .remove(&event_id)
            .ok_or_else(|| StreamingError::NotInFlight {
                consumer: id.to_string(),
                event_id,
            })?;
        record.acked_total += 1;
        record.acked_since_heartbeat += 1;
        if let Some(partition) = self.partitions.partition(in_flight.event.partition) {
            partition.release();
        }
        debug!(consumer = id, event_id = %event_id, "Event acknowledged");
        Ok(())
    }

    /// Failed processing; the event is retried or dead-lettered.
    pub fn nack(&self, id: &str, event_id: EventId, reason: &str) -> StreamingResult<RetryOutcome> {
        let record = self.record(id)?;
        let mut record = record.lock();
        let in_flight = record
            .in_flight
            .remove(&event_id)
            .ok_or_else(|| StreamingError::NotInFlight {
                consumer: id.to_string(),
                event_id,
            })?;
        record.nacked_total += 1;
        Ok(self.retry_or_dead_letter(in_flight.event, reason))
    }

    fn retry_or_dead_letter(&self, mut event: StreamEvent, reason: &str) -> RetryOutcome {
        let Some(partition) = self.partitions.partition(event.partition) else {
            return self.dead_letter(event, reason);
        };
        if event.retry_count < self.config.max_retries {
            event.retry_count += 1;
            let retry_count = event.retry_count;
            debug!(event_id = %event.id, retry_count, reason, "Event requeued for retry");
            partition.requeue_front(event);
            RetryOutcome::Requeued { retry_count }
        } else {
            self.dead_letter(event, reason)
        }
    }

    fn dead_letter(&self, event: StreamEvent, reason: &str) -> RetryOutcome {
        let retry_count = event.retry_count;
        if let Some(partition) = self.partitions.partition(event.partition) {
            partition.release();
        }
        warn!(
            event_id = %event.id,
            partition = event.partition,
            retry_count,
            reason,
            "Event dead-lettered"
        );
        self.dead_letters
            .insert(DeadLetterEntry::new(event, reason, self.clock.now()));
        RetryOutcome::DeadLettered { retry_count }
    }

    /// Hand `event` to a live subscriber other than `from`, active consumers
    /// first. Returns the chosen consumer.
    fn redeliver(&self, event: StreamEvent, from: &str) -> Result<ConsumerId, StreamEvent> {
        let records = self.records();
        for wanted in [ConsumerStatus::Active, ConsumerStatus::Degraded] {
            for record in &records {
                let mut record = record.lock();
                if record.id != from
                    && record.status == wanted
                    && subscribes_to(&record.event_types, &event.event_type)
                {
                    record.redelivery.push_back(event);
                    return Ok(record.id.clone());
                }
            }
        }
        Err(event)
    }

    /// One liveness sweep.
    ///
    /// - a consumer silent for at least one heartbeat window is `degraded`;
    ///   for `missed_heartbeats_before_dead` windows it is `dead`
    /// - a dead consumer's work goes to another live subscriber, else to the
    ///   dead-letter store with reason `consumer-dead`
    /// - claimed events older than `processing_timeout_ms` are retried
    pub fn supervise(&self) -> SupervisionReport {
        let now = self.clock.now();
        let mut report = SupervisionReport::default();
        let mut orphans: Vec<(ConsumerId, StreamEvent)> = Vec::new();
        let mut expired: Vec<StreamEvent> = Vec::new();

        for record in self.records() {
            let mut record = record.lock();
            if record.status == ConsumerStatus::Dead {
                continue;
            }

            let missed =
                now.saturating_sub(record.last_heartbeat) / self.config.heartbeat_interval_ms.max(1);
            let next = if missed >= u64::from(self.config.missed_heartbeats_before_dead) {
                ConsumerStatus::Dead
            } else if missed >= 1 && record.status == ConsumerStatus::Active {
                ConsumerStatus::Degraded
            } else {
                record.status
            };

            if next != record.status {
                let change = StatusChange {
                    consumer: record.id.clone(),
                    from: record.status,
                    to: next,
                    at: now,
                };
                if next == ConsumerStatus::Dead {
                    warn!(consumer = %record.id, missed, "Consumer declared dead");
                } else {
                    info!(consumer = %record.id, missed, to = %next, "Consumer status changed");
                }
                record.status = next;
                report.status_changes.push(change);
            }

            if record.status == ConsumerStatus::Dead {
                let id = record.id.clone();
                orphans.extend(record.detach_work().into_iter().map(|e| (id.clone(), e)));
                continue;
            }

            let timeout = self.config.processing_timeout_ms;
            let mut stale: Vec<EventId> = record
                .in_flight
                .iter()
                .filter(|(_, f)| now.saturating_sub(f.claimed_at) >= timeout)
                .map(|(id, _)| *id)
                .collect();
            stale.sort();
            for event_id in stale {
                if let Some(f) = record.in_flight.remove(&event_id) {
                    expired.push(f.event);
                }
            }
        }

        for (from, event) in orphans {
            let event_id = event.id;
            match self.redeliver(event, &from) {
                Ok(to) => {
                    info!(event_id = %event_id, from = %from, to = %to, "Event redelivered");
                    report.redelivered.push(Redelivery { event_id, from, to });
                }
                Err(event) => {
                    self.dead_letter(event, REASON_CONSUMER_DEAD);
                    report.dead_lettered.push(event_id);
                }
            }
        }

        for event in expired {
            let event_id = event.id;
            let outcome = self.retry_or_dead_letter(event, REASON_PROCESSING_TIMEOUT);
            if matches!(outcome, RetryOutcome::DeadLettered { .. }) {
                report.dead_lettered.push(event_id);
            }
            report.timed_out.push((event_id, outcome));
        }

        report.dead_letter_count = self.dead_letters.len();
        report
    }

    /// Stop handing out new work; in-flight events may still be acked.
    pub fn begin_drain(&self, id: &str) -> StreamingResult<ConsumerState> {
        let record = self.record(id)?;
        let mut record = record.lock();
        if record.status == ConsumerStatus::Dead {
            return Err(StreamingError::ConsumerDead(id.to_string()));
        }
        record.status = ConsumerStatus::Draining;
        info!(consumer = id, in_flight = record.in_flight.len(), "Consumer draining");
        Ok(record.state())
    }

    /// Remove a consumer. Unacknowledged work goes to another live
    /// subscriber, or back to the head of its partition.
    pub fn deregister(&self, id: &str) -> StreamingResult<DeregisterReport> {
        let (_, record) = self
            .consumers
            .remove(id)
            .ok_or_else(|| StreamingError::UnknownConsumer(id.to_string()))?;
        let work = record.lock().detach_work();

        let mut report = DeregisterReport {
            consumer: id.to_string(),
            ..Default::default()
        };
        for event in work {
            let event_id = event.id;
            match self.redeliver(event, id) {
                Ok(to) => report.redelivered.push(Redelivery {
                    event_id,
                    from: id.to_string(),
                    to,
                }),
                Err(event) => {
                    if let Some(partition) = self.partitions.partition(event.partition) {
                        partition.requeue_front(event);
                        report.returned_to_partition.push(event_id);
                    }
                }
            }
        }
        info!(
            consumer = id,
            redelivered = report.redelivered.len(),
            returned = report.returned_to_partition.len(),
            "Consumer deregistered"
        );
        Ok(report)
    }

    /// Re-publish a dead letter into its original partition.
    ///
    /// The entry is removed only on success: an exhausted replay budget or a
    /// full partition leaves it in the store.
    pub fn replay(&self, event_id: EventId) -> StreamingResult<Ack> {
        let entry = self
            .dead_letters
            .take(event_id)
            .ok_or(StreamingError::DeadLetterNotFound(event_id))?;

        if entry.replay_count >= self.config.max_replays {
            let replays = entry.replay_count;
            self.dead_letters.insert(entry);
            return Err(StreamingError::DeadLetterExhausted { event_id, replays });
        }

        let mut event = entry.event.clone();
        event.retry_count = 0;
        event.replays = entry.replay_count + 1;
        match self.partitions.republish(event) {
            Ok(ack) => {
                info!(event_id = %event_id, partition = ack.partition, "Dead letter replayed");
                Ok(ack)
            }
            Err(err) => {
                self.dead_letters.insert(entry);
                Err(err)
            }
        }
    }

    pub fn consumer(&self, id: &str) -> Option<ConsumerState> {
        self.consumers.get(id).map(|r| r.value().lock().state())
    }

    /// Every consumer, sorted by id.
    pub fn consumers(&self) -> Vec<ConsumerState> {
        self.records().iter().map(|r| r.lock().state()).collect()
    }

    pub fn live_count(&self) -> usize {
        self.consumers()
            .iter()
            .filter(|c| c.status != ConsumerStatus::Dead)
            .count()
    }
}
