//! Event Partition Manager
//!
//! Partitions are laid out once from configuration: region `r` at index `i`
//! owns partitions `i * fan_out .. (i + 1) * fan_out`. Publishing picks one
//! of the region's partitions by FNV-1a hash of the event key.
//!
//! Each partition guards its queue and load with its own mutex. `load`
//! counts queued plus claimed (in-flight) events and only drops when an
//! event is acknowledged or dead-lettered, so `load <= capacity` bounds all
//! work the partition is responsible for.

use crate::domain::config::StreamingConfig;
use crate::domain::consumer::subscribes_to;
use crate::domain::event::{hash_partition_key, Ack, EventId, EventPayload, PartitionId, StreamEvent};
use crate::error::{StreamingConfigError, StreamingError, StreamingResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::{Region, TimeSource};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStatus {
    Accepting,
    Saturated,
}

/// Read-only view of a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    pub id: PartitionId,
    pub region: Region,
    pub capacity: usize,
    pub current_load: usize,
    pub queued: usize,
    pub status: PartitionStatus,
    pub published_total: u64,
    pub rejected_total: u64,
}

#[derive(Debug, Default)]
struct PartitionInner {
    queue: VecDeque<StreamEvent>,
    load: usize,
    published_total: u64,
    rejected_total: u64,
}

#[derive(Debug)]
pub struct Partition {
    id: PartitionId,
    region: Region,
    capacity: usize,
    inner: Mutex<PartitionInner>,
}

impl Partition {
    pub fn new(id: PartitionId, region: Region, capacity: usize) -> Self {
        Self {
            id,
            region,
            capacity,
            inner: Mutex::new(PartitionInner::default()),
        }
    }

    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append at the tail, taking one unit of load. Rejects without touching
    /// queue or load when full.
    pub(crate) fn try_enqueue(&self, event: StreamEvent) -> StreamingResult<usize> {
        self.try_enqueue_with(|| event).map(|(_, position)| position)
    }

    /// [`try_enqueue`](Self::try_enqueue) for an event built only once
    /// capacity is secured. `make` runs under the partition lock.
    pub(crate) fn try_enqueue_with(
        &self,
        make: impl FnOnce() -> StreamEvent,
    ) -> StreamingResult<(EventId, usize)> {
        let mut inner = self.inner.lock();
        if inner.load + 1 > self.capacity {
            inner.rejected_total += 1;
            return Err(StreamingError::PartitionOverloaded {
                partition: self.id,
                capacity: self.capacity,
            });
        }
        let event = make();
        let event_id = event.id;
        inner.load += 1;
        inner.published_total += 1;
        inner.queue.push_back(event);
        Ok((event_id, inner.queue.len()))
    }

    /// Put an already-counted event back at the head (retry or handback).
    pub(crate) fn requeue_front(&self, event: StreamEvent) {
        self.inner.lock().queue.push_front(event);
    }

    /// Pop the oldest event of a subscribed type. Load is unchanged: the
    /// event moves from queued to in flight.
    pub(crate) fn pop_matching(&self, subscriptions: &[String]) -> Option<StreamEvent> {
        let mut inner = self.inner.lock();
        let index = inner
            .queue
            .iter()
            .position(|event| subscribes_to(subscriptions, &event.event_type))?;
        inner.queue.remove(index)
    }

    /// Release one unit of load after an ack or dead-letter.
    pub(crate) fn release(&self) {
        let mut inner = self.inner.lock();
        inner.load = inner.load.saturating_sub(1);
    }

    pub fn current_load(&self) -> usize {
        self.inner.lock().load
    }

    pub fn snapshot(&self) -> PartitionSnapshot {
        let inner = self.inner.lock();
        PartitionSnapshot {
            id: self.id,
            region: self.region.clone(),
            capacity: self.capacity,
            current_load: inner.load,
            queued: inner.queue.len(),
            status: if inner.load >= self.capacity {
                PartitionStatus::Saturated
            } else {
                PartitionStatus::Accepting
            },
            published_total: inner.published_total,
            rejected_total: inner.rejected_total,
        }
    }
}

/// Owns every partition and routes publishes.
pub struct EventPartitionManager {
    partitions: Vec<Arc<Partition>>,
    by_region: HashMap<Region, Vec<PartitionId>>,
    next_event_id: AtomicU64,
    clock: Arc<dyn TimeSource>,
}

impl EventPartitionManager {
    pub fn new(config: &StreamingConfig, clock: Arc<dyn TimeSource>) -> Result<Self, StreamingConfigError> {
        config.validate()?;

        let mut partitions = Vec::new();
        let mut by_region = HashMap::new();
        for region in config.regions.iter().map(Region::new) {
            let ids: Vec<PartitionId> = (0..config.partitions_per_region)
                .map(|_| {
                    let id = partitions.len() as PartitionId;
                    partitions.push(Arc::new(Partition::new(
                        id,
                        region.clone(),
                        config.partition_capacity,
                    )));
                    id
                })
                .collect();
            by_region.insert(region, ids);
        }

        Ok(Self {
            partitions,
            by_region,
            next_event_id: AtomicU64::new(1),
            clock,
        })
    }

    /// Partition that `key` routes to within `region`.
    pub fn route(&self, region: &Region, key: &str) -> StreamingResult<PartitionId> {
        let ids = self
            .by_region
            .get(region)
            .ok_or_else(|| StreamingError::UnknownRegion(region.to_string()))?;
        let slot = (hash_partition_key(key) % ids.len() as u64) as usize;
        Ok(ids[slot])
    }

    /// Enqueue into the region's partition for `payload.key`, or fail fast
    /// with `PartitionOverloaded`.
    ///
    /// Event ids are drawn only for accepted events, so across the manager
    /// they are dense: a rejected publish consumes no id.
    pub fn publish(&self, region: &str, payload: EventPayload) -> StreamingResult<Ack> {
        let region = Region::new(region);
        let partition_id = self.route(&region, &payload.key)?;
        let partition = &self.partitions[partition_id as usize];

        let published = partition.try_enqueue_with(|| StreamEvent {
            id: EventId(self.next_event_id.fetch_add(1, Ordering::Relaxed)),
            event_type: payload.event_type,
            key: payload.key,
            region,
            partition: partition_id,
            body: payload.body,
            published_at: self.clock.now(),
            retry_count: 0,
            replays: 0,
        });

        match published {
            Ok((event_id, position)) => {
                debug!(partition = partition_id, event_id = %event_id, position, "Event published");
                Ok(Ack {
                    event_id,
                    partition: partition_id,
                    position,
                })
            }
            Err(err) => {
                warn!(
                    partition = partition_id,
                    capacity = partition.capacity(),
                    "Partition overloaded, publish rejected"
                );
                Err(err)
            }
        }
    }

    /// Re-enqueue an existing event into its original partition.
    pub(crate) fn republish(&self, event: StreamEvent) -> StreamingResult<Ack> {
        let partition_id = event.partition;
        let event_id = event.id;
        let partition = self
            .partition(partition_id)
            .ok_or_else(|| StreamingError::UnknownRegion(event.region.to_string()))?;
        let position = partition.try_enqueue(event)?;
        Ok(Ack {
            event_id,
            partition: partition_id,
            position,
        })
    }

    pub fn partition(&self, id: PartitionId) -> Option<&Arc<Partition>> {
        self.partitions.get(id as usize)
    }

    pub fn partitions(&self) -> &[Arc<Partition>] {
        &self.partitions
    }

    pub fn partitions_for(&self, region: &Region) -> &[PartitionId] {
        self.by_region.get(region).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.by_region.keys()
    }

    pub fn snapshot(&self) -> Vec<PartitionSnapshot> {
        self.partitions.iter().map(|p| p.snapshot()).collect()
    }

    pub fn total_load(&self) -> usize {
        self.partitions.iter().map(|p| p.current_load()).sum()
    }
}
