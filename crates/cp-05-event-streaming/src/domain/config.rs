//! Streaming configuration

use crate::error::StreamingConfigError;
use serde::{Deserialize, Serialize};
use shared_types::Region;
use std::collections::HashSet;

/// Consumer liveness and retry policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Expected heartbeat period (ms)
    pub heartbeat_interval_ms: u64,
    /// Missed windows after which a consumer is declared dead
    pub missed_heartbeats_before_dead: u32,
    /// Claimed events not acknowledged within this window are retried (ms)
    pub processing_timeout_ms: u64,
    /// Failed attempts before an event is dead-lettered
    pub max_retries: u32,
    /// Replays allowed out of the dead-letter store per event
    pub max_replays: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 10_000,
            missed_heartbeats_before_dead: 3,
            processing_timeout_ms: 30_000,
            max_retries: 3,
            max_replays: 3,
        }
    }
}

/// Partition layout and consumer policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Regions that own partitions
    pub regions: Vec<String>,
    /// Partitions per region (hash fan-out)
    pub partitions_per_region: u32,
    /// Maximum queued + in-flight events per partition
    pub partition_capacity: usize,
    pub supervisor: SupervisorConfig,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            regions: Region::catalog().map(|r| r.as_str().to_string()).collect(),
            partitions_per_region: 2,
            partition_capacity: 1_000,
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl StreamingConfig {
    pub fn validate(&self) -> Result<(), StreamingConfigError> {
        if self.regions.is_empty() {
            return Err(StreamingConfigError::NoRegions);
        }
        let mut seen = HashSet::new();
        for region in &self.regions {
            let region = Region::new(region);
            if region.is_empty() {
                return Err(StreamingConfigError::NoRegions);
            }
            if !seen.insert(region.clone()) {
                return Err(StreamingConfigError::DuplicateRegion(region.to_string()));
            }
        }

        let checks = [
            ("partitions_per_region", u64::from(self.partitions_per_region)),
            ("partition_capacity", self.partition_capacity as u64),
            ("heartbeat_interval_ms", self.supervisor.heartbeat_interval_ms),
            (
                "missed_heartbeats_before_dead",
                u64::from(self.supervisor.missed_heartbeats_before_dead),
            ),
            ("processing_timeout_ms", self.supervisor.processing_timeout_ms),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(StreamingConfigError::Zero { field });
            }
        }
        Ok(())
    }
}
