//! # Concurrency Invariants
//!
//! Parallel callers against one `ControlPlane`:
//!
//! - a partition never admits more than its capacity
//! - one credential yields one live identity
//! - a breaker opens exactly once under a failure storm
//! - audit sequence ids stay dense and strictly increasing
//! - policy swaps are atomic for concurrent evaluators

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use control_runtime::container::ControlPlaneConfig;
    use cp_03_policy_engine::{PolicyDefinition, PolicyOutcome};
    use cp_04_circuit_breaker::CircuitState;
    use cp_05_event_streaming::EventPayload;
    use serde_json::json;
    use shared_bus::{AlertQuery, AlertType, AuditEventKind};
    use shared_types::ControlPlaneError;

    use crate::integration::{control_plane, T0};

    const TASKS: usize = 16;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publishers_respect_capacity() {
        let mut config = ControlPlaneConfig::default();
        config.streaming.regions = vec!["mombasa".to_string()];
        config.streaming.partitions_per_region = 1;
        config.streaming.partition_capacity = 50;
        let (plane, _) = control_plane(config);

        let handles: Vec<_> = (0..TASKS)
            .map(|t| {
                let plane = Arc::clone(&plane);
                tokio::spawn(async move {
                    let mut acks = 0usize;
                    let mut overloads = 0usize;
                    for n in 0..10 {
                        let payload =
                            EventPayload::new("transaction.held", format!("{t}-{n}"), json!({}));
                        match plane.publish_event("mombasa", payload) {
                            Ok(_) => acks += 1,
                            Err(ControlPlaneError::PartitionOverloaded { .. }) => overloads += 1,
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                    (acks, overloads)
                })
            })
            .collect();

        let mut acks = 0;
        let mut overloads = 0;
        for handle in handles {
            let (a, o) = handle.await.unwrap();
            acks += a;
            overloads += o;
        }

        assert_eq!(acks, 50);
        assert_eq!(overloads, TASKS * 10 - 50);
        assert_eq!(plane.metrics_snapshot().total_partition_load, 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_issue_yields_one_identity() {
        let (plane, _) = control_plane(ControlPlaneConfig::default());

        let handles: Vec<_> = (0..TASKS)
            .map(|_| {
                let plane = Arc::clone(&plane);
                tokio::spawn(async move { plane.issue_identity("+254 712 345 678", "nairobi").unwrap() })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().id);
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(plane.audit_log().count_kind(AuditEventKind::IdentityIssued), 1);
        assert_eq!(plane.metrics_snapshot().identities.active, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failure_storm_opens_breaker_once() {
        let (plane, _) = control_plane(ControlPlaneConfig::default());

        let handles: Vec<_> = (0..TASKS)
            .map(|_| {
                let plane = Arc::clone(&plane);
                tokio::spawn(async move {
                    for _ in 0..5 {
                        plane.record_service_call("payments-service", false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let state = plane.circuit_state("payments-service");
        assert_eq!(state.state, CircuitState::Open);
        // Failures reported while open within the timeout are ignored.
        assert_eq!(state.failure_count, state.threshold);

        let opened: Vec<_> = plane
            .query_alerts(&AlertQuery::all())
            .into_iter()
            .filter(|a| a.alert_type == AlertType::CircuitOpened)
            .collect();
        assert_eq!(opened.len(), 1);
        assert_eq!(plane.audit_log().count_kind(AuditEventKind::CircuitTransition), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn audit_sequence_is_dense_under_load() {
        let (plane, _) = control_plane(ControlPlaneConfig::default());

        let handles: Vec<_> = (0..TASKS)
            .map(|t| {
                let plane = Arc::clone(&plane);
                tokio::spawn(async move {
                    let credential = format!("2547000000{t:02}");
                    for _ in 0..5 {
                        plane.simulate_flow(&credential, "nakuru", 2_000).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let entries = plane.audit_log().entries();
        // One issue per credential plus one decision per flow.
        assert_eq!(entries.len(), TASKS + TASKS * 5);
        for (index, entry) in entries.iter().enumerate() {
            assert_eq!(entry.sequence_id, index as u64 + 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn policy_swap_is_atomic_for_evaluators() {
        let (plane, _) = control_plane(ControlPlaneConfig::default());
        let identity = plane.issue_identity("254712345678", "eldoret").unwrap();

        let evaluators: Vec<_> = (0..TASKS)
            .map(|_| {
                let plane = Arc::clone(&plane);
                let id = identity.id;
                tokio::spawn(async move {
                    let mut outcomes = Vec::new();
                    for _ in 0..50 {
                        let decision = plane.evaluate(&id, 100, "eldoret", T0).unwrap();
                        outcomes.push((decision.outcome, decision.matched_policy));
                        tokio::task::yield_now().await;
                    }
                    outcomes
                })
            })
            .collect();

        let toggler = {
            let plane = Arc::clone(&plane);
            tokio::spawn(async move {
                plane
                    .add_policy(PolicyDefinition::new(
                        "deny-eldoret",
                        1_000,
                        PolicyOutcome::Deny,
                        "region == eldoret",
                    ))
                    .unwrap();
                for n in 0..20 {
                    plane.toggle_policy("deny-eldoret", n % 2 == 1).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        toggler.await.unwrap();
        for handle in evaluators {
            for (outcome, matched) in handle.await.unwrap() {
                // Either the rule is fully installed or not at all.
                match outcome {
                    PolicyOutcome::Deny => assert_eq!(matched.as_deref(), Some("deny-eldoret")),
                    _ => assert_ne!(matched.as_deref(), Some("deny-eldoret")),
                }
            }
        }
    }
}
