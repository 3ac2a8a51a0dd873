//! # Acceptance Scenarios
//!
//! 1. Issued identities expire strictly after issuance
//! 2. Breaker: five failures open it; rejection leaves the count alone;
//!    timeout plus one success closes it
//! 3. Partition load never exceeds capacity; rejection does not mutate
//! 4. Evaluation is deterministic for identical inputs
//! 5. A fresh basic identity with a small transfer is allowed
//! 6. The sixth call to a tripped service is rejected
//! 7. Capacity 8, ten publishes: eight acks, two overloads
//! 8. A consumer silent for three windows is dead and its work moves on

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use control_runtime::container::ControlPlaneConfig;
    use cp_01_identity::{IdentityApi, IdentityConfig, IdentityIssuer, IdentityStore};
    use cp_02_fraud_scoring::{FraudConfig, FraudScorer};
    use cp_03_policy_engine::{baseline_policies, PolicyDefinition, PolicyEngine, PolicyOutcome};
    use cp_04_circuit_breaker::{
        CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry, CircuitState,
    };
    use cp_05_event_streaming::{
        ConsumerStatus, ConsumerSupervisor, DeadLetterStore, EventPartitionManager, EventPayload,
        StreamingConfig, StreamingError, SupervisorConfig,
    };
    use proptest::prelude::*;
    use serde_json::json;
    use shared_types::{
        ControlPlaneError, ManualTimeSource, Region, RiskClassification, Tier, Transaction,
        MILLIS_PER_HOUR,
    };

    use crate::integration::{control_plane, T0};

    fn one_partition(capacity: usize) -> ControlPlaneConfig {
        let mut config = ControlPlaneConfig::default();
        config.streaming.regions = vec!["nairobi".to_string()];
        config.streaming.partitions_per_region = 1;
        config.streaming.partition_capacity = capacity;
        config
    }

    fn payload(n: u64) -> EventPayload {
        EventPayload::new("transaction.authorized", format!("key-{n}"), json!({ "n": n }))
    }

    // =========================================================================
    // 1. IDENTITY LIFETIME
    // =========================================================================

    #[test]
    fn scenario_1_identity_expires_after_issue() {
        for lifetime_secs in [1, 60, 24 * 60 * 60] {
            let issuer = IdentityIssuer::new(
                IdentityConfig {
                    lifetime_secs,
                    ..Default::default()
                },
                Arc::new(IdentityStore::new()),
                Arc::new(ManualTimeSource::new(T0)),
            );
            let identity = issuer.issue("254712345678", "nairobi").unwrap().identity;
            assert!(identity.expires_at > identity.issued_at);
            assert_eq!(identity.expires_at - identity.issued_at, lifetime_secs * 1_000);
        }
    }

    #[test]
    fn scenario_1_expired_identity_is_reissued() {
        let (plane, clock) = control_plane(ControlPlaneConfig::default());
        let first = plane.issue_identity("254712345678", "nairobi").unwrap();
        clock.set(first.expires_at);

        assert!(matches!(
            plane.evaluate(&first.id, 100, "nairobi", first.expires_at),
            Err(ControlPlaneError::IdentityExpired { .. })
        ));
        let second = plane.issue_identity("254712345678", "nairobi").unwrap();
        assert_ne!(first.id, second.id);
        assert!(second.issued_at >= first.expires_at);
    }

    // =========================================================================
    // 2 + 6. CIRCUIT BREAKER
    // =========================================================================

    #[test]
    fn scenario_2_breaker_lifecycle() {
        let clock = Arc::new(ManualTimeSource::new(T0));
        let registry = CircuitBreakerRegistry::new(
            CircuitBreakerConfig {
                failure_threshold: 5,
                reset_timeout_ms: 30_000,
                ..Default::default()
            },
            clock.clone(),
        )
        .unwrap();

        for _ in 0..5 {
            registry.try_acquire("ledger").unwrap();
            registry.record_failure("ledger");
        }
        assert_eq!(registry.state("ledger").state, CircuitState::Open);

        assert!(matches!(
            registry.try_acquire("ledger"),
            Err(CircuitBreakerError::CircuitOpen { .. })
        ));
        assert_eq!(registry.state("ledger").failure_count, 5);

        clock.advance(30_000);
        registry.try_acquire("ledger").unwrap();
        assert_eq!(registry.state("ledger").state, CircuitState::HalfOpen);
        // Only the probe is admitted while half-open.
        assert!(registry.try_acquire("ledger").is_err());

        registry.record_success("ledger");
        let state = registry.state("ledger");
        assert_eq!(state.state, CircuitState::Closed);
        assert_eq!(state.failure_count, 0);
    }

    #[test]
    fn scenario_6_sixth_payment_attempt_rejected() {
        let (plane, _) = control_plane(ControlPlaneConfig::default());
        for _ in 0..5 {
            plane.record_service_call("payments-service", false);
        }
        assert_eq!(plane.circuit_state("payments-service").state, CircuitState::Open);

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let sixth = runtime.block_on(
            plane.call_service("payments-service", || async { Ok::<_, String>(()) }),
        );
        assert!(sixth.is_err());

        let state = plane.circuit_state("payments-service");
        assert_eq!(state.failure_count, 5);
        assert_eq!(state.total_rejections, 1);
    }

    // =========================================================================
    // 3 + 7. PARTITION BACKPRESSURE
    // =========================================================================

    #[test]
    fn scenario_7_capacity_eight_ten_publishes() {
        let (plane, _) = control_plane(one_partition(8));

        let results: Vec<_> = (0..10).map(|n| plane.publish_event("nairobi", payload(n))).collect();
        let acks = results.iter().filter(|r| r.is_ok()).count();
        let overloads = results
            .iter()
            .filter(|r| matches!(r, Err(ControlPlaneError::PartitionOverloaded { capacity: 8, .. })))
            .count();

        assert_eq!(acks, 8);
        assert_eq!(overloads, 2);
        assert_eq!(plane.metrics_snapshot().total_partition_load, 8);

        // Positions are 1-based queue depths.
        let positions: Vec<_> = results.iter().flatten().map(|ack| ack.position).collect();
        assert_eq!(positions, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn scenario_3_unknown_region_is_not_found() {
        let (plane, _) = control_plane(one_partition(8));
        assert!(matches!(
            plane.publish_event("atlantis", payload(0)),
            Err(ControlPlaneError::NotFound { .. })
        ));
    }

    proptest! {
        #[test]
        fn scenario_3_load_never_exceeds_capacity(
            capacity in 1usize..32,
            ops in proptest::collection::vec(any::<bool>(), 1..128),
        ) {
            let clock = Arc::new(ManualTimeSource::new(T0));
            let mut config = StreamingConfig::default();
            config.regions = vec!["nairobi".to_string()];
            config.partitions_per_region = 1;
            config.partition_capacity = capacity;
            let manager = Arc::new(EventPartitionManager::new(&config, clock.clone()).unwrap());
            let supervisor = ConsumerSupervisor::new(
                SupervisorConfig::default(),
                Arc::clone(&manager),
                Arc::new(DeadLetterStore::new()),
                clock,
            );
            supervisor.register("drain", vec!["*".to_string()]);

            for (n, publish) in ops.into_iter().enumerate() {
                let before = manager.total_load();
                if publish {
                    match manager.publish("nairobi", payload(n as u64)) {
                        Ok(_) => prop_assert_eq!(manager.total_load(), before + 1),
                        Err(StreamingError::PartitionOverloaded { .. }) => {
                            prop_assert_eq!(before, capacity);
                            prop_assert_eq!(manager.total_load(), before);
                        }
                        Err(other) => prop_assert!(false, "unexpected error {}", other),
                    }
                } else if let Some(event) = supervisor.claim("drain").unwrap() {
                    // Claimed events still count until acknowledged.
                    prop_assert_eq!(manager.total_load(), before);
                    supervisor.ack("drain", event.id).unwrap();
                    prop_assert_eq!(manager.total_load(), before - 1);
                }
                prop_assert!(manager.total_load() <= capacity);
            }
        }
    }

    // =========================================================================
    // 4 + 5. AUTHORIZATION
    // =========================================================================

    #[test]
    fn scenario_4_evaluation_is_deterministic() {
        let issuer = IdentityIssuer::new(
            IdentityConfig::default(),
            Arc::new(IdentityStore::new()),
            Arc::new(ManualTimeSource::new(T0)),
        );
        let identity = issuer.issue("254712345678", "nairobi").unwrap().identity;
        let scorer = FraudScorer::new(FraudConfig::default()).unwrap();
        let engine = PolicyEngine::with_policies(baseline_policies()).unwrap();

        let history = vec![Transaction::in_region(identity.id, 4_000, Region::new("nairobi"), T0 + 1)];
        let tx = Transaction::in_region(
            identity.id,
            2_500_000,
            Region::new("mombasa"),
            T0 + MILLIS_PER_HOUR,
        );

        let first = scorer.score(&identity, &tx, &history);
        let decision = engine.evaluate(&identity, &tx, first.value);
        for _ in 0..10 {
            let score = scorer.score(&identity, &tx, &history);
            assert_eq!(score, first);
            assert_eq!(engine.evaluate(&identity, &tx, score.value), decision);
        }
    }

    #[test]
    fn scenario_4_fresh_planes_agree() {
        let decide = || {
            let (plane, _) = control_plane(ControlPlaneConfig::default());
            let identity = plane.issue_identity("254700111222", "kisumu").unwrap();
            plane.evaluate(&identity.id, 1_500_000, "kisumu", T0).unwrap()
        };
        assert_eq!(decide(), decide());
    }

    #[test]
    fn scenario_4_repeated_evaluate_on_one_plane_agrees() {
        let (plane, _) = control_plane(ControlPlaneConfig::default());
        plane
            .add_policy(PolicyDefinition::new("deny-medium-score", 500, PolicyOutcome::Deny, "score >= 40"))
            .unwrap();
        let identity = plane.issue_identity("254712345678", "nairobi").unwrap();

        let first = plane.assess(&identity.id, 5_000, "nairobi", T0).unwrap();
        assert_eq!(first.decision.outcome, PolicyOutcome::Deny);
        for _ in 0..5 {
            let again = plane.assess(&identity.id, 5_000, "nairobi", T0).unwrap();
            assert_eq!(again.score, first.score);
            assert_eq!(again.decision, first.decision);
        }
    }

    #[test]
    fn scenario_5_basic_identity_small_transfer_allowed() {
        let (plane, _) = control_plane(ControlPlaneConfig::default());
        let trace = plane.simulate_flow("254712345678", "nairobi", 5_000).unwrap();

        assert_eq!(trace.identity.tier, Tier::Basic);
        assert!(matches!(
            trace.assessment.classification,
            RiskClassification::Low | RiskClassification::Medium
        ));
        assert_eq!(trace.assessment.decision.outcome, PolicyOutcome::Allow);
        assert!(trace.published.is_some());
    }

    // =========================================================================
    // 8. CONSUMER SUPERVISION
    // =========================================================================

    #[test]
    fn scenario_8_dead_consumer_work_is_redelivered() {
        let (plane, clock) = control_plane(one_partition(16));
        let interval = plane.config().streaming.supervisor.heartbeat_interval_ms;
        plane.register_consumer("primary", vec!["transaction.authorized".to_string()]);
        plane.register_consumer("standby", vec!["*".to_string()]);

        plane.publish_event("nairobi", payload(1)).unwrap();
        let event = plane.claim("primary").unwrap().unwrap();

        for window in 1..=3 {
            clock.advance(interval);
            plane.heartbeat("standby").unwrap();
            let report = plane.supervise();
            let primary = plane.consumers().into_iter().find(|c| c.id == "primary").unwrap();
            match window {
                1 | 2 => assert_eq!(primary.status, ConsumerStatus::Degraded),
                _ => {
                    assert_eq!(primary.status, ConsumerStatus::Dead);
                    assert_eq!(report.redelivered.len(), 1);
                    assert_eq!(report.redelivered[0].to, "standby");
                }
            }
        }

        let redelivered = plane.claim("standby").unwrap().unwrap();
        assert_eq!(redelivered.id, event.id);
        plane.ack("standby", redelivered.id).unwrap();
        assert_eq!(plane.metrics_snapshot().total_partition_load, 0);
        assert!(plane.dead_letters().is_empty());
    }

    #[test]
    fn scenario_8_dead_consumer_without_peer_dead_letters() {
        let (plane, clock) = control_plane(one_partition(16));
        let interval = plane.config().streaming.supervisor.heartbeat_interval_ms;
        plane.register_consumer("solo", vec!["*".to_string()]);
        plane.publish_event("nairobi", payload(1)).unwrap();
        let event = plane.claim("solo").unwrap().unwrap();

        clock.advance(3 * interval);
        let report = plane.supervise();

        assert_eq!(report.dead_lettered, vec![event.id]);
        let letters = plane.dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].reason, "consumer-dead");
        assert_eq!(plane.metrics_snapshot().total_partition_load, 0);
        assert!(matches!(
            plane.claim("solo"),
            Err(ControlPlaneError::NotFound { kind: "live consumer", .. })
        ));
    }
}
