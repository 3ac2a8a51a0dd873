//! End-to-end flows through the `ControlPlane` interface.

use std::sync::Arc;

use control_runtime::container::{ControlPlane, ControlPlaneConfig};
use cp_03_policy_engine::{PolicyDefinition, PolicyOutcome};
use cp_04_circuit_breaker::{CallError, CircuitState};
use cp_05_event_streaming::{ConsumerStatus, EventPayload, RetryOutcome};
use serde_json::json;
use shared_bus::{AlertQuery, AlertType, AuditEventKind};
use shared_types::{ControlPlaneError, ManualTimeSource, RiskClassification, Severity, Tier};

const T0: u64 = 1_700_000_000_000;

fn plane_with(config: ControlPlaneConfig) -> (ControlPlane, Arc<ManualTimeSource>) {
    let clock = Arc::new(ManualTimeSource::new(T0));
    (ControlPlane::new(config, clock.clone()).unwrap(), clock)
}

fn plane() -> (ControlPlane, Arc<ManualTimeSource>) {
    plane_with(ControlPlaneConfig::default())
}

#[test]
fn simulate_flow_publishes_authorized_event() {
    let (plane, _) = plane();
    let trace = plane.simulate_flow("254712345678", "nairobi", 5_000).unwrap();

    assert!(trace.issued);
    assert_eq!(trace.identity.tier, Tier::Basic);
    assert!(trace.identity.expires_at > trace.identity.issued_at);
    assert!(matches!(
        trace.assessment.classification,
        RiskClassification::Low | RiskClassification::Medium
    ));
    assert_eq!(trace.assessment.decision.outcome, PolicyOutcome::Allow);
    assert_eq!(trace.event_type, "transaction.authorized");
    assert!(trace.published.is_some());
    assert!(trace.rejection.is_none());

    // issued + decision
    let (first, last) = trace.audit_range;
    let kinds: Vec<_> = plane.audit_log().since(first - 1).into_iter().map(|e| e.event_kind).collect();
    assert_eq!(kinds, vec![AuditEventKind::IdentityIssued, AuditEventKind::PolicyDecision]);
    assert_eq!(last, first + 1);
}

#[test]
fn second_flow_reuses_identity() {
    let (plane, _) = plane();
    let first = plane.simulate_flow("254712345678", "nairobi", 5_000).unwrap();
    let second = plane.simulate_flow("254712345678", "nairobi", 5_000).unwrap();
    assert!(!second.issued);
    assert_eq!(first.identity.id, second.identity.id);
}

#[test]
fn full_partition_is_reported_in_trace() {
    let mut config = ControlPlaneConfig::default();
    config.streaming.partitions_per_region = 1;
    config.streaming.partition_capacity = 1;
    let (plane, _) = plane_with(config);

    assert!(plane.simulate_flow("254700000001", "kisumu", 1_000).unwrap().published.is_some());
    let trace = plane.simulate_flow("254700000002", "kisumu", 1_000).unwrap();
    assert!(trace.published.is_none());
    assert!(trace.rejection.is_some());

    let alerts = plane.query_alerts(&AlertQuery::all());
    assert!(alerts.iter().any(|a| a.alert_type == AlertType::PartitionOverloaded
        && a.severity == Severity::Warning
        && a.subject_ref.starts_with("partition-")));
    assert_eq!(plane.audit_log().count_kind(AuditEventKind::PartitionOverloaded), 1);
}

#[test]
fn deny_policy_raises_high_alert() {
    let (plane, _) = plane();
    plane
        .add_policy(PolicyDefinition::new("deny-kisumu", 500, PolicyOutcome::Deny, "region == kisumu"))
        .unwrap();
    let identity = plane.issue_identity("254712345678", "kisumu").unwrap();

    let decision = plane.evaluate(&identity.id, 100, "kisumu", T0).unwrap();
    assert_eq!(decision.outcome, PolicyOutcome::Deny);
    assert_eq!(decision.matched_policy.as_deref(), Some("deny-kisumu"));

    let high = plane.query_alerts(&AlertQuery::open_at_least(Severity::High));
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].alert_type, AlertType::TransactionDenied);
    assert!(!high[0].message.localized.is_empty());
}

#[test]
fn bad_policy_reload_keeps_current_set() {
    let (plane, _) = plane();
    let before = plane.list_policies();

    let err = plane
        .reload_policies(
            r#"
            [[policies]]
            name = "broken"
            priority = 1
            outcome = "deny"
            rule = "amount >"
            "#,
        )
        .unwrap_err();
    assert!(matches!(err, ControlPlaneError::PolicyParseError { .. }));
    assert_eq!(plane.list_policies(), before);

    let version = plane
        .reload_policies(
            r#"
            [[policies]]
            name = "deny-huge"
            priority = 10
            outcome = "deny"
            rule = "amount > 10000000"
            "#,
        )
        .unwrap();
    assert_eq!(plane.list_policies().len(), 1);
    assert_eq!(plane.metrics_snapshot().policies.version, version);
}

#[tokio::test]
async fn breaker_opens_and_recovers_through_call_service() {
    let (plane, clock) = plane();
    for _ in 0..5 {
        let result: Result<(), CallError<&str>> =
            plane.call_service("payments-service", || async { Err("timeout") }).await;
        assert!(matches!(result, Err(CallError::Inner("timeout"))));
    }
    assert_eq!(plane.circuit_state("payments-service").state, CircuitState::Open);

    let rejected: Result<(), CallError<&str>> =
        plane.call_service("payments-service", || async { Ok(()) }).await;
    assert!(matches!(rejected, Err(CallError::CircuitOpen { .. })));
    assert_eq!(plane.circuit_state("payments-service").failure_count, 5);

    let opened = plane.query_alerts(&AlertQuery::all());
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].alert_type, AlertType::CircuitOpened);

    clock.advance(plane.config().circuit_breaker.reset_timeout_ms);
    let probe: Result<u32, CallError<&str>> =
        plane.call_service("payments-service", || async { Ok(7) }).await;
    assert_eq!(probe.unwrap(), 7);
    assert_eq!(plane.circuit_state("payments-service").state, CircuitState::Closed);
    assert_eq!(plane.metrics_snapshot().open_circuits, 0);
}

#[test]
fn dead_letter_watermark_alerts_once_per_crossing() {
    let mut config = ControlPlaneConfig::default();
    config.streaming.supervisor.max_retries = 0;
    config.alerts.dead_letter_watermark = 2;
    let (plane, _) = plane_with(config);
    plane.register_consumer("worker", vec!["*".to_string()]);

    for n in 0..3 {
        plane
            .publish_event("nairobi", EventPayload::new("transaction.held", format!("k{n}"), json!({})))
            .unwrap();
    }
    for _ in 0..3 {
        let event = plane.claim("worker").unwrap().unwrap();
        let outcome = plane.nack("worker", event.id, "schema mismatch").unwrap();
        assert!(matches!(outcome, RetryOutcome::DeadLettered { retry_count: 0 }));
    }

    let watermark = |plane: &ControlPlane| {
        plane
            .query_alerts(&AlertQuery::all())
            .into_iter()
            .filter(|a| a.alert_type == AlertType::DeadLetterWatermark)
            .count()
    };
    assert_eq!(plane.dead_letters().len(), 3);
    assert_eq!(watermark(&plane), 1);
    assert_eq!(plane.audit_log().count_kind(AuditEventKind::DeadLettered), 3);

    // Dropping below and crossing again re-arms the alert.
    assert_eq!(plane.drain_dead_letters().len(), 3);
    for n in 0..2 {
        plane
            .publish_event("nairobi", EventPayload::new("transaction.held", format!("j{n}"), json!({})))
            .unwrap();
        let event = plane.claim("worker").unwrap().unwrap();
        plane.nack("worker", event.id, "schema mismatch").unwrap();
    }
    assert_eq!(watermark(&plane), 2);
}

#[test]
fn replay_returns_dead_letter_to_partition() {
    let mut config = ControlPlaneConfig::default();
    config.streaming.supervisor.max_retries = 0;
    let (plane, _) = plane_with(config);
    plane.register_consumer("worker", vec!["*".to_string()]);
    plane
        .publish_event("eldoret", EventPayload::new("transaction.authorized", "k", json!({})))
        .unwrap();
    let event = plane.claim("worker").unwrap().unwrap();
    plane.nack("worker", event.id, "downstream 500").unwrap();

    let ack = plane.replay_dead_letter(event.id).unwrap();
    assert_eq!(ack.event_id, event.id);
    assert!(plane.dead_letters().is_empty());
    assert_eq!(plane.audit_log().count_kind(AuditEventKind::DeadLetterReplayed), 1);

    let again = plane.claim("worker").unwrap().unwrap();
    assert_eq!(again.id, event.id);
    assert_eq!(again.replays, 1);
}

#[test]
fn supervise_audits_dead_consumer() {
    let (plane, clock) = plane();
    plane.register_consumer("lonely", vec!["*".to_string()]);
    plane
        .publish_event("nakuru", EventPayload::new("transaction.held", "k", json!({})))
        .unwrap();
    plane.claim("lonely").unwrap().unwrap();

    clock.advance(3 * plane.config().streaming.supervisor.heartbeat_interval_ms);
    let report = plane.supervise();
    assert_eq!(report.dead_lettered.len(), 1);
    assert_eq!(plane.consumers()[0].status, ConsumerStatus::Dead);
    assert_eq!(plane.audit_log().count_kind(AuditEventKind::ConsumerStatusChanged), 1);
    assert_eq!(plane.audit_log().count_kind(AuditEventKind::DeadLettered), 1);
    assert_eq!(plane.dead_letters()[0].reason, "consumer-dead");
}

#[test]
fn snapshot_serializes_to_json() {
    let (plane, _) = plane();
    plane.simulate_flow("254712345678", "nairobi", 5_000).unwrap();
    plane.record_service_call("ledger-service", false);

    let snapshot = plane.metrics_snapshot();
    assert_eq!(snapshot.identities.active, 1);
    assert_eq!(snapshot.total_partition_load, 1);
    assert_eq!(snapshot.circuits.len(), 1);

    let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(value["identities"]["active"], 1);
    assert_eq!(value["taken_at"], T0);
}

#[tokio::test]
async fn alert_subscription_receives_filtered_alerts() {
    let (plane, _) = plane();
    let mut high = plane.subscribe_alerts(Severity::High);

    let identity = plane.issue_identity("254712345678", "nairobi").unwrap();
    // Review (warning) is filtered out; the open breaker (high) is delivered.
    plane.evaluate(&identity.id, 2_000_000, "nairobi", T0).unwrap();
    for _ in 0..5 {
        plane.record_service_call("sms-gateway", false);
    }

    let alert = high.recv().await.unwrap();
    assert_eq!(alert.alert_type, AlertType::CircuitOpened);
    assert_eq!(alert.subject_ref, "sms-gateway");
}
