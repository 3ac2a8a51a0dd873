//! # Control Plane
//!
//! Owns every store and exposes the external interface the dashboards and
//! operators drive.
//!
//! ## Transaction Flow
//!
//! ```text
//! issue_identity ──→ IdentityIssuer (cp-01)
//!                          │
//! evaluate ──→ resolve ──→ FraudScorer (cp-02) ──→ PolicyEngine (cp-03)
//!                                                      │ audit + alert
//!                                                      ↓
//! call_service ──→ CircuitBreakerRegistry (cp-04) ──→ downstream
//!                                                      │
//! publish_event ──→ EventPartitionManager (cp-05) ──→ ConsumerSupervisor
//!                                                      │ retry / redeliver
//!                                                      ↓
//!                                               DeadLetterStore
//! ```
//!
//! ## Ownership
//!
//! - Every store is constructed here and injected where it is needed; no
//!   subsystem reaches for a global.
//! - The control plane never draws randomness. All time comes from the
//!   injected [`TimeSource`].
//! - Reads (`metrics_snapshot`, `query_alerts`, `dead_letters`) return
//!   owned values.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use control_telemetry::{
    log_event, time_histogram, DEAD_LETTERS, DEAD_LETTERS_PENDING, EVENTS_PUBLISHED,
    FRAUD_CRITICAL, IDENTITIES_ISSUED, PARTITION_REJECTIONS, POLICY_DECISIONS,
    POLICY_EVALUATION_DURATION,
};
use cp_01_identity::{IdentityApi, IdentityIssuer, IdentityStore, IssueOutcome};
use cp_02_fraud_scoring::{FraudScorer, TransactionHistoryStore};
use cp_03_policy_engine::{
    baseline_policies, Decision, PolicyDefinition, PolicyEngine, PolicyOutcome, PolicySummary,
};
use cp_04_circuit_breaker::{CallError, CircuitBreakerRegistry, CircuitBreakerState};
use cp_05_event_streaming::{
    Ack, ConsumerState, ConsumerSupervisor, DeadLetterEntry, DeadLetterStore, DeregisterReport,
    EventId, EventPartitionManager, EventPayload, RetryOutcome, StreamEvent, StreamingError,
    SupervisionReport,
};
use serde_json::json;
use shared_bus::{
    Alert, AlertBus, AlertId, AlertQuery, AlertStream, AlertSubscription, AlertType, AuditEntry,
    AuditEventKind, AuditLog,
};
use shared_types::{
    ControlPlaneError, ControlPlaneResult, Identity, IdentityId, Region, RiskClassification,
    Severity, SystemTimeSource, TimeSource, Timestamp, Transaction,
};
use tracing::{debug, info, warn};

use crate::adapters::{messages, raise_alert, AuditingTransitionSink};
use crate::container::config::{ConfigError, ControlPlaneConfig};
use crate::snapshot::{
    Assessment, AuditMetrics, IdentityMetrics, MetricsSnapshot, PolicyMetrics, Trace,
};

/// Event published for an allowed transaction.
pub const EVENT_TRANSACTION_AUTHORIZED: &str = "transaction.authorized";
/// Event published for a transaction held for review.
pub const EVENT_TRANSACTION_HELD: &str = "transaction.held";
/// Event published for a denied transaction.
pub const EVENT_TRANSACTION_DECLINED: &str = "transaction.declined";

/// Event type recording a decision's outcome.
pub fn event_type_for(outcome: PolicyOutcome) -> &'static str {
    match outcome {
        PolicyOutcome::Allow => EVENT_TRANSACTION_AUTHORIZED,
        PolicyOutcome::Review => EVENT_TRANSACTION_HELD,
        PolicyOutcome::Deny => EVENT_TRANSACTION_DECLINED,
    }
}

/// The security and traffic control plane.
pub struct ControlPlane {
    config: ControlPlaneConfig,
    clock: Arc<dyn TimeSource>,

    // =========================================================================
    // AUTHORIZATION PATH
    // =========================================================================
    identities: IdentityIssuer,
    history: TransactionHistoryStore,
    scorer: FraudScorer,
    policies: PolicyEngine,

    // =========================================================================
    // TRAFFIC CONTROL
    // =========================================================================
    breakers: CircuitBreakerRegistry,
    partitions: Arc<EventPartitionManager>,
    supervisor: ConsumerSupervisor,
    dead_letters: Arc<DeadLetterStore>,

    // =========================================================================
    // AUDIT AND ALERTS
    // =========================================================================
    audit: Arc<AuditLog>,
    alerts: Arc<AlertBus>,
    /// Set while the dead-letter count is at or above the watermark, so the
    /// alert fires once per upward crossing.
    dead_letter_alarm: AtomicBool,
}

impl ControlPlane {
    /// Build every subsystem from a validated configuration.
    pub fn new(config: ControlPlaneConfig, clock: Arc<dyn TimeSource>) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Err(e) = control_telemetry::register_metrics() {
            warn!(error = %e, "Metrics registration failed; continuing without them");
        }

        let audit = Arc::new(AuditLog::new());
        let alerts = Arc::new(AlertBus::with_capacity(config.alerts.channel_capacity));

        let identities = IdentityIssuer::new(
            config.identity.clone(),
            Arc::new(IdentityStore::new()),
            Arc::clone(&clock),
        );
        let history = TransactionHistoryStore::new(config.fraud.history_window);
        let scorer = FraudScorer::new(config.fraud.clone())?;

        let definitions = if config.policies.is_empty() {
            baseline_policies()
        } else {
            config.policies.clone()
        };
        let policies = PolicyEngine::with_policies(definitions)?;

        let breakers = CircuitBreakerRegistry::new(config.circuit_breaker.clone(), Arc::clone(&clock))?
            .with_sink(Arc::new(AuditingTransitionSink::new(
                Arc::clone(&audit),
                Arc::clone(&alerts),
            )));

        let partitions = Arc::new(EventPartitionManager::new(&config.streaming, Arc::clone(&clock))?);
        let dead_letters = Arc::new(DeadLetterStore::new());
        let supervisor = ConsumerSupervisor::new(
            config.streaming.supervisor.clone(),
            Arc::clone(&partitions),
            Arc::clone(&dead_letters),
            Arc::clone(&clock),
        );

        info!(
            regions = config.streaming.regions.len(),
            partitions = partitions.partitions().len(),
            policies = policies.list().len(),
            "Control plane initialized"
        );

        Ok(Self {
            config,
            clock,
            identities,
            history,
            scorer,
            policies,
            breakers,
            partitions,
            supervisor,
            dead_letters,
            audit,
            alerts,
            dead_letter_alarm: AtomicBool::new(false),
        })
    }

    /// Build with the wall clock.
    pub fn with_system_clock(config: ControlPlaneConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(SystemTimeSource))
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn alert_bus(&self) -> &Arc<AlertBus> {
        &self.alerts
    }

    fn record_audit(&self, kind: AuditEventKind, source: &str, details: serde_json::Value) -> AuditEntry {
        self.audit.append(self.clock.now(), kind, source, details)
    }

    fn raise(&self, severity: Severity, alert_type: AlertType, message: shared_types::LocalizedMessage, subject: &str) {
        raise_alert(&self.alerts, self.clock.now(), severity, alert_type, message, subject);
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    /// Issue an identity, or return the live one for this credential.
    pub fn issue_identity(&self, credential: &str, region: &str) -> ControlPlaneResult<Identity> {
        Ok(self.issue(credential, region)?.identity)
    }

    fn issue(&self, credential: &str, region: &str) -> ControlPlaneResult<IssueOutcome> {
        let outcome = self.identities.issue(credential, region)?;
        if outcome.issued {
            let identity = &outcome.identity;
            IDENTITIES_ISSUED.inc();
            self.record_audit(
                AuditEventKind::IdentityIssued,
                "identity",
                json!({
                    "identity_id": identity.id,
                    "credential": identity.primary_credential.masked(),
                    "region": identity.region,
                    "tier": identity.tier,
                    "expires_at": identity.expires_at,
                }),
            );
        }
        Ok(outcome)
    }

    pub fn verify_identity(&self, identity_id: &IdentityId) -> ControlPlaneResult<Identity> {
        let was_verified = self.identities.get(identity_id).map(|i| i.verified);
        let identity = self.identities.verify(identity_id)?;
        if was_verified == Some(false) {
            self.record_audit(
                AuditEventKind::IdentityVerified,
                "identity",
                json!({ "identity_id": identity.id }),
            );
        }
        Ok(identity)
    }

    pub fn lookup_identity(&self, credential: &str) -> ControlPlaneResult<Identity> {
        Ok(self.identities.lookup(credential)?)
    }

    /// Identity by id, including expired ones.
    pub fn get_identity(&self, identity_id: &IdentityId) -> Option<Identity> {
        self.identities.get(identity_id)
    }

    /// Drop expired identities from the active index. Returns how many.
    pub fn purge_expired_identities(&self) -> usize {
        let purged = self.identities.purge_expired();
        if purged > 0 {
            info!(purged, "Expired identities purged");
        }
        purged
    }

    // =========================================================================
    // AUTHORIZATION
    // =========================================================================

    /// Score and authorize a transaction. Errors with `NotFound` for unknown
    /// identities and `IdentityExpired` for expired ones.
    pub fn evaluate(
        &self,
        identity_id: &IdentityId,
        amount: u64,
        region: &str,
        timestamp: Timestamp,
    ) -> ControlPlaneResult<Decision> {
        Ok(self.assess(identity_id, amount, region, timestamp)?.decision)
    }

    /// [`evaluate`](Self::evaluate) with the score and audit sequence.
    ///
    /// The transaction is appended to the identity's history after scoring,
    /// so it becomes part of the baseline for later transactions.
    pub fn assess(
        &self,
        identity_id: &IdentityId,
        amount: u64,
        region: &str,
        timestamp: Timestamp,
    ) -> ControlPlaneResult<Assessment> {
        let _timer = time_histogram!(POLICY_EVALUATION_DURATION);

        let identity = self.identities.resolve(identity_id)?;
        let transaction = Transaction::in_region(identity.id, amount, Region::new(region), timestamp);

        let history = self.history.snapshot(&identity.id);
        let score = self.scorer.score(&identity, &transaction, &history);
        let classification = score.classification();
        let decision = self.policies.evaluate(&identity, &transaction, score.value);
        self.history.record(transaction.clone());

        POLICY_DECISIONS
            .with_label_values(&[decision.outcome.as_str()])
            .inc();
        let entry = self.record_audit(
            AuditEventKind::PolicyDecision,
            "policy",
            json!({
                "identity_id": identity.id,
                "amount": transaction.amount,
                "region": transaction.region,
                "score": score.value,
                "classification": classification,
                "factors": score.factors,
                "outcome": decision.outcome,
                "matched_policy": decision.matched_policy,
                "reason": decision.reason,
            }),
        );

        let subject = identity.id.to_string();
        if classification == RiskClassification::Critical {
            FRAUD_CRITICAL.inc();
            self.raise(
                Severity::Critical,
                AlertType::FraudCritical,
                messages::fraud_critical(&subject, score.value),
                &subject,
            );
        }
        let policy = decision.matched_policy.as_deref().unwrap_or("default");
        match decision.outcome {
            PolicyOutcome::Deny => self.raise(
                Severity::High,
                AlertType::TransactionDenied,
                messages::transaction_denied(&subject, policy),
                &subject,
            ),
            PolicyOutcome::Review => self.raise(
                Severity::Warning,
                AlertType::TransactionReview,
                messages::transaction_review(&subject, policy),
                &subject,
            ),
            PolicyOutcome::Allow => {}
        }

        debug!(
            identity_id = %identity.id,
            score = score.value,
            outcome = %decision.outcome,
            "Transaction evaluated"
        );
        Ok(Assessment {
            score,
            classification,
            decision,
            audit_sequence: entry.sequence_id,
        })
    }

    // =========================================================================
    // POLICIES
    // =========================================================================

    fn policy_changed(&self, action: &str, name: Option<&str>, version: u64) -> u64 {
        self.record_audit(
            AuditEventKind::PolicySetChanged,
            "policy",
            json!({ "action": action, "name": name, "version": version }),
        );
        log_event!(info, "policy", "Policy set changed", action = action, version = version);
        version
    }

    pub fn add_policy(&self, definition: PolicyDefinition) -> ControlPlaneResult<u64> {
        let name = definition.name.clone();
        let version = self.policies.add(definition)?;
        Ok(self.policy_changed("add", Some(&name), version))
    }

    pub fn remove_policy(&self, name: &str) -> ControlPlaneResult<u64> {
        let version = self.policies.remove(name)?;
        Ok(self.policy_changed("remove", Some(name), version))
    }

    pub fn toggle_policy(&self, name: &str, active: bool) -> ControlPlaneResult<u64> {
        let version = self.policies.toggle(name, active)?;
        let action = if active { "enable" } else { "disable" };
        Ok(self.policy_changed(action, Some(name), version))
    }

    /// Replace the whole set from a TOML `[[policies]]` document. A document
    /// with any bad rule leaves the current set installed.
    pub fn reload_policies(&self, document: &str) -> ControlPlaneResult<u64> {
        let version = self.policies.load_toml(document)?;
        Ok(self.policy_changed("reload", None, version))
    }

    pub fn list_policies(&self) -> Vec<PolicySummary> {
        self.policies.list()
    }

    // =========================================================================
    // CIRCUIT BREAKERS
    // =========================================================================

    /// Report the result of a call made outside [`call_service`](Self::call_service).
    pub fn record_service_call(&self, service_id: &str, success: bool) -> CircuitBreakerState {
        self.breakers.record(service_id, success).state
    }

    /// Run `f` under the service's breaker.
    pub async fn call_service<F, Fut, T, E>(&self, service_id: &str, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.breakers.call(service_id, f).await
    }

    pub fn circuit_state(&self, service_id: &str) -> CircuitBreakerState {
        self.breakers.state(service_id)
    }

    /// Operator override: force a breaker closed.
    pub fn reset_circuit(&self, service_id: &str) -> Option<CircuitBreakerState> {
        self.breakers.reset(service_id).map(|outcome| outcome.state)
    }

    // =========================================================================
    // STREAMING
    // =========================================================================

    /// Publish into the region's partition for `payload.key`.
    pub fn publish_event(&self, region: &str, payload: EventPayload) -> ControlPlaneResult<Ack> {
        match self.partitions.publish(region, payload) {
            Ok(ack) => {
                EVENTS_PUBLISHED.inc();
                Ok(ack)
            }
            Err(err) => {
                self.on_streaming_error(&err);
                Err(err.into())
            }
        }
    }

    fn on_streaming_error(&self, err: &StreamingError) {
        if let StreamingError::PartitionOverloaded {
            partition,
            capacity,
        } = err
        {
            PARTITION_REJECTIONS
                .with_label_values(&[partition.to_string().as_str()])
                .inc();
            self.record_audit(
                AuditEventKind::PartitionOverloaded,
                "streaming",
                json!({ "partition": partition, "capacity": capacity }),
            );
            self.raise(
                Severity::Warning,
                AlertType::PartitionOverloaded,
                messages::partition_overloaded(*partition, *capacity),
                &format!("partition-{partition}"),
            );
        }
    }

    fn on_dead_lettered(&self, event_id: EventId) {
        DEAD_LETTERS.inc();
        if let Some(entry) = self.dead_letters.get(event_id) {
            self.record_audit(
                AuditEventKind::DeadLettered,
                "streaming",
                json!({
                    "event_id": entry.event_id,
                    "event_type": entry.event_type,
                    "partition": entry.original_partition,
                    "reason": entry.reason,
                    "retry_count": entry.retry_count,
                }),
            );
        }
    }

    fn check_dead_letter_watermark(&self) {
        let count = self.dead_letters.len();
        DEAD_LETTERS_PENDING.set(count as f64);

        let watermark = self.config.alerts.dead_letter_watermark;
        if count >= watermark {
            if !self.dead_letter_alarm.swap(true, Ordering::AcqRel) {
                self.raise(
                    Severity::High,
                    AlertType::DeadLetterWatermark,
                    messages::dead_letter_watermark(count, watermark),
                    "dead-letters",
                );
            }
        } else {
            self.dead_letter_alarm.store(false, Ordering::Release);
        }
    }

    pub fn register_consumer(&self, consumer_id: &str, event_types: Vec<String>) -> ConsumerState {
        self.supervisor.register(consumer_id, event_types)
    }

    pub fn heartbeat(&self, consumer_id: &str) -> ControlPlaneResult<ConsumerState> {
        Ok(self.supervisor.heartbeat(consumer_id)?)
    }

    pub fn claim(&self, consumer_id: &str) -> ControlPlaneResult<Option<StreamEvent>> {
        Ok(self.supervisor.claim(consumer_id)?)
    }

    pub fn ack(&self, consumer_id: &str, event_id: EventId) -> ControlPlaneResult<()> {
        Ok(self.supervisor.ack(consumer_id, event_id)?)
    }

    pub fn nack(&self, consumer_id: &str, event_id: EventId, reason: &str) -> ControlPlaneResult<RetryOutcome> {
        let outcome = self.supervisor.nack(consumer_id, event_id, reason)?;
        if let RetryOutcome::DeadLettered { .. } = outcome {
            self.on_dead_lettered(event_id);
            self.check_dead_letter_watermark();
        }
        Ok(outcome)
    }

    /// Liveness sweep; audits status changes and dead letters.
    pub fn supervise(&self) -> SupervisionReport {
        let report = self.supervisor.supervise();
        for change in &report.status_changes {
            self.record_audit(
                AuditEventKind::ConsumerStatusChanged,
                "streaming",
                json!({
                    "consumer": change.consumer,
                    "from": change.from,
                    "to": change.to,
                }),
            );
        }
        for event_id in &report.dead_lettered {
            self.on_dead_lettered(*event_id);
        }
        self.check_dead_letter_watermark();
        report
    }

    pub fn begin_drain(&self, consumer_id: &str) -> ControlPlaneResult<ConsumerState> {
        Ok(self.supervisor.begin_drain(consumer_id)?)
    }

    pub fn deregister_consumer(&self, consumer_id: &str) -> ControlPlaneResult<DeregisterReport> {
        Ok(self.supervisor.deregister(consumer_id)?)
    }

    pub fn consumers(&self) -> Vec<ConsumerState> {
        self.supervisor.consumers()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetterEntry> {
        self.dead_letters.list()
    }

    /// Operator action: remove and return every dead letter.
    pub fn drain_dead_letters(&self) -> Vec<DeadLetterEntry> {
        let drained = self.dead_letters.drain();
        info!(count = drained.len(), "Dead letters drained");
        self.check_dead_letter_watermark();
        drained
    }

    /// Re-publish a dead letter into its original partition.
    pub fn replay_dead_letter(&self, event_id: EventId) -> ControlPlaneResult<Ack> {
        match self.supervisor.replay(event_id) {
            Ok(ack) => {
                self.record_audit(
                    AuditEventKind::DeadLetterReplayed,
                    "streaming",
                    json!({ "event_id": event_id, "partition": ack.partition }),
                );
                self.check_dead_letter_watermark();
                Ok(ack)
            }
            Err(err) => {
                self.on_streaming_error(&err);
                Err(err.into())
            }
        }
    }

    // =========================================================================
    // ALERTS
    // =========================================================================

    pub fn query_alerts(&self, query: &AlertQuery) -> Vec<Alert> {
        self.alerts.query(query)
    }

    pub fn resolve_alert(&self, alert_id: AlertId) -> ControlPlaneResult<Alert> {
        let alert = self
            .alerts
            .resolve(alert_id, self.clock.now())
            .map_err(|_| ControlPlaneError::NotFound {
                kind: "alert",
                id: alert_id.to_string(),
            })?;
        self.record_audit(
            AuditEventKind::AlertResolved,
            "alerts",
            json!({ "alert_id": alert.id, "alert_type": alert.alert_type }),
        );
        Ok(alert)
    }

    pub fn subscribe_alerts(&self, min_severity: Severity) -> AlertSubscription {
        self.alerts.subscribe(min_severity)
    }

    pub fn alert_stream(&self, min_severity: Severity) -> AlertStream {
        self.alerts.stream(min_severity)
    }

    // =========================================================================
    // READ MODELS
    // =========================================================================

    /// Point-in-time view for dashboards. Pure read.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let now = self.clock.now();
        let policy_set = self.policies.store().snapshot();
        let circuits = self.breakers.snapshot();
        let partitions = self.partitions.snapshot();
        let consumers = self.supervisor.consumers();

        MetricsSnapshot {
            taken_at: now,
            identities: IdentityMetrics {
                active: self.identities.active_count(now),
                verified: self.identities.verified_count(now),
            },
            policies: PolicyMetrics {
                version: policy_set.version(),
                installed: policy_set.len(),
                active: policy_set.active_count(),
            },
            open_circuits: self.breakers.open_count(),
            circuits,
            total_partition_load: partitions.iter().map(|p| p.current_load).sum(),
            partitions,
            live_consumers: self.supervisor.live_count(),
            consumers,
            dead_letters: self.dead_letters.len(),
            open_alerts: self.alerts.open_count_by_severity(),
            audit: AuditMetrics {
                entries: self.audit.len(),
                last_sequence: self.audit.last_sequence(),
            },
        }
    }

    /// Issue → score → evaluate → publish, as one traced flow.
    ///
    /// Backpressure on publish is reported in the trace rather than failing
    /// the flow, since the decision has already been made and audited.
    pub fn simulate_flow(&self, credential: &str, region: &str, amount: u64) -> ControlPlaneResult<Trace> {
        let first_sequence = self.audit.last_sequence() + 1;

        let IssueOutcome { identity, issued } = self.issue(credential, region)?;
        let assessment = self.assess(&identity.id, amount, region, self.clock.now())?;

        let event_type = event_type_for(assessment.decision.outcome);
        let payload = EventPayload::new(
            event_type,
            identity.id.to_string(),
            json!({
                "identity_id": identity.id,
                "amount": amount,
                "score": assessment.score.value,
                "outcome": assessment.decision.outcome,
                "matched_policy": assessment.decision.matched_policy,
            }),
        );
        let (published, rejection) = match self.publish_event(region, payload) {
            Ok(ack) => (Some(ack), None),
            Err(err) if err.is_backpressure() => (None, Some(err.to_string())),
            Err(err) => return Err(err),
        };

        Ok(Trace {
            identity,
            issued,
            assessment,
            event_type: event_type.to_string(),
            published,
            rejection,
            audit_range: (first_sequence, self.audit.last_sequence()),
        })
    }
}
