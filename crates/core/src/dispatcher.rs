use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use crate::collaborators::{DecisionRecord, DecisionSink, SinkError};
use crate::config::DispatchConfig;
use crate::domain::request::{ProductRequest, RequestId};
use crate::errors::ApprovalError;
use crate::events::IntentEvent;
use crate::helpers::{self, ValidationRules};
use crate::store::RequestStore;

/// Validates intents, forwards decisions to the sink and applies confirmed ones to the store.
///
/// At most one decision per request id is outstanding at any time; a second intent for the
/// same id is refused with [`ApprovalError::Conflict`] until the first resolves.
pub struct ActionDispatcher<S> {
    store: RwLock<RequestStore>,
    sink: S,
    audit: Arc<dyn AuditSink>,
    rules: ValidationRules,
    decision_timeout: Duration,
    actor: String,
    in_flight: Mutex<HashSet<RequestId>>,
}

impl<S> ActionDispatcher<S>
where
    S: DecisionSink,
{
    pub fn new(sink: S, config: &DispatchConfig) -> Self {
        Self {
            store: RwLock::new(RequestStore::new()),
            sink,
            audit: Arc::new(TracingAuditSink),
            rules: config.validation_rules(),
            decision_timeout: config.decision_timeout(),
            actor: config.actor.clone(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn load(&self, requests: Vec<ProductRequest>) -> Result<(), ApprovalError> {
        self.store.write().await.load(requests)
    }

    pub async fn get(&self, id: &RequestId) -> Result<ProductRequest, ApprovalError> {
        self.store.read().await.get(id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<ProductRequest> {
        self.store.read().await.snapshot()
    }

    pub fn in_flight(&self) -> BTreeSet<RequestId> {
        lock(&self.in_flight).iter().cloned().collect()
    }

    pub async fn handle(&self, intent: IntentEvent) -> Result<ProductRequest, ApprovalError> {
        let correlation_id = Uuid::new_v4().to_string();
        info!(
            event_name = "dispatch.intent_received",
            request_id = %intent.id,
            decision = %intent.kind,
            correlation_id = %correlation_id,
            "intent received"
        );

        let outcome = self.dispatch(&intent).await;
        self.record_audit(&intent, &correlation_id, &outcome);

        match &outcome {
            Ok(record) => info!(
                event_name = "dispatch.decision_applied",
                request_id = %record.id,
                status = %record.status,
                correlation_id = %correlation_id,
                "decision applied"
            ),
            Err(error) => warn!(
                event_name = "dispatch.intent_refused",
                request_id = %intent.id,
                error_class = error.error_class(),
                correlation_id = %correlation_id,
                error = %error,
                "intent refused"
            ),
        }
        outcome
    }

    async fn dispatch(&self, intent: &IntentEvent) -> Result<ProductRequest, ApprovalError> {
        let note = helpers::validate_intent(intent, &self.rules)?;

        let target = intent.kind.resulting_status();
        {
            let store = self.store.read().await;
            let current = store.get(&intent.id)?;
            if !current.can_transition_to(target) {
                return Err(ApprovalError::InvalidTransition {
                    id: intent.id.clone(),
                    from: current.status,
                    to: target,
                });
            }
        }

        let _claim = InFlightClaim::acquire(&self.in_flight, &intent.id)?;
        let record = DecisionRecord {
            id: intent.id.clone(),
            decision: intent.kind,
            note,
            decided_at: Utc::now(),
        };

        let timeout_ms = u64::try_from(self.decision_timeout.as_millis()).unwrap_or(u64::MAX);
        let submitted =
            tokio::time::timeout(self.decision_timeout, self.sink.submit(&record)).await;
        match submitted {
            Ok(Ok(())) => {}
            Ok(Err(SinkError::Conflict(detail))) => {
                warn!(
                    event_name = "dispatch.sink_conflict",
                    request_id = %record.id,
                    detail = %detail,
                    "decision sink reported a conflict"
                );
                return Err(ApprovalError::Conflict { id: record.id });
            }
            Ok(Err(SinkError::Unavailable(detail))) => {
                warn!(
                    event_name = "dispatch.sink_unavailable",
                    request_id = %record.id,
                    detail = %detail,
                    "decision sink unavailable"
                );
                return Err(ApprovalError::Timeout { id: record.id, timeout_ms });
            }
            Ok(Err(SinkError::Timeout)) | Err(_) => {
                return Err(ApprovalError::Timeout { id: record.id, timeout_ms });
            }
        }

        self.store.write().await.apply_decision_at(
            &record.id,
            record.decision,
            record.note,
            record.decided_at,
        )
    }

    fn record_audit(
        &self,
        intent: &IntentEvent,
        correlation_id: &str,
        outcome: &Result<ProductRequest, ApprovalError>,
    ) {
        let event = match outcome {
            Ok(record) => AuditEvent::new(
                intent.id.clone(),
                correlation_id,
                "decision.applied",
                self.actor.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("status", record.status.as_str()),
            Err(error) => {
                let outcome = match error {
                    ApprovalError::Timeout { .. } => AuditOutcome::Failed,
                    _ => AuditOutcome::Rejected,
                };
                AuditEvent::new(
                    intent.id.clone(),
                    correlation_id,
                    "decision.refused",
                    self.actor.clone(),
                    outcome,
                )
                .with_metadata("error_class", error.error_class())
                .with_metadata("error", error.to_string())
            }
        };

        self.audit.emit(event.with_metadata("decision", intent.kind.as_str()));
    }
}

fn lock(set: &Mutex<HashSet<RequestId>>) -> MutexGuard<'_, HashSet<RequestId>> {
    match set.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Marks a request id as in flight for as long as the claim is alive.
struct InFlightClaim<'a> {
    set: &'a Mutex<HashSet<RequestId>>,
    id: RequestId,
}

impl<'a> InFlightClaim<'a> {
    fn acquire(set: &'a Mutex<HashSet<RequestId>>, id: &RequestId) -> Result<Self, ApprovalError> {
        if !lock(set).insert(id.clone()) {
            return Err(ApprovalError::Conflict { id: id.clone() });
        }
        Ok(Self { set, id: id.clone() })
    }
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use tokio::sync::Semaphore;

    use super::ActionDispatcher;
    use crate::audit::{AuditOutcome, InMemoryAuditSink};
    use crate::collaborators::{DecisionRecord, DecisionSink, InMemoryDecisionSink, SinkError};
    use crate::config::DispatchConfig;
    use crate::domain::request::{ProductRequest, RequestId, RequestStatus};
    use crate::errors::{ApprovalError, ValidationFailure};
    use crate::events::IntentEvent;

    fn pending_pair() -> Vec<ProductRequest> {
        let base = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).single().expect("valid timestamp");
        vec![
            ProductRequest::pending("1", "Priya Natarajan", "Noise-cancelling headset", base),
            ProductRequest::pending("2", "Jon Mbeki", "Second monitor", base + Duration::hours(1)),
        ]
    }

    async fn dispatcher_with<S: DecisionSink>(
        sink: S,
        config: DispatchConfig,
    ) -> ActionDispatcher<S> {
        let dispatcher = ActionDispatcher::new(sink, &config);
        dispatcher.load(pending_pair()).await.expect("load pending pair");
        dispatcher
    }

    /// Holds every submission until the test hands out a permit.
    struct GatedSink {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl DecisionSink for GatedSink {
        async fn submit(&self, _record: &DecisionRecord) -> Result<(), SinkError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|error| SinkError::Unavailable(error.to_string()))?;
            permit.forget();
            Ok(())
        }
    }

    struct StalledSink;

    #[async_trait]
    impl DecisionSink for StalledSink {
        async fn submit(&self, _record: &DecisionRecord) -> Result<(), SinkError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn approve_then_reject_same_request_is_invalid_transition() {
        let dispatcher =
            dispatcher_with(InMemoryDecisionSink::default(), DispatchConfig::default()).await;

        let approved = dispatcher.handle(IntentEvent::approve("1")).await.expect("approve 1");
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(approved.decided_at.is_some());

        let error = dispatcher.handle(IntentEvent::reject("1")).await.expect_err("reject 1");
        assert!(matches!(error, ApprovalError::InvalidTransition { .. }));

        assert_eq!(dispatcher.get(&RequestId::new("1")).await.expect("record 1"), approved);
        let second = dispatcher.get(&RequestId::new("2")).await.expect("record 2");
        assert_eq!(second.status, RequestStatus::Pending);
        assert!(second.decided_at.is_none());
        assert_eq!(dispatcher.sink().decisions().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_intents_on_same_request_conflict() {
        let gate = Arc::new(Semaphore::new(0));
        let dispatcher =
            dispatcher_with(GatedSink { gate: gate.clone() }, DispatchConfig::default()).await;

        let (first, second) = tokio::join!(
            dispatcher.handle(IntentEvent::approve("1")),
            async {
                let outcome = dispatcher.handle(IntentEvent::reject("1")).await;
                gate.add_permits(1);
                outcome
            }
        );

        assert_eq!(first.expect("first intent wins").status, RequestStatus::Approved);
        assert_eq!(second, Err(ApprovalError::Conflict { id: RequestId::new("1") }));
        assert_eq!(
            dispatcher.get(&RequestId::new("1")).await.expect("record 1").status,
            RequestStatus::Approved
        );
        assert!(dispatcher.in_flight().is_empty());
    }

    #[tokio::test]
    async fn invalid_intent_does_not_reach_sink_or_store() {
        let config = DispatchConfig { max_note_chars: 8, ..DispatchConfig::default() };
        let dispatcher = dispatcher_with(InMemoryDecisionSink::default(), config).await;

        let error = dispatcher
            .handle(IntentEvent::reject("2").with_note("far too long for the limit"))
            .await
            .expect_err("note too long");

        assert!(matches!(error, ApprovalError::Validation(ValidationFailure::NoteTooLong { .. })));
        assert!(dispatcher.sink().decisions().await.is_empty());
        assert_eq!(dispatcher.snapshot().await, pending_pair());
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let dispatcher =
            dispatcher_with(InMemoryDecisionSink::default(), DispatchConfig::default()).await;

        let error = dispatcher.handle(IntentEvent::approve("99")).await.expect_err("unknown");
        assert_eq!(error, ApprovalError::NotFound { id: RequestId::new("99") });
    }

    #[tokio::test]
    async fn stalled_sink_times_out_and_leaves_request_pending() {
        let config = DispatchConfig { decision_timeout_ms: 20, ..DispatchConfig::default() };
        let dispatcher = dispatcher_with(StalledSink, config).await;

        let error = dispatcher.handle(IntentEvent::approve("2")).await.expect_err("timeout");
        assert_eq!(error, ApprovalError::Timeout { id: RequestId::new("2"), timeout_ms: 20 });

        let record = dispatcher.get(&RequestId::new("2")).await.expect("record 2");
        assert_eq!(record.status, RequestStatus::Pending);
        assert!(dispatcher.in_flight().is_empty(), "claim is released after a timeout");
    }

    #[tokio::test]
    async fn sink_conflict_maps_to_conflict_error() {
        let sink = InMemoryDecisionSink::default();
        sink.fail_next(SinkError::Conflict("decided elsewhere".to_string())).await;
        let dispatcher = dispatcher_with(sink, DispatchConfig::default()).await;

        let error = dispatcher.handle(IntentEvent::approve("1")).await.expect_err("conflict");
        assert_eq!(error, ApprovalError::Conflict { id: RequestId::new("1") });

        let retried = dispatcher.handle(IntentEvent::approve("1")).await.expect("explicit retry");
        assert_eq!(retried.status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn unavailable_sink_surfaces_timeout_and_keeps_request_pending() {
        let sink = InMemoryDecisionSink::default();
        sink.fail_next(SinkError::Unavailable("connection refused".to_string())).await;
        let dispatcher = dispatcher_with(sink, DispatchConfig::default()).await;

        let error = dispatcher.handle(IntentEvent::reject("1")).await.expect_err("unavailable");
        assert_eq!(error, ApprovalError::Timeout { id: RequestId::new("1"), timeout_ms: 5_000 });

        let record = dispatcher.get(&RequestId::new("1")).await.expect("record 1");
        assert_eq!(record.status, RequestStatus::Pending);
        assert!(record.decided_at.is_none());
        assert!(dispatcher.in_flight().is_empty());
        assert!(dispatcher.sink().decisions().await.is_empty());
    }

    #[tokio::test]
    async fn sink_reported_timeout_maps_to_timeout_before_deadline() {
        let sink = InMemoryDecisionSink::default();
        sink.fail_next(SinkError::Timeout).await;
        let config = DispatchConfig { decision_timeout_ms: 60_000, ..DispatchConfig::default() };
        let dispatcher = dispatcher_with(sink, config).await;

        let error = dispatcher.handle(IntentEvent::approve("2")).await.expect_err("sink timeout");
        assert_eq!(error, ApprovalError::Timeout { id: RequestId::new("2"), timeout_ms: 60_000 });
        assert_eq!(
            dispatcher.get(&RequestId::new("2")).await.expect("record 2").status,
            RequestStatus::Pending
        );
        assert!(dispatcher.in_flight().is_empty());
    }

    #[tokio::test]
    async fn every_intent_is_audited() {
        let audit = InMemoryAuditSink::default();
        let dispatcher =
            dispatcher_with(InMemoryDecisionSink::default(), DispatchConfig::default())
                .await
                .with_audit_sink(Arc::new(audit.clone()));

        dispatcher.handle(IntentEvent::approve("1")).await.expect("approve");
        let _ = dispatcher.handle(IntentEvent::reject("1")).await;

        let events = audit.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "decision.applied");
        assert_eq!(events[0].outcome, AuditOutcome::Success);
        assert_eq!(events[0].actor, "operator");
        assert_eq!(events[1].outcome, AuditOutcome::Rejected);
        assert_eq!(
            events[1].metadata.get("error_class").map(String::as_str),
            Some("invalid_transition")
        );
        assert_ne!(events[0].correlation_id, events[1].correlation_id);
    }
}
