use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::request::{Decision, ProductRequest, RequestId};
use crate::errors::ApprovalError;

/// Ordered, exclusively owned set of product requests keyed by identifier.
#[derive(Clone, Debug, Default)]
pub struct RequestStore {
    records: Vec<ProductRequest>,
    index: HashMap<RequestId, usize>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents. Nothing changes unless every record is accepted.
    pub fn load(&mut self, requests: Vec<ProductRequest>) -> Result<(), ApprovalError> {
        let mut index = HashMap::with_capacity(requests.len());
        for (position, request) in requests.iter().enumerate() {
            request.check_consistency()?;
            if index.insert(request.id.clone(), position).is_some() {
                return Err(ApprovalError::DuplicateId { id: request.id.clone() });
            }
        }

        debug!(event_name = "store.loaded", record_count = requests.len(), "request store loaded");
        self.records = requests;
        self.index = index;
        Ok(())
    }

    pub fn get(&self, id: &RequestId) -> Result<&ProductRequest, ApprovalError> {
        self.index
            .get(id)
            .map(|position| &self.records[*position])
            .ok_or_else(|| ApprovalError::NotFound { id: id.clone() })
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.index.contains_key(id)
    }

    pub fn snapshot(&self) -> Vec<ProductRequest> {
        self.records.clone()
    }

    pub fn records(&self) -> &[ProductRequest] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn apply_decision(
        &mut self,
        id: &RequestId,
        decision: Decision,
        note: Option<String>,
    ) -> Result<ProductRequest, ApprovalError> {
        self.apply_decision_at(id, decision, note, Utc::now())
    }

    pub fn apply_decision_at(
        &mut self,
        id: &RequestId,
        decision: Decision,
        note: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<ProductRequest, ApprovalError> {
        let position =
            *self.index.get(id).ok_or_else(|| ApprovalError::NotFound { id: id.clone() })?;
        let record = &mut self.records[position];
        record.decide(decision, note, decided_at)?;

        debug!(
            event_name = "store.decision_applied",
            request_id = %id,
            status = %record.status,
            "decision applied to request"
        );
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::RequestStore;
    use crate::domain::request::{Decision, ProductRequest, RequestId, RequestStatus};
    use crate::errors::ApprovalError;

    fn requests(ids: &[&str]) -> Vec<ProductRequest> {
        let base = Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).single().expect("valid timestamp");
        ids.iter()
            .enumerate()
            .map(|(offset, id)| {
                ProductRequest::pending(
                    *id,
                    format!("requester-{id}"),
                    format!("item-{id}"),
                    base + Duration::minutes(offset as i64),
                )
            })
            .collect()
    }

    #[test]
    fn load_then_snapshot_preserves_records_and_order() {
        let input = requests(&["30", "4", "PR-9", "12"]);
        let mut store = RequestStore::new();
        store.load(input.clone()).expect("unique ids load");

        assert_eq!(store.snapshot(), input);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn duplicate_ids_fail_and_leave_store_unchanged() {
        let original = requests(&["1", "2"]);
        let mut store = RequestStore::new();
        store.load(original.clone()).expect("initial load");

        let error = store.load(requests(&["5", "6", "5"])).expect_err("duplicate id");
        assert_eq!(error, ApprovalError::DuplicateId { id: RequestId::new("5") });
        assert_eq!(store.snapshot(), original);
        assert!(!store.contains(&RequestId::new("6")));
    }

    #[test]
    fn inconsistent_record_fails_whole_load() {
        let mut input = requests(&["1", "2"]);
        input[1].status = RequestStatus::Approved;

        let mut store = RequestStore::new();
        let error = store.load(input).expect_err("approved without timestamp");
        assert!(matches!(error, ApprovalError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let store = RequestStore::new();
        let error = store.get(&RequestId::new("404")).expect_err("empty store");
        assert_eq!(error, ApprovalError::NotFound { id: RequestId::new("404") });
    }

    #[test]
    fn first_decision_wins_and_second_is_invalid_transition() {
        let mut store = RequestStore::new();
        store.load(requests(&["1", "2"])).expect("load");
        let untouched = store.get(&RequestId::new("2")).expect("record 2").clone();

        let approved = store
            .apply_decision(&RequestId::new("1"), Decision::Approve, None)
            .expect("pending -> approved");
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(approved.decided_at.is_some());

        let error = store
            .apply_decision(&RequestId::new("1"), Decision::Reject, Some("late".to_string()))
            .expect_err("approved is final");
        assert!(matches!(error, ApprovalError::InvalidTransition { .. }));

        assert_eq!(store.get(&RequestId::new("1")).expect("record 1"), &approved);
        assert_eq!(store.get(&RequestId::new("2")).expect("record 2"), &untouched);
    }

    #[test]
    fn decision_records_note_and_timestamp() {
        let mut store = RequestStore::new();
        store.load(requests(&["7"])).expect("load");
        let decided_at = Utc.with_ymd_and_hms(2026, 4, 2, 10, 0, 0).single().expect("valid");

        let rejected = store
            .apply_decision_at(
                &RequestId::new("7"),
                Decision::Reject,
                Some("over budget".to_string()),
                decided_at,
            )
            .expect("pending -> rejected");

        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.decided_at, Some(decided_at));
        assert_eq!(rejected.decision_note.as_deref(), Some("over budget"));
    }
}
