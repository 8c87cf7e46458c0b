//! Display model for the request table: sorting, filtering, selection and per-row state.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::request::{Decision, ProductRequest, RequestId, RequestStatus};
use crate::errors::ApprovalError;
use crate::events::IntentEvent;
use crate::helpers::{format_timestamp, status_label};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    Requester,
    Item,
    Status,
    SubmittedAt,
    DecidedAt,
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "id" => Ok(Self::Id),
            "requester" => Ok(Self::Requester),
            "item" => Ok(Self::Item),
            "status" => Ok(Self::Status),
            "submitted" | "submitted_at" => Ok(Self::SubmittedAt),
            "decided" | "decided_at" => Ok(Self::DecidedAt),
            other => Err(format!(
                "unknown sort field `{other}` (expected id|requester|item|status|submitted_at|decided_at)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

pub type RequestPredicate = Arc<dyn Fn(&ProductRequest) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub enum RequestFilter {
    #[default]
    All,
    Status(RequestStatus),
    /// Case-insensitive substring match on id, requester and item.
    Search(String),
    Custom(RequestPredicate),
}

impl RequestFilter {
    pub fn custom(predicate: impl Fn(&ProductRequest) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, request: &ProductRequest) -> bool {
        match self {
            Self::All => true,
            Self::Status(status) => request.status == *status,
            Self::Search(query) => {
                let query = query.trim().to_lowercase();
                query.is_empty()
                    || request.id.as_str().to_lowercase().contains(&query)
                    || request.requester.to_lowercase().contains(&query)
                    || request.item.to_lowercase().contains(&query)
            }
            Self::Custom(predicate) => predicate(request),
        }
    }
}

impl fmt::Debug for RequestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Status(status) => f.debug_tuple("Status").field(status).finish(),
            Self::Search(query) => f.debug_tuple("Search").field(query).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Row {
    pub id: RequestId,
    pub requester: String,
    pub item: String,
    pub status: RequestStatus,
    pub status_label: &'static str,
    pub submitted: String,
    pub decided: Option<String>,
    pub note: Option<String>,
    pub selected: bool,
    pub in_flight: bool,
    /// Whether approve/reject controls are enabled for the row.
    pub actionable: bool,
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct TableView {
    sort: Option<(SortField, SortDirection)>,
    filter: RequestFilter,
    selected: BTreeSet<RequestId>,
    /// Outstanding intent per row; at most one.
    in_flight: BTreeMap<RequestId, IntentEvent>,
    messages: HashMap<RequestId, String>,
}

impl TableView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sort(&mut self, field: SortField, direction: SortDirection) {
        self.sort = Some((field, direction));
    }

    /// Falls back to store order.
    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    pub fn sort(&self) -> Option<(SortField, SortDirection)> {
        self.sort
    }

    pub fn set_filter(&mut self, filter: RequestFilter) {
        self.filter = filter;
    }

    /// Returns whether the id is selected after the toggle.
    pub fn toggle_select(&mut self, id: &RequestId) -> bool {
        if self.selected.remove(id) {
            return false;
        }
        self.selected.insert(id.clone());
        true
    }

    pub fn selected(&self) -> &BTreeSet<RequestId> {
        &self.selected
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn is_in_flight(&self, id: &RequestId) -> bool {
        self.in_flight.contains_key(id)
    }

    /// Emits the intent for a row action and marks the row as in flight.
    ///
    /// A row with an outstanding intent refuses further actions with `Conflict` until that
    /// intent is resolved.
    pub fn trigger(
        &mut self,
        id: &RequestId,
        kind: Decision,
        note: Option<String>,
    ) -> Result<IntentEvent, ApprovalError> {
        if self.in_flight.contains_key(id) {
            return Err(ApprovalError::Conflict { id: id.clone() });
        }
        let intent = IntentEvent { kind, id: id.clone(), note };
        self.in_flight.insert(id.clone(), intent.clone());
        self.messages.remove(id);
        Ok(intent)
    }

    /// Emits one intent per selected row that is not already in flight.
    pub fn trigger_selected(&mut self, kind: Decision, note: Option<String>) -> Vec<IntentEvent> {
        let targets: Vec<RequestId> =
            self.selected.iter().filter(|id| !self.in_flight.contains_key(*id)).cloned().collect();
        targets.iter().filter_map(|id| self.trigger(id, kind, note.clone()).ok()).collect()
    }

    /// Feeds the dispatcher outcome back so the row leaves the in-flight state.
    ///
    /// Only the row's outstanding intent releases it; an outcome for any other intent (such as
    /// a `Conflict` refusal) leaves the row in flight. Failures become an inline message; the
    /// row itself keeps rendering from the store, which still holds its pre-intent state.
    pub fn resolve(
        &mut self,
        intent: &IntentEvent,
        outcome: &Result<ProductRequest, ApprovalError>,
    ) {
        if self.in_flight.get(&intent.id) == Some(intent) {
            self.in_flight.remove(&intent.id);
        }
        match outcome {
            Ok(_) => {
                self.messages.remove(&intent.id);
                self.selected.remove(&intent.id);
            }
            Err(error) => {
                self.messages.insert(intent.id.clone(), error.user_message());
            }
        }
    }

    pub fn message(&self, id: &RequestId) -> Option<&str> {
        self.messages.get(id).map(String::as_str)
    }

    pub fn render(&self, snapshot: &[ProductRequest]) -> Vec<Row> {
        let mut visible: Vec<&ProductRequest> =
            snapshot.iter().filter(|request| self.filter.matches(request)).collect();

        if let Some((field, direction)) = self.sort {
            visible.sort_by(|left, right| compare(left, right, field, direction));
        }

        visible.into_iter().map(|request| self.row(request)).collect()
    }

    fn row(&self, request: &ProductRequest) -> Row {
        let in_flight = self.in_flight.contains_key(&request.id);
        Row {
            id: request.id.clone(),
            requester: request.requester.clone(),
            item: request.item.clone(),
            status: request.status,
            status_label: status_label(request.status),
            submitted: format_timestamp(&request.submitted_at),
            decided: request.decided_at.as_ref().map(format_timestamp),
            note: request.decision_note.clone(),
            selected: self.selected.contains(&request.id),
            in_flight,
            actionable: request.is_pending() && !in_flight,
            message: self.messages.get(&request.id).cloned(),
        }
    }
}

/// Primary key honours the direction; ties fall back to submission time then id, both ascending.
fn compare(
    left: &ProductRequest,
    right: &ProductRequest,
    field: SortField,
    direction: SortDirection,
) -> Ordering {
    let primary = match field {
        SortField::Id => left.id.cmp(&right.id),
        SortField::Requester => compare_text(&left.requester, &right.requester),
        SortField::Item => compare_text(&left.item, &right.item),
        SortField::Status => left.status.cmp(&right.status),
        SortField::SubmittedAt => left.submitted_at.cmp(&right.submitted_at),
        SortField::DecidedAt => left.decided_at.cmp(&right.decided_at),
    };
    let primary = match direction {
        SortDirection::Ascending => primary,
        SortDirection::Descending => primary.reverse(),
    };

    primary
        .then_with(|| left.submitted_at.cmp(&right.submitted_at))
        .then_with(|| left.id.cmp(&right.id))
}

fn compare_text(left: &str, right: &str) -> Ordering {
    left.to_lowercase().cmp(&right.to_lowercase()).then_with(|| left.cmp(right))
}
