use serde::{Deserialize, Serialize};

use crate::domain::request::{Decision, RequestId};

/// A user-triggered decision on one row, handed from the table view to the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentEvent {
    pub kind: Decision,
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl IntentEvent {
    pub fn new(kind: Decision, id: impl Into<String>) -> Self {
        Self { kind, id: RequestId::new(id), note: None }
    }

    pub fn approve(id: impl Into<String>) -> Self {
        Self::new(Decision::Approve, id)
    }

    pub fn reject(id: impl Into<String>) -> Self {
        Self::new(Decision::Reject, id)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
