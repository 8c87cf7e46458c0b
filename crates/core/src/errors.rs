use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{Decision, RequestId, RequestStatus};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFailure {
    EmptyRequestId,
    NoteTooLong { chars: usize, max_chars: usize },
    NoteRequired { decision: Decision },
    UnknownDecision { value: String },
    UnknownStatus { value: String },
    InconsistentDecisionTimestamp { id: String, status: RequestStatus },
}

impl ValidationFailure {
    pub fn reason(&self) -> String {
        match self {
            Self::EmptyRequestId => "request id must not be blank".to_string(),
            Self::NoteTooLong { chars, max_chars } => {
                format!("note is {chars} characters long; the limit is {max_chars}")
            }
            Self::NoteRequired { decision } => {
                format!("a note is required to {decision} a request")
            }
            Self::UnknownDecision { value } => {
                format!("unknown decision `{value}` (expected approve|reject)")
            }
            Self::UnknownStatus { value } => {
                format!("unknown status `{value}` (expected pending|approved|rejected)")
            }
            Self::InconsistentDecisionTimestamp { id, status } => {
                format!("request `{id}` is {status} but its decision timestamp disagrees")
            }
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("request `{id}` was not found")]
    NotFound { id: RequestId },
    #[error("request `{id}` cannot move from {from} to {to}")]
    InvalidTransition { id: RequestId, from: RequestStatus, to: RequestStatus },
    #[error("request id `{id}` appears more than once")]
    DuplicateId { id: RequestId },
    #[error("invalid intent: {0}")]
    Validation(ValidationFailure),
    #[error("a decision for request `{id}` is already in flight")]
    Conflict { id: RequestId },
    #[error("decision for request `{id}` timed out after {timeout_ms}ms")]
    Timeout { id: RequestId, timeout_ms: u64 },
}

impl From<ValidationFailure> for ApprovalError {
    fn from(value: ValidationFailure) -> Self {
        Self::Validation(value)
    }
}

impl ApprovalError {
    /// Inline text shown next to the affected row.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { .. } => {
                "This request no longer exists. Refresh the list and try again.".to_string()
            }
            Self::InvalidTransition { from, .. } => {
                format!("This request was already {from}; its decision is final.")
            }
            Self::DuplicateId { id } => {
                format!("The request list contains `{id}` more than once and was not loaded.")
            }
            Self::Validation(failure) => {
                let mut reason = failure.reason();
                if let Some(first) = reason.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                format!("{reason}.")
            }
            Self::Conflict { .. } => {
                "A decision for this request is already being processed.".to_string()
            }
            Self::Timeout { .. } => {
                "The decision could not be confirmed in time. The request is still pending."
                    .to_string()
            }
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::DuplicateId { .. } => "duplicate_id",
            Self::Validation(_) => "validation",
            Self::Conflict { .. } => "conflict",
            Self::Timeout { .. } => "timeout",
        }
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::NotFound { id }
            | Self::InvalidTransition { id, .. }
            | Self::DuplicateId { id }
            | Self::Conflict { id }
            | Self::Timeout { id, .. } => Some(id),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::request::{Decision, RequestId, RequestStatus};
    use crate::errors::{ApprovalError, ValidationFailure};

    #[test]
    fn validation_error_has_sentence_cased_user_message() {
        let error =
            ApprovalError::from(ValidationFailure::NoteTooLong { chars: 12, max_chars: 10 });

        assert_eq!(error.user_message(), "Note is 12 characters long; the limit is 10.");
        assert_eq!(error.error_class(), "validation");
        assert!(error.request_id().is_none());
    }

    #[test]
    fn invalid_transition_reports_current_status() {
        let error = ApprovalError::InvalidTransition {
            id: RequestId::new("1"),
            from: RequestStatus::Approved,
            to: RequestStatus::Rejected,
        };

        assert_eq!(error.to_string(), "request `1` cannot move from approved to rejected");
        assert_eq!(
            error.user_message(),
            "This request was already approved; its decision is final."
        );
    }

    #[test]
    fn timeout_message_tells_operator_request_is_still_pending() {
        let error = ApprovalError::Timeout { id: RequestId::new("7"), timeout_ms: 250 };

        assert!(error.user_message().contains("still pending"));
        assert_eq!(error.request_id(), Some(&RequestId::new("7")));
    }

    #[test]
    fn validation_failure_serializes_with_kind_tag() {
        let failure = ValidationFailure::NoteRequired { decision: Decision::Reject };
        let json = serde_json::to_value(&failure).expect("serialize failure");

        assert_eq!(json["kind"], "note_required");
        assert_eq!(json["decision"], "reject");
    }
}
