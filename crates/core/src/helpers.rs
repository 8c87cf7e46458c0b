//! Validation and formatting routines shared by the table view and the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::{Decision, ProductRequest, RequestStatus};
use crate::errors::ValidationFailure;
use crate::events::IntentEvent;

pub const DEFAULT_MAX_NOTE_CHARS: usize = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationRules {
    pub max_note_chars: usize,
    pub require_rejection_note: bool,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self { max_note_chars: DEFAULT_MAX_NOTE_CHARS, require_rejection_note: false }
    }
}

/// Trims a note and collapses whitespace-only input to `None`.
pub fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim).filter(|note| !note.is_empty()).map(str::to_string)
}

pub fn parse_decision(value: &str) -> Result<Decision, ValidationFailure> {
    match value.trim().to_ascii_lowercase().as_str() {
        "approve" | "approved" => Ok(Decision::Approve),
        "reject" | "rejected" => Ok(Decision::Reject),
        other => Err(ValidationFailure::UnknownDecision { value: other.to_string() }),
    }
}

/// Checks an intent against the rules and returns its normalized note.
pub fn validate_intent(
    intent: &IntentEvent,
    rules: &ValidationRules,
) -> Result<Option<String>, ValidationFailure> {
    if intent.id.0.trim().is_empty() {
        return Err(ValidationFailure::EmptyRequestId);
    }

    let note = normalize_note(intent.note.as_deref());
    if let Some(note) = &note {
        let chars = note.chars().count();
        if chars > rules.max_note_chars {
            return Err(ValidationFailure::NoteTooLong { chars, max_chars: rules.max_note_chars });
        }
    }

    if note.is_none() && intent.kind == Decision::Reject && rules.require_rejection_note {
        return Err(ValidationFailure::NoteRequired { decision: intent.kind });
    }

    Ok(note)
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn status_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "Pending",
        RequestStatus::Approved => "Approved",
        RequestStatus::Rejected => "Rejected",
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

pub fn summarize<'a>(requests: impl IntoIterator<Item = &'a ProductRequest>) -> StatusSummary {
    requests.into_iter().fold(StatusSummary::default(), |mut summary, request| {
        summary.total += 1;
        match request.status {
            RequestStatus::Pending => summary.pending += 1,
            RequestStatus::Approved => summary.approved += 1,
            RequestStatus::Rejected => summary.rejected += 1,
        }
        summary
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        format_timestamp, normalize_note, parse_decision, summarize, validate_intent,
        ValidationRules,
    };
    use crate::domain::request::{Decision, ProductRequest, RequestStatus};
    use crate::errors::ValidationFailure;
    use crate::events::IntentEvent;

    #[test]
    fn blank_notes_normalize_to_none() {
        assert_eq!(normalize_note(Some("   ")), None);
        assert_eq!(normalize_note(Some("  ok to ship ")), Some("ok to ship".to_string()));
        assert_eq!(normalize_note(None), None);
    }

    #[test]
    fn decision_parsing_accepts_verb_and_status_forms() {
        assert_eq!(parse_decision("Approve"), Ok(Decision::Approve));
        assert_eq!(parse_decision("rejected"), Ok(Decision::Reject));
        assert_eq!(
            parse_decision("escalate"),
            Err(ValidationFailure::UnknownDecision { value: "escalate".to_string() })
        );
    }

    #[test]
    fn note_length_is_counted_in_characters() {
        let rules = ValidationRules { max_note_chars: 4, require_rejection_note: false };

        let accepted = IntentEvent::approve("1").with_note("ñøté");
        assert_eq!(validate_intent(&accepted, &rules), Ok(Some("ñøté".to_string())));

        let rejected = IntentEvent::approve("1").with_note("notes");
        assert_eq!(
            validate_intent(&rejected, &rules),
            Err(ValidationFailure::NoteTooLong { chars: 5, max_chars: 4 })
        );
    }

    #[test]
    fn rejection_note_requirement_only_applies_to_rejections() {
        let rules = ValidationRules { require_rejection_note: true, ..ValidationRules::default() };

        assert_eq!(validate_intent(&IntentEvent::approve("1"), &rules), Ok(None));
        assert_eq!(
            validate_intent(&IntentEvent::reject("1").with_note("  "), &rules),
            Err(ValidationFailure::NoteRequired { decision: Decision::Reject })
        );
    }

    #[test]
    fn blank_request_id_is_rejected() {
        assert_eq!(
            validate_intent(&IntentEvent::approve(" "), &ValidationRules::default()),
            Err(ValidationFailure::EmptyRequestId)
        );
    }

    #[test]
    fn timestamps_render_in_utc_minutes() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 14, 3, 59).single().expect("valid timestamp");
        assert_eq!(format_timestamp(&at), "2026-01-05 14:03 UTC");
    }

    #[test]
    fn summary_counts_each_status() {
        let submitted = Utc::now();
        let mut approved = ProductRequest::pending("2", "Lee", "Monitor", submitted);
        approved.status = RequestStatus::Approved;
        approved.decided_at = Some(submitted);
        let requests = vec![ProductRequest::pending("1", "Kim", "Chair", submitted), approved];

        let summary = summarize(&requests);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.rejected, 0);
    }
}
