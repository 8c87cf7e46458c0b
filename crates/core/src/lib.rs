pub mod audit;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod events;
pub mod helpers;
pub mod store;
pub mod table;
pub mod workbench;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use collaborators::{
    DecisionRecord, DecisionSink, InMemoryDecisionSink, InMemoryRequestSource,
    JsonFileDecisionSink, JsonFileRequestSource, RequestSource, SinkError, SourceError,
};
pub use dispatcher::ActionDispatcher;
pub use domain::request::{Decision, ProductRequest, RequestId, RequestStatus};
pub use errors::{ApprovalError, ValidationFailure};
pub use events::IntentEvent;
pub use helpers::{StatusSummary, ValidationRules};
pub use store::RequestStore;
pub use table::{RequestFilter, Row, SortDirection, SortField, TableView};
pub use workbench::{RefreshError, Workbench};
