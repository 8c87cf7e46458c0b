//! Contracts for the external collaborators: where requests come from and where decisions go.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{Decision, ProductRequest, RequestId};

pub mod json_file;
pub mod memory;

pub use json_file::{JsonFileDecisionSink, JsonFileRequestSource};
pub use memory::{InMemoryDecisionSink, InMemoryRequestSource};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("could not read request file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not decode requests: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("decision conflicts with remote state: {0}")]
    Conflict(String),
    #[error("decision sink timed out")]
    Timeout,
    #[error("decision sink unavailable: {0}")]
    Unavailable(String),
}

/// The decision payload handed to a [`DecisionSink`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: RequestId,
    pub decision: Decision,
    pub note: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[async_trait]
pub trait RequestSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<ProductRequest>, SourceError>;
}

#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn submit(&self, record: &DecisionRecord) -> Result<(), SinkError>;
}
