use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::request::ProductRequest;

use super::{DecisionRecord, DecisionSink, RequestSource, SinkError, SourceError};

/// Reads requests from a JSON array on disk.
#[derive(Clone, Debug)]
pub struct JsonFileRequestSource {
    path: PathBuf,
}

impl JsonFileRequestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl RequestSource for JsonFileRequestSource {
    async fn fetch(&self) -> Result<Vec<ProductRequest>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Read { path: self.path.clone(), source })?;
        serde_json::from_str(&raw).map_err(|error| SourceError::Decode(error.to_string()))
    }
}

/// Persists decisions by rewriting the matching record in the same JSON file.
#[derive(Clone, Debug)]
pub struct JsonFileDecisionSink {
    path: PathBuf,
}

impl JsonFileDecisionSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl DecisionSink for JsonFileDecisionSink {
    async fn submit(&self, record: &DecisionRecord) -> Result<(), SinkError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|error| SinkError::Unavailable(error.to_string()))?;
        let mut requests: Vec<ProductRequest> =
            serde_json::from_str(&raw).map_err(|error| SinkError::Unavailable(error.to_string()))?;

        let Some(target) = requests.iter_mut().find(|request| request.id == record.id) else {
            return Err(SinkError::Conflict(format!(
                "request `{}` is not present in `{}`",
                record.id,
                self.path.display()
            )));
        };
        target
            .decide(record.decision, record.note.clone(), record.decided_at)
            .map_err(|error| SinkError::Conflict(error.to_string()))?;

        let encoded = serde_json::to_string_pretty(&requests)
            .map_err(|error| SinkError::Unavailable(error.to_string()))?;
        let mut staging = StagingFile::new(self.path.with_extension("json.tmp"));
        tokio::fs::write(&staging.path, encoded)
            .await
            .map_err(|error| SinkError::Unavailable(error.to_string()))?;
        tokio::fs::rename(&staging.path, &self.path)
            .await
            .map_err(|error| SinkError::Unavailable(error.to_string()))?;
        staging.committed = true;

        debug!(
            event_name = "sink.decision_persisted",
            request_id = %record.id,
            path = %self.path.display(),
            "decision written to request file"
        );
        Ok(())
    }
}

/// Staging copy of the request file. Removed on drop unless it was renamed into place, so a
/// failed or cancelled submit leaves no `.json.tmp` behind.
struct StagingFile {
    path: PathBuf,
    committed: bool,
}

impl StagingFile {
    fn new(path: PathBuf) -> Self {
        Self { path, committed: false }
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.committed {
            // Absent when the write never started.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
