use std::collections::VecDeque;

use tokio::sync::{Mutex, RwLock};

use crate::domain::request::ProductRequest;

use super::{DecisionRecord, DecisionSink, RequestSource, SinkError, SourceError};

#[derive(Default)]
pub struct InMemoryRequestSource {
    requests: RwLock<Vec<ProductRequest>>,
}

impl InMemoryRequestSource {
    pub fn new(requests: Vec<ProductRequest>) -> Self {
        Self { requests: RwLock::new(requests) }
    }

    pub async fn replace(&self, requests: Vec<ProductRequest>) {
        *self.requests.write().await = requests;
    }
}

#[async_trait::async_trait]
impl RequestSource for InMemoryRequestSource {
    async fn fetch(&self) -> Result<Vec<ProductRequest>, SourceError> {
        Ok(self.requests.read().await.clone())
    }
}

/// Records accepted decisions and rejects a second decision for the same request.
#[derive(Default)]
pub struct InMemoryDecisionSink {
    decisions: Mutex<Vec<DecisionRecord>>,
    scripted_failures: Mutex<VecDeque<SinkError>>,
}

impl InMemoryDecisionSink {
    pub async fn decisions(&self) -> Vec<DecisionRecord> {
        self.decisions.lock().await.clone()
    }

    /// Queues an error returned by the next submission instead of recording it.
    pub async fn fail_next(&self, error: SinkError) {
        self.scripted_failures.lock().await.push_back(error);
    }
}

#[async_trait::async_trait]
impl DecisionSink for InMemoryDecisionSink {
    async fn submit(&self, record: &DecisionRecord) -> Result<(), SinkError> {
        if let Some(error) = self.scripted_failures.lock().await.pop_front() {
            return Err(error);
        }

        let mut decisions = self.decisions.lock().await;
        if decisions.iter().any(|existing| existing.id == record.id) {
            return Err(SinkError::Conflict(format!("request `{}` already decided", record.id)));
        }
        decisions.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::collaborators::{
        DecisionRecord, DecisionSink, InMemoryDecisionSink, InMemoryRequestSource, RequestSource,
        SinkError,
    };
    use crate::domain::request::{Decision, ProductRequest, RequestId};

    fn record(id: &str, decision: Decision) -> DecisionRecord {
        DecisionRecord { id: RequestId::new(id), decision, note: None, decided_at: Utc::now() }
    }

    #[tokio::test]
    async fn source_returns_replaced_requests() {
        let source = InMemoryRequestSource::default();
        assert!(source.fetch().await.expect("fetch empty").is_empty());

        let requests = vec![ProductRequest::pending("1", "Ana", "Keyboard", Utc::now())];
        source.replace(requests.clone()).await;

        assert_eq!(source.fetch().await.expect("fetch"), requests);
    }

    #[tokio::test]
    async fn sink_rejects_second_decision_for_same_request() {
        let sink = InMemoryDecisionSink::default();
        sink.submit(&record("1", Decision::Approve)).await.expect("first decision");

        let error = sink.submit(&record("1", Decision::Reject)).await.expect_err("second");
        assert!(matches!(error, SinkError::Conflict(_)));
        assert_eq!(sink.decisions().await.len(), 1);
    }

    #[tokio::test]
    async fn scripted_failure_is_returned_once() {
        let sink = InMemoryDecisionSink::default();
        sink.fail_next(SinkError::Unavailable("maintenance".to_string())).await;

        assert!(sink.submit(&record("2", Decision::Approve)).await.is_err());
        assert!(sink.submit(&record("2", Decision::Approve)).await.is_ok());
    }
}
