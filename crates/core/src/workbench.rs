use thiserror::Error;
use tracing::info;

use crate::collaborators::{DecisionSink, RequestSource, SourceError};
use crate::dispatcher::ActionDispatcher;
use crate::domain::request::{Decision, ProductRequest, RequestId};
use crate::errors::ApprovalError;
use crate::helpers::{self, StatusSummary};
use crate::table::{Row, TableView};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Load(#[from] ApprovalError),
}

/// One operator session: a request source, the table view and the dispatcher that owns the
/// store.
pub struct Workbench<R, S> {
    source: R,
    dispatcher: ActionDispatcher<S>,
    view: TableView,
}

impl<R, S> Workbench<R, S>
where
    R: RequestSource,
    S: DecisionSink,
{
    pub fn new(source: R, dispatcher: ActionDispatcher<S>) -> Self {
        Self { source, dispatcher, view: TableView::new() }
    }

    pub fn view(&self) -> &TableView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut TableView {
        &mut self.view
    }

    pub fn dispatcher(&self) -> &ActionDispatcher<S> {
        &self.dispatcher
    }

    /// Pulls the latest requests from the source into the store; returns the record count.
    pub async fn refresh(&self) -> Result<usize, RefreshError> {
        let requests = self.source.fetch().await?;
        let count = requests.len();
        self.dispatcher.load(requests).await?;
        info!(event_name = "workbench.refreshed", record_count = count, "requests refreshed");
        Ok(count)
    }

    pub async fn rows(&self) -> Vec<Row> {
        self.view.render(&self.dispatcher.snapshot().await)
    }

    pub async fn summary(&self) -> StatusSummary {
        helpers::summarize(&self.dispatcher.snapshot().await)
    }

    pub async fn trigger(
        &mut self,
        id: &RequestId,
        kind: Decision,
        note: Option<String>,
    ) -> Result<ProductRequest, ApprovalError> {
        let intent = self.view.trigger(id, kind, note)?;
        let outcome = self.dispatcher.handle(intent.clone()).await;
        self.view.resolve(&intent, &outcome);
        outcome
    }

    /// Applies one decision to every selected row; outcomes follow selection order.
    pub async fn trigger_selected(
        &mut self,
        kind: Decision,
        note: Option<String>,
    ) -> Vec<(RequestId, Result<ProductRequest, ApprovalError>)> {
        let intents = self.view.trigger_selected(kind, note);
        let mut outcomes = Vec::with_capacity(intents.len());
        for intent in intents {
            let outcome = self.dispatcher.handle(intent.clone()).await;
            self.view.resolve(&intent, &outcome);
            outcomes.push((intent.id, outcome));
        }
        outcomes
    }
}
