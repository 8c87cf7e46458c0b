use approvals_core::config::ConfigOverrides;
use approvals_core::{
    ActionDispatcher, JsonFileDecisionSink, JsonFileRequestSource, RequestFilter, RequestStatus,
    Row, SortDirection, SortField, Workbench,
};
use serde_json::json;

use crate::commands::{prepare, refresh_failure, CommandResult};

#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub sort: Option<SortField>,
    pub descending: bool,
    pub status: Option<RequestStatus>,
    pub search: Option<String>,
    pub overrides: ConfigOverrides,
}

pub fn run(args: ListArgs) -> CommandResult {
    let (config, path, runtime) = match prepare("list", args.overrides.clone()) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let mut workbench = Workbench::new(
        JsonFileRequestSource::new(&path),
        ActionDispatcher::new(JsonFileDecisionSink::new(&path), &config.dispatch),
    );
    let view = workbench.view_mut();
    if let Some(field) = args.sort {
        let direction =
            if args.descending { SortDirection::Descending } else { SortDirection::Ascending };
        view.set_sort(field, direction);
    }
    match (args.status, args.search) {
        (Some(status), Some(query)) => {
            let search = RequestFilter::Search(query);
            view.set_filter(RequestFilter::custom(move |request| {
                request.status == status && search.matches(request)
            }));
        }
        (Some(status), None) => view.set_filter(RequestFilter::Status(status)),
        (None, Some(query)) => view.set_filter(RequestFilter::Search(query)),
        (None, None) => {}
    }

    let result = runtime.block_on(async {
        workbench.refresh().await.map_err(|error| refresh_failure(&error))?;
        Ok::<_, (&'static str, String)>((workbench.rows().await, workbench.summary().await))
    });

    match result {
        Ok((rows, summary)) => {
            let message = render_table(&rows);
            CommandResult::success_with_data(
                "list",
                message,
                Some(json!({ "summary": summary, "rows": rows })),
            )
        }
        Err((error_class, message)) => CommandResult::failure("list", error_class, message, 4),
    }
}

fn render_table(rows: &[Row]) -> String {
    if rows.is_empty() {
        return "no requests match".to_string();
    }

    rows.iter()
        .map(|row| {
            let decided = row.decided.as_deref().unwrap_or("-");
            let mut line = format!(
                "{} | {} | {} | {} | submitted {} | decided {}",
                row.id, row.status_label, row.requester, row.item, row.submitted, decided
            );
            if let Some(note) = &row.note {
                line.push_str(&format!(" | note: {note}"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
