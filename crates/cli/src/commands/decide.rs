use approvals_core::config::ConfigOverrides;
use approvals_core::{
    ActionDispatcher, Decision, JsonFileDecisionSink, JsonFileRequestSource, RequestId, Workbench,
};
use serde_json::json;

use crate::commands::{prepare, refresh_failure, CommandResult};

#[derive(Debug, Clone)]
pub struct DecideArgs {
    pub decision: Decision,
    pub id: String,
    pub note: Option<String>,
    pub overrides: ConfigOverrides,
}

pub fn run(args: DecideArgs) -> CommandResult {
    let command = args.decision.as_str();
    let (config, path, runtime) = match prepare(command, args.overrides.clone()) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let mut workbench = Workbench::new(
        JsonFileRequestSource::new(&path),
        ActionDispatcher::new(JsonFileDecisionSink::new(&path), &config.dispatch),
    );
    let id = RequestId::new(args.id);

    let result = runtime.block_on(async {
        workbench.refresh().await.map_err(|error| {
            let (error_class, message) = refresh_failure(&error);
            (error_class, message, 4u8)
        })?;

        workbench
            .trigger(&id, args.decision, args.note)
            .await
            .map_err(|error| (error.error_class(), error.user_message(), 5u8))
    });

    match result {
        Ok(record) => CommandResult::success_with_data(
            command,
            format!("request `{}` is now {}", record.id, record.status),
            Some(json!({ "request": record })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}
