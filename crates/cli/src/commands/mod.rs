pub mod config;
pub mod decide;
pub mod list;

use std::path::PathBuf;

use approvals_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use approvals_core::RefreshError;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config and resolves the request file, or the failure envelope to print instead.
pub(crate) fn prepare(
    command: &str,
    overrides: ConfigOverrides,
) -> Result<(AppConfig, PathBuf, Runtime), CommandResult> {
    let config = AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }).map_err(
        |error| {
            CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            )
        },
    )?;

    let Some(path) = config.source.path.clone() else {
        return Err(CommandResult::failure(
            command,
            "config_validation",
            "source.path is not configured; pass --file or set APPROVALS_SOURCE_PATH",
            2,
        ));
    };

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    Ok((config, path, runtime))
}

/// Error class and message for a failed refresh, shared by every command that loads the file.
pub(crate) fn refresh_failure(error: &RefreshError) -> (&'static str, String) {
    let error_class = match error {
        RefreshError::Source(_) => "source",
        RefreshError::Load(load_error) => load_error.error_class(),
    };
    (error_class, error.to_string())
}
