use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use approvals_core::config::{AppConfig, ConfigOverrides, LoadOptions, DEFAULT_CONFIG_FILES};
use toml::Value;

pub fn run(overrides: ConfigOverrides) -> String {
    let flag_fields = flag_fields(&overrides);
    let config = match AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        if flag_fields.iter().any(|field| *field == key_path) {
            return "flag".to_string();
        }
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];

    lines.push(render_line(
        "dispatch.decision_timeout_ms",
        &config.dispatch.decision_timeout_ms.to_string(),
        source("dispatch.decision_timeout_ms", "APPROVALS_DISPATCH_DECISION_TIMEOUT_MS"),
    ));
    lines.push(render_line(
        "dispatch.max_note_chars",
        &config.dispatch.max_note_chars.to_string(),
        source("dispatch.max_note_chars", "APPROVALS_DISPATCH_MAX_NOTE_CHARS"),
    ));
    lines.push(render_line(
        "dispatch.require_rejection_note",
        &config.dispatch.require_rejection_note.to_string(),
        source("dispatch.require_rejection_note", "APPROVALS_DISPATCH_REQUIRE_REJECTION_NOTE"),
    ));
    lines.push(render_line(
        "dispatch.actor",
        &config.dispatch.actor,
        source("dispatch.actor", "APPROVALS_DISPATCH_ACTOR"),
    ));

    let source_path = config
        .source
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "source.path",
        &source_path,
        source("source.path", "APPROVALS_SOURCE_PATH"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "APPROVALS_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "APPROVALS_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn flag_fields(overrides: &ConfigOverrides) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if overrides.source_path.is_some() {
        fields.push("source.path");
    }
    if overrides.actor.is_some() {
        fields.push("dispatch.actor");
    }
    if overrides.decision_timeout_ms.is_some() {
        fields.push("dispatch.decision_timeout_ms");
    }
    if overrides.log_level.is_some() {
        fields.push("logging.level");
    }
    if overrides.log_format.is_some() {
        fields.push("logging.format");
    }
    fields
}

fn detect_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
