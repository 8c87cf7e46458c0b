use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::helpers::{ValidationRules, DEFAULT_MAX_NOTE_CHARS};

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["approvals.toml", "config/approvals.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub dispatch: DispatchConfig,
    pub source: SourceConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub decision_timeout_ms: u64,
    pub max_note_chars: usize,
    pub require_rejection_note: bool,
    pub actor: String,
}

#[derive(Clone, Debug, Default)]
pub struct SourceConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub source_path: Option<PathBuf>,
    pub decision_timeout_ms: Option<u64>,
    pub actor: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            decision_timeout_ms: 5_000,
            max_note_chars: DEFAULT_MAX_NOTE_CHARS,
            require_rejection_note: false,
            actor: "operator".to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            max_note_chars: self.max_note_chars,
            require_rejection_note: self.require_rejection_note,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            source: SourceConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(dispatch) = patch.dispatch {
            if let Some(decision_timeout_ms) = dispatch.decision_timeout_ms {
                self.dispatch.decision_timeout_ms = decision_timeout_ms;
            }
            if let Some(max_note_chars) = dispatch.max_note_chars {
                self.dispatch.max_note_chars = max_note_chars;
            }
            if let Some(require_rejection_note) = dispatch.require_rejection_note {
                self.dispatch.require_rejection_note = require_rejection_note;
            }
            if let Some(actor) = dispatch.actor {
                self.dispatch.actor = actor;
            }
        }

        if let Some(source) = patch.source {
            if let Some(path) = source.path {
                self.source.path = Some(path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("APPROVALS_DISPATCH_DECISION_TIMEOUT_MS") {
            self.dispatch.decision_timeout_ms =
                parse_u64("APPROVALS_DISPATCH_DECISION_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("APPROVALS_DISPATCH_MAX_NOTE_CHARS") {
            self.dispatch.max_note_chars =
                parse_usize("APPROVALS_DISPATCH_MAX_NOTE_CHARS", &value)?;
        }
        if let Some(value) = read_env("APPROVALS_DISPATCH_REQUIRE_REJECTION_NOTE") {
            self.dispatch.require_rejection_note =
                parse_bool("APPROVALS_DISPATCH_REQUIRE_REJECTION_NOTE", &value)?;
        }
        if let Some(value) = read_env("APPROVALS_DISPATCH_ACTOR") {
            self.dispatch.actor = value;
        }

        if let Some(value) = read_env("APPROVALS_SOURCE_PATH") {
            self.source.path = Some(PathBuf::from(value));
        }

        let log_level =
            read_env("APPROVALS_LOGGING_LEVEL").or_else(|| read_env("APPROVALS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("APPROVALS_LOGGING_FORMAT").or_else(|| read_env("APPROVALS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(source_path) = overrides.source_path {
            self.source.path = Some(source_path);
        }
        if let Some(decision_timeout_ms) = overrides.decision_timeout_ms {
            self.dispatch.decision_timeout_ms = decision_timeout_ms;
        }
        if let Some(actor) = overrides.actor {
            self.dispatch.actor = actor;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_dispatch(&self.dispatch)?;
        validate_source(&self.source)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_dispatch(dispatch: &DispatchConfig) -> Result<(), ConfigError> {
    if dispatch.decision_timeout_ms == 0 || dispatch.decision_timeout_ms > 300_000 {
        return Err(ConfigError::Validation(
            "dispatch.decision_timeout_ms must be in range 1..=300000".to_string(),
        ));
    }

    if dispatch.max_note_chars == 0 || dispatch.max_note_chars > 10_000 {
        return Err(ConfigError::Validation(
            "dispatch.max_note_chars must be in range 1..=10000".to_string(),
        ));
    }

    if dispatch.actor.trim().is_empty() {
        return Err(ConfigError::Validation("dispatch.actor must not be blank".to_string()));
    }

    Ok(())
}

fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    if let Some(path) = &source.path {
        let is_json = path.extension().map(|ext| ext.eq_ignore_ascii_case("json")).unwrap_or(false);
        if !is_json {
            return Err(ConfigError::Validation(format!(
                "source.path must point to a .json request file (got `{}`)",
                path.display()
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    dispatch: Option<DispatchPatch>,
    source: Option<SourcePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    decision_timeout_ms: Option<u64>,
    max_note_chars: Option<usize>,
    require_rejection_note: Option<bool>,
    actor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SourcePatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
