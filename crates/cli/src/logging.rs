use approvals_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use tracing::{warn, Level};

/// Installs the global subscriber. Logs go to stderr so stdout stays a clean JSON envelope.
pub fn init(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when the CLI is embedded; keep the existing one.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Loads config and installs logging from it. When loading fails, logging falls back to the
/// defaults and the failure is logged; the command still reports it in its envelope.
pub fn init_from_overrides(overrides: &ConfigOverrides) -> AppConfig {
    let options = LoadOptions { overrides: overrides.clone(), ..LoadOptions::default() };
    match AppConfig::load(options) {
        Ok(config) => {
            init(&config);
            config
        }
        Err(error) => {
            let fallback = AppConfig::default();
            init(&fallback);
            warn!(
                event_name = "cli.config_fallback",
                error = %error,
                "configuration failed to load; logging with defaults"
            );
            fallback
        }
    }
}
