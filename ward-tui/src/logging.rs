//! File logging for the terminal client.
//!
//! The terminal owns stdout, so every event goes to `error_log_path`.

use crate::config::{LogFormat, TuiConfig};
use crate::error::TuiError;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV_VAR: &str = "WARD_LOG";

pub fn init_logging(config: &TuiConfig) -> Result<(), TuiError> {
    let path = &config.error_log_path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let env_filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
            .try_init(),
    };
    result.map_err(|e| TuiError::Logging(e.to_string()))?;

    tracing::info!(log_path = %path.display(), api = %config.api_base_url, "Logging initialized");
    Ok(())
}
