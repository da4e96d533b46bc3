use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::DiagnosticsConfig;

pub struct TelemetryGuard {
    pub session_id: Uuid,
    pub log_file: PathBuf,
    _file_guard: WorkerGuard,
}

pub fn init_tracing_from_config(config: &DiagnosticsConfig) -> anyhow::Result<TelemetryGuard> {
    let log_dir = config.log_dir.as_path();
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory: {}", log_dir.display()))?;

    let session_id = Uuid::new_v4();
    let log_file = session_log_file(log_dir, &config.trace_file_prefix, Utc::now());
    let file_name = log_file
        .file_name()
        .context("session log file has no file name")?;
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.rust_log_filter));

    let stdout_layer = tracing_subscriber::fmt::layer().compact().with_target(true);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(file_writer);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
    {
        Ok(()) => info!(%session_id, log_file = %log_file.display(), "tracing initialized"),
        Err(error) => warn!(?error, "global tracing subscriber already initialized"),
    }

    Ok(TelemetryGuard {
        session_id,
        log_file,
        _file_guard: file_guard,
    })
}

fn session_log_file(log_dir: &Path, prefix: &str, started_at: DateTime<Utc>) -> PathBuf {
    log_dir.join(format!("{prefix}-{}.log", started_at.format("%Y%m%d-%H%M%S")))
}
