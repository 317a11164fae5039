use std::str::FromStr;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self},
    layer::SubscriberExt,
};

/// Initialize the global tracing subscriber
///
/// Logs always go to stdout. When `log_folder` is not empty they are also
/// written to a daily rolling file in that folder; the returned guard must be
/// kept alive to flush it.
pub fn init_logger(log_level: &str, log_folder: &str) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = if log_folder.is_empty() {
        (None, None)
    } else {
        let file_appender = tracing_appender::rolling::daily(log_folder, "hashserve.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(true)
            .with_ansi(false)
            .with_writer(non_blocking);
        (Some(layer), Some(guard))
    };

    let stdout_layer = fmt::layer().with_target(false).with_writer(std::io::stdout);

    let env_layer = EnvFilter::from_str(log_level).unwrap_or_else(|_| "info".into());

    let collector = tracing_subscriber::registry()
        .with(env_layer)
        .with(stdout_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(collector)
        .with_context(|| "to set a global collector")?;
    Ok(guard)
}
