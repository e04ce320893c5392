use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

/// Install the global subscriber: stdout always, plus a daily-rotated file
/// under `log_dir` when given. Keep the returned guard alive for the life of
/// the process or buffered file output is lost.
pub fn init(log_dir: Option<&Path>, file_prefix: &str) -> Option<WorkerGuard> {
    let stdout = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(env_filter());

    let Some(dir) = log_dir else {
        tracing_subscriber::registry().with(stdout).init();
        return None;
    };

    let appender = tracing_appender::rolling::daily(dir, format!("{file_prefix}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let file = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(env_filter());

    tracing_subscriber::registry().with(stdout).with(file).init();
    Some(guard)
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}
