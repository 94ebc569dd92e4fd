use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to stderr. Used by the non-interactive commands.
pub fn init_stderr() {
    let layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter());
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

/// Log to a file so the terminal UI is left alone. Keep the guard alive
/// until exit or buffered lines are lost.
pub fn init_file(path: &Path) -> Option<WorkerGuard> {
    let dir = path.parent()?;
    let name = path.file_name()?;
    if std::fs::create_dir_all(dir).is_err() {
        return None;
    }
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter());
    tracing_subscriber::registry().with(layer).try_init().ok()?;
    Some(guard)
}
