use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging to a daily rolling file in `logs_dir` and the console
///
/// Must run before any other thread exists, or timestamps fall back to UTC.
pub fn init_logging(logs_dir: &Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    // Create the directory if it doesn't exist
    std::fs::create_dir_all(logs_dir)?;

    // Create a rolling file appender that creates a new log file daily
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("game-list")
        .filename_suffix("log")
        .build(logs_dir)?;

    // Create a non-blocking writer
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The local offset is only readable while the process is single-threaded
    let timer = OffsetTime::local_rfc_3339().unwrap_or_else(|_| {
        OffsetTime::new(
            time::UtcOffset::UTC,
            time::format_description::well_known::Rfc3339,
        )
    });

    tracing_subscriber::registry()
        // File layer with full details
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_timer(timer.clone())
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        // Console layer
        .with(
            fmt::layer()
                .with_timer(timer)
                .with_target(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Logging system initialized");
    tracing::info!("Log files are being written to: {}", logs_dir.display());

    Ok(guard)
}

/// Log application shutdown
pub fn log_shutdown() {
    tracing::info!("=== Game list server shutdown complete ===");
}
