//! File logging for `tk`.
//!
//! Stdout carries snapshot JSON for scripts and sensors, so logs go to a daily
//! rolling file under `~/.timekeeper/logs`. When that directory cannot be
//! created, warnings and errors fall back to stderr.

use fs_err as fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "tk.log";

/// The returned guard flushes buffered lines on drop and must outlive `main`'s work.
pub fn init() -> Option<WorkerGuard> {
    let log_dir = match timekeeper_core::get_timekeeper_dir() {
        Ok(dir) => dir.join("logs"),
        Err(_) => {
            init_stderr_only();
            return None;
        }
    };

    if let Err(err) = fs::create_dir_all(&log_dir) {
        eprintln!("tk: {}, logging to stderr", err);
        init_stderr_only();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    Some(guard)
}

fn init_stderr_only() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("warn"))
        .with_writer(std::io::stderr)
        .try_init();
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
