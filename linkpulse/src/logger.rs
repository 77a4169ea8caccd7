use crate::config::LogConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "linkpulse=info,tower_http=info";

/// Base name of the daily log files, e.g. `linkpulse.log.2025-03-01`.
const LOG_FILE_PREFIX: &str = "linkpulse.log";

// RUST_LOG wins over the configured filter, which wins over the default.
fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER))
    })
}

// Daily rolling files under `directory` when set, stdout otherwise.
fn writer(config: &LogConfig) -> (NonBlocking, WorkerGuard) {
    match &config.directory {
        Some(dir) => {
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    }
}

pub fn init(config: &LogConfig) -> WorkerGuard {
    let (non_blocking_writer, guard) = writer(config);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_line_number(true)
                .with_ansi(config.directory.is_none())
                .with_writer(non_blocking_writer),
        )
        .with(filter(config))
        .init();

    // Dropping the guard flushes pending lines and stops the writer thread.
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_writer_creates_daily_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            filter: None,
            directory: Some(dir.path().to_path_buf()),
        };

        let (mut writer, guard) = writer(&config);
        writer.write_all(b"hello from the log\n").unwrap();
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with(LOG_FILE_PREFIX));

        let content = std::fs::read_to_string(dir.path().join(&files[0])).unwrap();
        assert_eq!(content, "hello from the log\n");
    }

    #[test]
    fn test_configured_filter_is_used() {
        let config = LogConfig {
            filter: Some("linkpulse=debug".to_string()),
            directory: None,
        };
        // only meaningful when RUST_LOG is not set for the test run
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(filter(&config).to_string(), "linkpulse=debug");
            assert_eq!(
                filter(&LogConfig::default()).to_string(),
                EnvFilter::new(DEFAULT_FILTER).to_string()
            );
        }
    }
}
