//! Logging setup for the command-line tools.
//!
//! Reports go to stdout, so log output defaults to stderr. The file backend
//! writes daily rolling logs; the journald backend is available on Linux and
//! falls back to stderr when the journal cannot be reached.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogBackend, LoggingConfig};

/// Initialize the logging system.
///
/// Log level can be controlled via the `FACECLOAK_LOG` environment variable:
/// - `FACECLOAK_LOG=debug` to include per-face verdicts
/// - `FACECLOAK_LOG=info` for per-image summaries (default)
/// - `FACECLOAK_LOG=warn` for engine failures only
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("FACECLOAK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    match config.backend {
        LogBackend::Stderr => init_stderr(env_filter),
        LogBackend::Journald => {
            #[cfg(target_os = "linux")]
            {
                if let Ok(journald_layer) = tracing_journald::layer() {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(journald_layer)
                        .try_init()
                        .context("Failed to set tracing subscriber")?;

                    tracing::info!("Logging initialized with journald backend");
                    return Ok(());
                }
            }

            init_stderr(env_filter)
        }
        LogBackend::File => {
            let log_dir = config.dir.clone().unwrap_or_else(|| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("facecloak")
                    .join("logs")
            });

            std::fs::create_dir_all(&log_dir)?;

            let file_appender = tracing_appender::rolling::daily(&log_dir, "facecloak.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Flushes on drop; must live for the whole process
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .try_init()
                .context("Failed to set tracing subscriber")?;

            tracing::info!("Logging initialized with file backend at {:?}", log_dir);
            Ok(())
        }
    }
}

fn init_stderr(env_filter: EnvFilter) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to set tracing subscriber")?;
    Ok(())
}
