use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Log to a daily rolling file so stdout stays clean for command output.
///
/// The returned guard flushes pending lines on drop; keep it alive in `main`.
pub fn init_logging(level: LogLevel) -> Result<WorkerGuard> {
  let dir = log_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "dealdeck.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  // Base level from config, still overridable via RUST_LOG.
  let default = format!("warn,dealdeck={}", level.as_str());
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

fn log_dir() -> Result<PathBuf> {
  let base = dirs::state_dir()
    .or_else(dirs::data_dir)
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/state")))
    .ok_or_else(|| eyre!("Could not determine log directory"))?;

  Ok(base.join("dealdeck").join("logs"))
}
