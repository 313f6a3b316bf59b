use crate::Args;
use anyhow::{anyhow, Result};
use clap::Parser;
use emd_config::LogConfig;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const MAX_LOG_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// Starts the RPC service using stdio.
#[derive(Parser, Debug, Clone)]
pub struct Rpc;

impl Rpc {
    pub async fn run(&self, args: Args) -> Result<()> {
        let (config, config_err) = emd_config::load_config_on_startup(args.config_file.clone());

        let maybe_log = if let Some(log_path) = args.log {
            Some(log_path)
        } else if let Ok(log_path) = std::env::var("EMD_PREVIEW_LOG_PATH").map(PathBuf::from) {
            Some(log_path)
        } else {
            config.load().log.log_file.as_ref().map(PathBuf::from)
        };

        // The guard flushes the log file on drop, keep it until the server exits.
        let _guard = match maybe_log {
            Some(log_path) => Some(init_logging(&log_path, &config.load().log)?),
            None => None,
        };

        tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting emd-preview");

        crate::server::start(config, config_err).await;

        Ok(())
    }
}

/// Starts writing the logs to `log_path`. stdout is reserved for the RPC.
fn init_logging(
    log_path: &Path,
    log_config: &LogConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    truncate_oversized(log_path, MAX_LOG_FILE_SIZE)?;

    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow!("no file name in {log_path:?}"))?;

    let directory = log_path
        .parent()
        .ok_or_else(|| anyhow!("{log_path:?} has no parent"))?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let max_level = log_config
        .max_level
        .parse()
        .unwrap_or(tracing::Level::DEBUG);

    let builder = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_line_number(true)
        .with_writer(non_blocking)
        .with_ansi(std::io::stdout().is_terminal());

    if log_config.log_target.is_empty() {
        tracing::subscriber::set_global_default(builder.finish())?;
    } else {
        let env_filter = EnvFilter::try_new(&log_config.log_target)
            .map_err(|err| anyhow!("invalid log-target {:?}: {err}", log_config.log_target))?;
        tracing::subscriber::set_global_default(builder.with_env_filter(env_filter).finish())?;
    }

    Ok(guard)
}

/// Removes the log file if it exceeds `max_size`.
fn truncate_oversized(log_path: &Path, max_size: u64) -> std::io::Result<()> {
    if let Ok(metadata) = std::fs::metadata(log_path) {
        if metadata.is_file() && metadata.len() > max_size {
            std::fs::remove_file(log_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("emd-preview.log");

        truncate_oversized(&log_path, 4).unwrap();

        std::fs::write(&log_path, "abc").unwrap();
        truncate_oversized(&log_path, 4).unwrap();
        assert!(log_path.exists());

        std::fs::write(&log_path, "abcdef").unwrap();
        truncate_oversized(&log_path, 4).unwrap();
        assert!(!log_path.exists());
    }
}
