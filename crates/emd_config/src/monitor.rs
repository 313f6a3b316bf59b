//! Reloads the config file whenever it changes on disk.

use crate::ConfigHandle;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Sender;

const DEBOUNCE_DELAY: Duration = Duration::from_millis(10);

/// The fallback for `RecommendedWatcher` polling.
const FALLBACK_POLLING_TIMEOUT: Duration = Duration::from_secs(1);

/// Spawns the `config-watcher` thread.
///
/// `sender` is notified after each successful reload. Nothing is spawned if the
/// handle is not backed by a regular file.
pub fn watch(handle: ConfigHandle, sender: Sender<()>) {
    let Some(config_file) = handle.file_path().map(PathBuf::from) else {
        return;
    };

    // Call `metadata` to resolve symbolic links, `/dev/null` and friends are skipped.
    if !config_file
        .metadata()
        .map_or(false, |metadata| metadata.file_type().is_file())
    {
        return;
    }

    let path = match config_file.canonicalize() {
        Ok(canonical_path) => match config_file.symlink_metadata() {
            Ok(metadata) if metadata.file_type().is_symlink() => canonical_path,
            _ => config_file,
        },
        Err(_) => return,
    };

    let (tx, rx) = mpsc::channel();
    let mut watcher = match RecommendedWatcher::new(
        tx,
        Config::default().with_poll_interval(FALLBACK_POLLING_TIMEOUT),
    ) {
        Ok(watcher) => watcher,
        Err(err) => {
            tracing::error!(?err, "Unable to watch config file");
            return;
        }
    };

    let spawn_result = std::thread::Builder::new()
        .name("config-watcher".into())
        .spawn(move || {
            if let Err(err) = watcher.watch(&path, RecursiveMode::NonRecursive) {
                tracing::debug!(?err, ?path, "Unable to watch config file");
                return;
            }

            let mut debouncing_deadline: Option<Instant> = None;
            let mut touched = false;

            loop {
                let event = match debouncing_deadline {
                    Some(deadline) => {
                        rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                    }
                    None => {
                        let event = rx.recv().map_err(|_| RecvTimeoutError::Disconnected);
                        debouncing_deadline.replace(Instant::now() + DEBOUNCE_DELAY);
                        event
                    }
                };

                match event {
                    Ok(Ok(event)) => {
                        let is_change = matches!(
                            event.kind,
                            EventKind::Any
                                | EventKind::Create(_)
                                | EventKind::Modify(_)
                                | EventKind::Other
                        );
                        if is_change && event.paths.iter().any(|p| p == &path) {
                            touched = true;
                        }
                    }
                    Ok(Err(err)) => {
                        tracing::debug!(?err, "Config watcher error");
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        debouncing_deadline = None;

                        if std::mem::take(&mut touched) {
                            match handle.reload() {
                                Ok(()) => {
                                    let _ = sender.try_send(());
                                }
                                Err(err) => {
                                    tracing::warn!(%err, "Ignored invalid config file change");
                                }
                            }
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        tracing::debug!("Config watcher channel closed");
                        break;
                    }
                }
            }
        });

    if let Err(err) = spawn_result {
        tracing::error!(?err, "Failed to spawn config-watcher thread");
    }
}
