pub mod monitor;

use arc_swap::ArcSwap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Error of a malformed config file.
pub use toml::de::Error as ConfigError;

static GLOBAL_CONFIG: OnceCell<ConfigHandle> = OnceCell::new();

/// Live handle to the configuration.
///
/// Every clone shares the same underlying snapshot, so a reload through any
/// clone (typically the file [`monitor`]) is observed by all the readers the
/// next time they call [`ConfigHandle::load`]. Readers must not hold on to a
/// snapshot across operations, the options are meant to be read live.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<ArcSwap<Config>>,
    file_path: Option<Arc<PathBuf>>,
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl ConfigHandle {
    /// Creates an in-memory handle which is not backed by any file.
    pub fn new(config: Config) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
            file_path: None,
        }
    }

    fn with_file(config: Config, file_path: PathBuf) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
            file_path: Some(Arc::new(file_path)),
        }
    }

    /// Returns the current snapshot.
    pub fn load(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Replaces the current snapshot.
    pub fn store(&self, config: Config) {
        self.current.store(Arc::new(config));
    }

    /// Path of the backing config file, if any.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref().map(PathBuf::as_path)
    }

    /// Re-reads the backing file.
    ///
    /// The current snapshot is kept untouched if the new content is invalid.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(file_path) = self.file_path() else {
            return Ok(());
        };

        let LoadedConfig {
            config,
            maybe_error,
        } = load_config(file_path);

        match maybe_error {
            Some(err) => Err(err),
            None => {
                tracing::debug!(path = %file_path.display(), "Config reloaded");
                self.store(config);
                Ok(())
            }
        }
    }
}

struct LoadedConfig {
    config: Config,
    maybe_error: Option<ConfigError>,
}

fn load_config(config_file: &Path) -> LoadedConfig {
    let mut maybe_error = None;

    let config = std::fs::read_to_string(config_file)
        .ok()
        .and_then(|contents| match toml::from_str(&contents) {
            Ok(config) => Some(config),
            Err(err) => {
                maybe_error.replace(err);
                None
            }
        })
        .unwrap_or_default();

    LoadedConfig {
        config,
        maybe_error,
    }
}

/// Default location of the config file.
///
/// Linux: ~/.config/emd-preview/config.toml
/// macOS: ~/Library/Application Support/emd-preview/config.toml
/// Windows: ~\AppData\Roaming\emd-preview\config.toml
pub fn default_config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("emd-preview")
        .join("config.toml")
}

/// Loads the config file and installs it as the process-wide handle.
///
/// A missing file silently yields the default config. A malformed file also
/// yields the default config and the parse error is returned so that it can
/// be reported to the user once.
pub fn load_config_on_startup(
    specified_config_file: Option<PathBuf>,
) -> (ConfigHandle, Option<ConfigError>) {
    let config_file = specified_config_file.unwrap_or_else(default_config_file);

    let LoadedConfig {
        config,
        maybe_error,
    } = load_config(&config_file);

    let handle = GLOBAL_CONFIG
        .get_or_init(|| ConfigHandle::with_file(config, config_file))
        .clone();

    (handle, maybe_error)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LogConfig {
    /// Specify the log file path.
    ///
    /// This path must be an absolute path.
    pub log_file: Option<String>,

    /// Specify the max log level.
    pub max_level: String,

    /// Specify the log target to enable more detailed logging.
    ///
    /// ```toml
    /// [log]
    /// log-target = "emd_preview_core=trace,rpc=debug"
    /// ```
    pub log_target: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            max_level: "debug".into(),
            log_target: "".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PreviewConfig {
    /// Whether to re-render the preview on every document edit.
    pub auto_refresh: bool,

    /// Kill the render command if it does not finish in time.
    ///
    /// `0` waits forever.
    pub render_timeout_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            render_timeout_ms: 60_000,
        }
    }
}

impl PreviewConfig {
    pub fn render_timeout(&self) -> Option<Duration> {
        (self.render_timeout_ms > 0).then(|| Duration::from_millis(self.render_timeout_ms))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Path or name of the `emd` executable.
    pub emd_path: String,

    /// Preview configuration.
    pub preview: PreviewConfig,

    /// Log configuration.
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            emd_path: "emd".into(),
            preview: PreviewConfig::default(),
            log: LogConfig::default(),
        }
    }
}
