//! Invokes the external `emd` command.

use async_trait::async_trait;
use emd_config::ConfigHandle;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;

const INSTALL_HINT: &str =
    "Make sure 'emd' is installed and in your PATH, or set emd-path in the config file.";

/// Inputs of a single render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub document: PathBuf,
    pub props: Option<PathBuf>,
    /// Working directory of the command, the process default if `None`.
    pub cwd: Option<PathBuf>,
}

/// Outcome of a render. Failures are values, the pipeline never raises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderResult {
    Success { output: String },
    Failure { message: String },
}

impl RenderResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Interprets the output of an `emd build` process.
    pub fn from_output(output: Output) -> Self {
        if output.status.success() {
            return Self::Success {
                output: String::from_utf8_lossy(&output.stdout).into_owned(),
            };
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            return Self::failure(stderr);
        }

        match output.status.code() {
            Some(code) => Self::failure(format!("emd exited with code {code}")),
            None => Self::failure("emd was terminated by a signal"),
        }
    }

    fn launch_failure(err: &std::io::Error) -> Self {
        Self::failure(format!("Failed to run emd: {err}. {INSTALL_HINT}"))
    }
}

/// Capability of turning a template document into text.
#[async_trait]
pub trait TemplateRenderer: Send + Sync + 'static {
    async fn render(&self, request: &RenderRequest) -> RenderResult;

    /// Returns `true` if the renderer can be launched at all.
    async fn is_available(&self) -> bool;
}

/// [`TemplateRenderer`] backed by the `emd` executable.
///
/// The executable path and the timeout are read from the config on every call.
#[derive(Debug, Clone)]
pub struct EmdRenderer {
    config: ConfigHandle,
}

impl EmdRenderer {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TemplateRenderer for EmdRenderer {
    async fn render(&self, request: &RenderRequest) -> RenderResult {
        let config = self.config.load();

        let mut cmd = Command::new(&config.emd_path);
        cmd.arg("build").arg(&request.document);
        if let Some(props) = &request.props {
            cmd.arg("--props").arg(props);
        }
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(?cmd, "Spawning emd");

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                tracing::error!(?err, emd_path = %config.emd_path, "Failed to spawn emd");
                return RenderResult::launch_failure(&err);
            }
        };

        let output = match config.preview.render_timeout() {
            Some(timeout) => {
                // Dropping the timed out future drops the child, which kills it.
                match tokio::time::timeout(timeout, child.wait_with_output()).await {
                    Ok(output) => output,
                    Err(_) => {
                        tracing::warn!(document = %request.document.display(), ?timeout, "emd timed out");
                        return RenderResult::failure(format!(
                            "emd did not finish within {}ms",
                            config.preview.render_timeout_ms
                        ));
                    }
                }
            }
            None => child.wait_with_output().await,
        };

        match output {
            Ok(output) => {
                tracing::trace!(
                    status = ?output.status,
                    stdout_len = output.stdout.len(),
                    stderr_len = output.stderr.len(),
                    "emd finished"
                );
                RenderResult::from_output(output)
            }
            Err(err) => RenderResult::launch_failure(&err),
        }
    }

    async fn is_available(&self) -> bool {
        let emd_path = self.config.load().emd_path.clone();

        Command::new(&emd_path)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or_else(|err| {
                tracing::debug!(?err, %emd_path, "emd is unavailable");
                false
            })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use emd_config::Config;
    use std::path::Path;

    /// Makes `sh build <args>` run `script`, emd is swapped for `sh` and the
    /// script is named after the subcommand in the working directory.
    fn script_renderer(dir: &Path, script: &str) -> EmdRenderer {
        std::fs::write(dir.join("build"), script).unwrap();
        EmdRenderer::new(ConfigHandle::new(Config {
            emd_path: "sh".into(),
            ..Default::default()
        }))
    }

    fn request(dir: &Path, props: Option<&str>) -> RenderRequest {
        RenderRequest {
            document: PathBuf::from("intro.emd"),
            props: props.map(PathBuf::from),
            cwd: Some(dir.to_path_buf()),
        }
    }

    #[tokio::test]
    async fn test_success_returns_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = script_renderer(dir.path(), "printf '# Hi'\n");
        assert_eq!(
            renderer.render(&request(dir.path(), None)).await,
            RenderResult::Success {
                output: "# Hi".into()
            }
        );
    }

    #[tokio::test]
    async fn test_arguments_and_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = script_renderer(dir.path(), "echo \"$@\"\ntest -f build && echo in-root\n");

        let result = renderer.render(&request(dir.path(), Some("data.json"))).await;
        assert_eq!(
            result,
            RenderResult::Success {
                output: "intro.emd --props data.json\nin-root\n".into()
            }
        );

        let result = renderer.render(&request(dir.path(), None)).await;
        assert_eq!(
            result,
            RenderResult::Success {
                output: "intro.emd\nin-root\n".into()
            }
        );
    }

    #[tokio::test]
    async fn test_failure_uses_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = script_renderer(
            dir.path(),
            "echo partial\necho 'parse error at line 3' >&2\nexit 2\n",
        );
        assert_eq!(
            renderer.render(&request(dir.path(), None)).await,
            RenderResult::failure("parse error at line 3\n")
        );
    }

    #[tokio::test]
    async fn test_silent_failure_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = script_renderer(dir.path(), "exit 3\n");
        assert_eq!(
            renderer.render(&request(dir.path(), None)).await,
            RenderResult::failure("emd exited with code 3")
        );
    }

    #[tokio::test]
    async fn test_killed_by_signal() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = script_renderer(dir.path(), "kill -9 $$\n");
        assert_eq!(
            renderer.render(&request(dir.path(), None)).await,
            RenderResult::failure("emd was terminated by a signal")
        );
    }

    #[tokio::test]
    async fn test_launch_failure_is_a_value() {
        let renderer = EmdRenderer::new(ConfigHandle::new(Config {
            emd_path: "/nonexistent/bin/emd".into(),
            ..Default::default()
        }));
        let result = renderer
            .render(&RenderRequest {
                document: PathBuf::from("intro.emd"),
                props: None,
                cwd: None,
            })
            .await;

        match result {
            RenderResult::Failure { message } => {
                assert!(message.starts_with("Failed to run emd: "));
                assert!(message.ends_with(INSTALL_HINT));
            }
            other => panic!("Expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_the_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("build"), "sleep 5\n").unwrap();
        let mut config = Config {
            emd_path: "sh".into(),
            ..Default::default()
        };
        config.preview.render_timeout_ms = 50;
        let renderer = EmdRenderer::new(ConfigHandle::new(config));

        assert_eq!(
            renderer.render(&request(dir.path(), None)).await,
            RenderResult::failure("emd did not finish within 50ms")
        );
    }

    #[tokio::test]
    async fn test_config_is_read_live() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("build"), "printf ok\n").unwrap();
        let config = ConfigHandle::new(Config {
            emd_path: "/nonexistent/bin/emd".into(),
            ..Default::default()
        });
        let renderer = EmdRenderer::new(config.clone());
        assert!(!renderer.render(&request(dir.path(), None)).await.is_success());

        config.store(Config {
            emd_path: "sh".into(),
            ..Default::default()
        });
        assert!(renderer.render(&request(dir.path(), None)).await.is_success());
    }

    #[tokio::test]
    async fn test_is_available() {
        let available = |emd_path: &str| {
            EmdRenderer::new(ConfigHandle::new(Config {
                emd_path: emd_path.into(),
                ..Default::default()
            }))
        };

        assert!(available("true").is_available().await);
        assert!(!available("false").is_available().await);
        assert!(!available("/nonexistent/bin/emd").is_available().await);
    }
}
