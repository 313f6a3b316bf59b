use crate::emd::TemplateRenderer;
use crate::host::{EditorHost, MessageLevel};
use serde_json::json;
use std::path::Path;

const OPEN_SETTINGS: &str = "Open Settings";

/// Command asking the editor to open a file for editing.
pub const OPEN_FILE_COMMAND: &str = "vscode.open";

const UNAVAILABLE_WARNING: &str = "ExpressiveMD: The \"emd\" command was not found. \
    Preview functionality requires the emd CLI to be installed. \
    Install it or set the path in the config file (emd-path).";

/// Warns the user if the renderer cannot be launched.
///
/// Choosing `Open Settings` opens `config_file` in the editor.
pub async fn check_renderer(
    host: &dyn EditorHost,
    renderer: &dyn TemplateRenderer,
    config_file: Option<&Path>,
) -> bool {
    if renderer.is_available().await {
        return true;
    }

    tracing::warn!("emd is not available");

    match host
        .show_message_with_actions(MessageLevel::Warning, UNAVAILABLE_WARNING, &[OPEN_SETTINGS])
        .await
    {
        Ok(Some(action)) if action == OPEN_SETTINGS => match config_file {
            Some(config_file) => {
                let path = config_file.display().to_string();
                host.execute_command(OPEN_FILE_COMMAND, vec![json!(path)]);
            }
            None => tracing::debug!("No config file to open"),
        },
        Ok(_) => {}
        Err(err) => tracing::debug!(?err, "Failed to show the emd warning"),
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, FakeRenderer};

    #[tokio::test]
    async fn test_available_renderer_is_silent() {
        let host = FakeHost::default();
        assert!(check_renderer(&host, &FakeRenderer::succeeding(""), None).await);
        assert!(host.messages().is_empty());
    }

    #[tokio::test]
    async fn test_open_settings_action() {
        let host = FakeHost::default();
        let renderer = FakeRenderer::unavailable();

        assert!(!check_renderer(&host, &renderer, Some(Path::new("/cfg/config.toml"))).await);
        assert_eq!(host.messages()[0].0, MessageLevel::Warning);
        assert!(host.commands().is_empty());

        *host.action_answer.lock() = Some(OPEN_SETTINGS.into());
        check_renderer(&host, &renderer, Some(Path::new("/cfg/config.toml"))).await;
        assert_eq!(
            host.commands(),
            vec![(OPEN_FILE_COMMAND.to_string(), vec![json!("/cfg/config.toml")])]
        );
    }
}
