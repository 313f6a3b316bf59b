//! Capabilities the preview needs from the editor.
//!
//! The core never talks to the editor directly, everything goes through
//! [`EditorHost`] and the [`Panel`]s it creates.

use crate::document::DocumentRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub type PanelId = u64;

/// View type of the preview panels.
pub const VIEW_TYPE: &str = "expressivemd.preview";

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("editor request {method} failed: {message}")]
    Request { method: &'static str, message: String },
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("editor is disconnected")]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewColumn {
    Active,
    Beside,
}

impl ViewColumn {
    pub fn new(side_by_side: bool) -> Self {
        if side_by_side {
            Self::Beside
        } else {
            Self::Active
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelOptions {
    pub view_type: String,
    pub title: String,
    pub column: ViewColumn,
    pub enable_scripts: bool,
    pub retain_context_when_hidden: bool,
}

impl PanelOptions {
    pub fn preview(title: String, column: ViewColumn) -> Self {
        Self {
            view_type: VIEW_TYPE.to_string(),
            title,
            column,
            enable_scripts: true,
            retain_context_when_hidden: true,
        }
    }
}

/// Webview-local locations of the panel assets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelResources {
    /// Source expression allowed by the content security policy.
    pub csp_source: String,
    pub style_uri: String,
    pub script_uri: String,
    pub codicons_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickPickItem {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub always_show: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickPickOptions {
    pub title: String,
    pub placeholder: String,
    pub match_on_description: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDialogOptions {
    pub title: String,
    pub can_select_files: bool,
    pub can_select_folders: bool,
    pub can_select_many: bool,
    /// Filter name to the accepted extensions.
    pub filters: BTreeMap<String, Vec<String>>,
}

/// A webview panel owned by exactly one preview session.
pub trait Panel: Send + Sync {
    fn id(&self) -> PanelId;

    fn resources(&self) -> &PanelResources;

    /// Replaces the whole document of the panel.
    fn set_html(&self, html: String);

    fn set_title(&self, title: String);

    fn reveal(&self, column: ViewColumn);

    fn dispose(&self);
}

#[async_trait]
pub trait EditorHost: Send + Sync + 'static {
    /// Document of the focused text editor, if any.
    fn active_document(&self) -> Option<DocumentRef>;

    async fn open_document(&self, uri: &str) -> Result<DocumentRef, HostError>;

    async fn create_panel(&self, options: PanelOptions) -> Result<Box<dyn Panel>, HostError>;

    /// First workspace folder.
    fn workspace_root(&self) -> Option<PathBuf>;

    fn show_message(&self, level: MessageLevel, text: &str);

    /// Shows a message with action buttons and returns the chosen one.
    async fn show_message_with_actions(
        &self,
        level: MessageLevel,
        text: &str,
        actions: &[&str],
    ) -> Result<Option<String>, HostError>;

    fn execute_command(&self, command: &str, arguments: Vec<Value>);

    fn open_link(&self, href: &str);

    async fn find_files(
        &self,
        include: &str,
        exclude: &str,
        limit: usize,
    ) -> Result<Vec<PathBuf>, HostError>;

    /// Returns the index of the picked item, `None` if dismissed.
    async fn show_quick_pick(
        &self,
        items: Vec<QuickPickItem>,
        options: QuickPickOptions,
    ) -> Result<Option<usize>, HostError>;

    async fn show_open_dialog(
        &self,
        options: OpenDialogOptions,
    ) -> Result<Option<PathBuf>, HostError>;
}
