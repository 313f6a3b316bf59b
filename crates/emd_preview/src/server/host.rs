//! [`EditorHost`] backed by the JSON-RPC connection to the editor.

use async_trait::async_trait;
use emd_preview_core::host::{
    MessageLevel, OpenDialogOptions, PanelOptions, QuickPickItem, QuickPickOptions,
};
use emd_preview_core::{
    DocumentRef, EditorHost, HostError, Panel, PanelId, PanelResources, ViewColumn,
};
use parking_lot::Mutex;
use rpc::{RpcClient, RpcError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Editor state pushed to the backend by notifications.
#[derive(Debug, Default)]
struct EditorState {
    workspace_root: Option<PathBuf>,
    active_document: Option<DocumentRef>,
    panel_resources: PanelResources,
}

#[derive(Debug)]
pub struct RpcHost {
    rpc_client: Arc<RpcClient>,
    state: Mutex<EditorState>,
    next_panel_id: AtomicU64,
}

fn notify(rpc_client: &RpcClient, method: &'static str, params: impl Serialize) {
    if let Err(err) = rpc_client.notify(method, params) {
        tracing::error!(?err, method, "Failed to notify the editor");
    }
}

impl RpcHost {
    pub fn new(rpc_client: Arc<RpcClient>) -> Self {
        Self {
            rpc_client,
            state: Mutex::new(EditorState::default()),
            next_panel_id: AtomicU64::new(1),
        }
    }

    pub fn initialize(
        &self,
        workspace_root: Option<PathBuf>,
        active_document: Option<DocumentRef>,
        panel_resources: Option<PanelResources>,
    ) {
        let mut state = self.state.lock();
        state.workspace_root = workspace_root;
        state.active_document = active_document;
        if let Some(panel_resources) = panel_resources {
            state.panel_resources = panel_resources;
        }
    }

    pub fn set_active_document(&self, document: Option<DocumentRef>) {
        self.state.lock().active_document = document;
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: impl Serialize,
    ) -> Result<R, HostError> {
        self.rpc_client
            .request(method, params)
            .await
            .map_err(|err| match err {
                RpcError::OneshotRecv(_) | RpcError::SendRawMessage(_) | RpcError::SendRequest(_) => {
                    HostError::Disconnected
                }
                err => HostError::Request {
                    method,
                    message: err.to_string(),
                },
            })
    }
}

#[async_trait]
impl EditorHost for RpcHost {
    fn active_document(&self) -> Option<DocumentRef> {
        self.state.lock().active_document.clone()
    }

    async fn open_document(&self, uri: &str) -> Result<DocumentRef, HostError> {
        self.request::<Option<DocumentRef>>("workspace/openTextDocument", json!({ "uri": uri }))
            .await?
            .ok_or_else(|| HostError::DocumentNotFound(uri.to_string()))
    }

    async fn create_panel(&self, options: PanelOptions) -> Result<Box<dyn Panel>, HostError> {
        let panel_id = self.next_panel_id.fetch_add(1, Ordering::SeqCst);

        #[derive(Serialize)]
        struct CreatePanel<'a> {
            panel_id: PanelId,
            #[serde(flatten)]
            options: &'a PanelOptions,
        }

        self.rpc_client
            .notify(
                "panel/create",
                CreatePanel {
                    panel_id,
                    options: &options,
                },
            )
            .map_err(|_| HostError::Disconnected)?;

        Ok(Box::new(RpcPanel {
            id: panel_id,
            rpc_client: self.rpc_client.clone(),
            resources: self.state.lock().panel_resources.clone(),
        }))
    }

    fn workspace_root(&self) -> Option<PathBuf> {
        self.state.lock().workspace_root.clone()
    }

    fn show_message(&self, level: MessageLevel, text: &str) {
        notify(
            &self.rpc_client,
            "window/showMessage",
            json!({ "level": level, "message": text }),
        );
    }

    async fn show_message_with_actions(
        &self,
        level: MessageLevel,
        text: &str,
        actions: &[&str],
    ) -> Result<Option<String>, HostError> {
        self.request(
            "window/showMessageRequest",
            json!({ "level": level, "message": text, "actions": actions }),
        )
        .await
    }

    fn execute_command(&self, command: &str, arguments: Vec<Value>) {
        notify(
            &self.rpc_client,
            "command/execute",
            json!({ "command": command, "arguments": arguments }),
        );
    }

    fn open_link(&self, href: &str) {
        notify(&self.rpc_client, "env/openExternal", json!({ "href": href }));
    }

    async fn find_files(
        &self,
        include: &str,
        exclude: &str,
        limit: usize,
    ) -> Result<Vec<PathBuf>, HostError> {
        self.request(
            "workspace/findFiles",
            json!({ "include": include, "exclude": exclude, "limit": limit }),
        )
        .await
    }

    async fn show_quick_pick(
        &self,
        items: Vec<QuickPickItem>,
        options: QuickPickOptions,
    ) -> Result<Option<usize>, HostError> {
        self.request(
            "window/showQuickPick",
            json!({ "items": items, "options": options }),
        )
        .await
    }

    async fn show_open_dialog(
        &self,
        options: OpenDialogOptions,
    ) -> Result<Option<PathBuf>, HostError> {
        self.request("window/showOpenDialog", options).await
    }
}

/// Webview panel living in the editor.
#[derive(Debug)]
pub struct RpcPanel {
    id: PanelId,
    rpc_client: Arc<RpcClient>,
    resources: PanelResources,
}

impl Panel for RpcPanel {
    fn id(&self) -> PanelId {
        self.id
    }

    fn resources(&self) -> &PanelResources {
        &self.resources
    }

    fn set_html(&self, html: String) {
        notify(
            &self.rpc_client,
            "panel/setHtml",
            json!({ "panel_id": self.id, "html": html }),
        );
    }

    fn set_title(&self, title: String) {
        notify(
            &self.rpc_client,
            "panel/setTitle",
            json!({ "panel_id": self.id, "title": title }),
        );
    }

    fn reveal(&self, column: ViewColumn) {
        notify(
            &self.rpc_client,
            "panel/reveal",
            json!({ "panel_id": self.id, "column": column }),
        );
    }

    fn dispose(&self) {
        notify(
            &self.rpc_client,
            "panel/dispose",
            json!({ "panel_id": self.id }),
        );
    }
}
