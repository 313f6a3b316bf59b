//! In-memory editor and renderer used by the tests.

use crate::document::{DocumentRef, LANGUAGE_ID};
use crate::emd::{RenderRequest, RenderResult, TemplateRenderer};
use crate::host::{
    EditorHost, HostError, MessageLevel, OpenDialogOptions, Panel, PanelId, PanelOptions,
    PanelResources, QuickPickItem, QuickPickOptions, ViewColumn,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// A render waiting for the test to decide its result.
#[derive(Debug)]
pub struct PendingRender {
    pub request: RenderRequest,
    responder: oneshot::Sender<RenderResult>,
}

impl PendingRender {
    pub fn resolve(self, output: &str) {
        let _ = self.responder.send(RenderResult::Success {
            output: output.into(),
        });
    }
}

#[derive(Debug)]
pub struct FakeRenderer {
    result: Mutex<RenderResult>,
    requests: Mutex<Vec<RenderRequest>>,
    gate: Option<UnboundedSender<PendingRender>>,
    available: bool,
}

impl FakeRenderer {
    fn with_result(result: RenderResult) -> Self {
        Self {
            result: Mutex::new(result),
            requests: Mutex::new(Vec::new()),
            gate: None,
            available: true,
        }
    }

    pub fn succeeding(output: &str) -> Self {
        Self::with_result(RenderResult::Success {
            output: output.into(),
        })
    }

    pub fn failing(message: &str) -> Self {
        Self::with_result(RenderResult::failure(message))
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::failing("emd exited with code 127")
        }
    }

    /// Every render blocks until the test resolves the [`PendingRender`].
    pub fn gated() -> (Self, UnboundedReceiver<PendingRender>) {
        let (tx, rx) = unbounded_channel();
        let renderer = Self {
            gate: Some(tx),
            ..Self::succeeding("")
        };
        (renderer, rx)
    }

    pub fn set_result(&self, result: RenderResult) {
        *self.result.lock() = result;
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TemplateRenderer for FakeRenderer {
    async fn render(&self, request: &RenderRequest) -> RenderResult {
        self.requests.lock().push(request.clone());

        match &self.gate {
            Some(gate) => {
                let (responder, rx) = oneshot::channel();
                let pending = PendingRender {
                    request: request.clone(),
                    responder,
                };
                if gate.send(pending).is_err() {
                    return RenderResult::failure("gate closed");
                }
                rx.await
                    .unwrap_or_else(|_| RenderResult::failure("render abandoned"))
            }
            None => self.result.lock().clone(),
        }
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}

/// Everything a [`FakePanel`] has been told to do.
#[derive(Debug, Default)]
pub struct FakePanelState {
    pub id: PanelId,
    pub options: Mutex<Option<PanelOptions>>,
    html: Mutex<String>,
    content: Mutex<String>,
    title: Mutex<String>,
    reveals: Mutex<Vec<ViewColumn>>,
    set_html_count: Mutex<usize>,
    dispose_count: Mutex<usize>,
}

impl FakePanelState {
    pub fn html(&self) -> String {
        self.html.lock().clone()
    }

    /// Inner HTML of the content container as the panel script would show it.
    pub fn content(&self) -> String {
        self.content.lock().clone()
    }

    pub fn title(&self) -> String {
        self.title.lock().clone()
    }

    pub fn reveals(&self) -> Vec<ViewColumn> {
        self.reveals.lock().clone()
    }

    pub fn set_html_count(&self) -> usize {
        *self.set_html_count.lock()
    }

    pub fn dispose_count(&self) -> usize {
        *self.dispose_count.lock()
    }
}

fn content_of(page: &str) -> String {
    const OPEN: &str = "<div class=\"content";
    const CLOSE: &str = "\n  </div>\n  <script";

    page.find(OPEN)
        .and_then(|start| {
            let body_start = start + page[start..].find(">\n    ")? + ">\n    ".len();
            let body_end = page.rfind(CLOSE)?;
            page.get(body_start..body_end)
        })
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug)]
pub struct FakePanel {
    state: Arc<FakePanelState>,
    resources: PanelResources,
}

impl Panel for FakePanel {
    fn id(&self) -> PanelId {
        self.state.id
    }

    fn resources(&self) -> &PanelResources {
        &self.resources
    }

    fn set_html(&self, html: String) {
        *self.state.content.lock() = content_of(&html);
        *self.state.html.lock() = html;
        *self.state.set_html_count.lock() += 1;
    }

    fn set_title(&self, title: String) {
        *self.state.title.lock() = title;
    }

    fn reveal(&self, column: ViewColumn) {
        self.state.reveals.lock().push(column);
    }

    fn dispose(&self) {
        *self.state.dispose_count.lock() += 1;
    }
}

#[derive(Debug, Default)]
pub struct FakeHost {
    pub active: Mutex<Option<DocumentRef>>,
    pub workspace_root: Mutex<Option<PathBuf>>,
    pub json_files: Mutex<Vec<PathBuf>>,
    /// Label of the quick pick item to choose, dismissed if `None`.
    pub pick_label: Mutex<Option<String>>,
    pub dialog_answer: Mutex<Option<PathBuf>>,
    pub action_answer: Mutex<Option<String>>,
    panels: Mutex<Vec<Arc<FakePanelState>>>,
    messages: Mutex<Vec<(MessageLevel, String)>>,
    commands: Mutex<Vec<(String, Vec<Value>)>>,
    links: Mutex<Vec<String>>,
    quick_picks: Mutex<Vec<Vec<QuickPickItem>>>,
    find_files_queries: Mutex<Vec<(String, String, usize)>>,
    opened_documents: Mutex<Vec<String>>,
}

impl FakeHost {
    /// An ExpressiveMD document at `path`.
    pub fn document(path: &str) -> DocumentRef {
        DocumentRef {
            uri: format!("file://{path}"),
            path: PathBuf::from(path),
            language_id: LANGUAGE_ID.into(),
        }
    }

    pub fn set_active(&self, document: Option<DocumentRef>) {
        *self.active.lock() = document;
    }

    pub fn panel(&self, index: usize) -> Arc<FakePanelState> {
        self.panels.lock()[index].clone()
    }

    pub fn panel_count(&self) -> usize {
        self.panels.lock().len()
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages.lock().clone()
    }

    pub fn commands(&self) -> Vec<(String, Vec<Value>)> {
        self.commands.lock().clone()
    }

    pub fn opened_links(&self) -> Vec<String> {
        self.links.lock().clone()
    }

    pub fn quick_picks(&self) -> Vec<Vec<QuickPickItem>> {
        self.quick_picks.lock().clone()
    }

    pub fn find_files_queries(&self) -> Vec<(String, String, usize)> {
        self.find_files_queries.lock().clone()
    }

    pub fn opened_documents(&self) -> Vec<String> {
        self.opened_documents.lock().clone()
    }
}

#[async_trait]
impl EditorHost for FakeHost {
    fn active_document(&self) -> Option<DocumentRef> {
        self.active.lock().clone()
    }

    /// Uris containing `missing` fail, the ones containing `slow` never resolve.
    async fn open_document(&self, uri: &str) -> Result<DocumentRef, HostError> {
        self.opened_documents.lock().push(uri.to_string());
        if uri.contains("slow") {
            std::future::pending::<()>().await;
        }

        let path = uri
            .strip_prefix("file://")
            .filter(|path| !path.contains("missing"))
            .ok_or_else(|| HostError::DocumentNotFound(uri.to_string()))?;

        let language_id = if path.ends_with(".emd") {
            LANGUAGE_ID
        } else {
            "markdown"
        };

        Ok(DocumentRef {
            uri: uri.to_string(),
            path: PathBuf::from(path),
            language_id: language_id.into(),
        })
    }

    async fn create_panel(&self, options: PanelOptions) -> Result<Box<dyn Panel>, HostError> {
        let mut panels = self.panels.lock();
        let state = Arc::new(FakePanelState {
            id: panels.len() as PanelId + 1,
            ..Default::default()
        });
        *state.title.lock() = options.title.clone();
        *state.options.lock() = Some(options);
        panels.push(state.clone());

        Ok(Box::new(FakePanel {
            state,
            resources: PanelResources {
                csp_source: "fake-webview:".into(),
                style_uri: "fake-webview:/media/preview.css".into(),
                script_uri: "fake-webview:/media/index.js".into(),
                codicons_uri: "fake-webview:/media/codicon.css".into(),
            },
        }))
    }

    fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace_root.lock().clone()
    }

    fn show_message(&self, level: MessageLevel, text: &str) {
        self.messages.lock().push((level, text.to_string()));
    }

    async fn show_message_with_actions(
        &self,
        level: MessageLevel,
        text: &str,
        _actions: &[&str],
    ) -> Result<Option<String>, HostError> {
        self.messages.lock().push((level, text.to_string()));
        Ok(self.action_answer.lock().clone())
    }

    fn execute_command(&self, command: &str, arguments: Vec<Value>) {
        self.commands.lock().push((command.to_string(), arguments));
    }

    fn open_link(&self, href: &str) {
        self.links.lock().push(href.to_string());
    }

    async fn find_files(
        &self,
        include: &str,
        exclude: &str,
        limit: usize,
    ) -> Result<Vec<PathBuf>, HostError> {
        self.find_files_queries
            .lock()
            .push((include.to_string(), exclude.to_string(), limit));
        Ok(self.json_files.lock().clone())
    }

    async fn show_quick_pick(
        &self,
        items: Vec<QuickPickItem>,
        _options: QuickPickOptions,
    ) -> Result<Option<usize>, HostError> {
        let pick_label = self.pick_label.lock().clone();
        let picked = pick_label.and_then(|label| items.iter().position(|item| item.label == label));
        self.quick_picks.lock().push(items);
        Ok(picked)
    }

    async fn show_open_dialog(
        &self,
        _options: OpenDialogOptions,
    ) -> Result<Option<PathBuf>, HostError> {
        Ok(self.dialog_answer.lock().clone())
    }
}
