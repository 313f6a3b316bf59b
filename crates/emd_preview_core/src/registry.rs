//! Owner of every preview session.
//!
//! The registry lives on a single task, all the mutations of the session table
//! happen in [`SessionRegistry::run`]. Document opening, renders and user
//! pickers run on their own tasks and report back through channels.

use crate::active::{self, ActiveEvent};
use crate::document::{DocumentId, DocumentRef};
use crate::emd::TemplateRenderer;
use crate::host::{EditorHost, MessageLevel, Panel, PanelId, PanelOptions, ViewColumn};
use crate::markdown::MarkdownConverter;
use crate::props::{self, PropsSelection};
use crate::protocol::PanelMessage;
use crate::session::{
    DisplayMode, PreviewSession, RenderCompletion, RenderPipeline, SessionId,
};
use emd_config::ConfigHandle;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

const NO_FILE_TO_PREVIEW: &str = "No ExpressiveMD file to preview";
const NO_ACTIVE_PREVIEW: &str = "No active ExpressiveMD preview";

/// Inputs of the registry loop.
#[derive(Debug)]
pub enum RegistryEvent {
    ShowPreview {
        uri: Option<String>,
        side_by_side: bool,
    },
    RefreshPreview,
    SelectPropsFile,
    SetPropsFile(Option<PathBuf>),
    ClearPropsFile,
    DocumentChanged(DocumentId),
    DocumentClosed(DocumentId),
    ActiveEditorChanged(Option<DocumentRef>),
    PanelMessage {
        panel_id: PanelId,
        message: PanelMessage,
    },
    PanelDisposed(PanelId),
    PreviewOpened(OpenedPreview),
    QueryActive(oneshot::Sender<Option<PreviewState>>),
    Shutdown,
}

/// Document and panel of a new preview, opened off the registry loop.
pub struct OpenedPreview {
    requested: DocumentId,
    column: ViewColumn,
    opened: Option<(DocumentRef, Box<dyn Panel>)>,
}

impl std::fmt::Debug for OpenedPreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedPreview")
            .field("requested", &self.requested)
            .field("column", &self.column)
            .field("panel", &self.opened.as_ref().map(|(_, panel)| panel.id()))
            .finish()
    }
}

/// Opens `uri` and creates its panel, failures are reported to the user.
async fn open_preview(
    host: &dyn EditorHost,
    uri: &str,
    column: ViewColumn,
) -> Option<(DocumentRef, Box<dyn Panel>)> {
    let document = match host.open_document(uri).await {
        Ok(document) => document,
        Err(err) => {
            tracing::error!(?err, %uri, "Failed to open document");
            host.show_message(MessageLevel::Error, &format!("Failed to open {uri}: {err}"));
            return None;
        }
    };

    let title = format!("Preview: {}", document.file_name());
    match host.create_panel(PanelOptions::preview(title, column)).await {
        Ok(panel) => Some((document, panel)),
        Err(err) => {
            tracing::error!(?err, %uri, "Failed to create preview panel");
            host.show_message(
                MessageLevel::Error,
                &format!("Failed to create the preview panel: {err}"),
            );
            None
        }
    }
}

/// Snapshot of a session for the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewState {
    pub document: DocumentId,
    pub panel_id: PanelId,
    pub props_file: Option<PathBuf>,
    pub display_mode: DisplayMode,
}

impl From<&PreviewSession> for PreviewState {
    fn from(session: &PreviewSession) -> Self {
        Self {
            document: session.document().id(),
            panel_id: session.panel_id(),
            props_file: session.props_file().map(PathBuf::from),
            display_mode: session.display_mode(),
        }
    }
}

pub struct SessionRegistry {
    pipeline: RenderPipeline,
    config: ConfigHandle,
    sessions: HashMap<DocumentId, PreviewSession>,
    /// Documents whose preview is being opened.
    opening: HashSet<DocumentId>,
    active: Option<DocumentId>,
    next_session_id: SessionId,
    completion_receiver: UnboundedReceiver<RenderCompletion>,
    event_sender: UnboundedSender<RegistryEvent>,
    event_receiver: UnboundedReceiver<RegistryEvent>,
}

impl SessionRegistry {
    pub fn new(
        host: Arc<dyn EditorHost>,
        renderer: Arc<dyn TemplateRenderer>,
        converter: Arc<dyn MarkdownConverter>,
        config: ConfigHandle,
    ) -> Self {
        let (completion_sender, completion_receiver) = unbounded_channel();
        let (event_sender, event_receiver) = unbounded_channel();

        Self {
            pipeline: RenderPipeline {
                host,
                renderer,
                converter,
                completion_sender,
            },
            config,
            sessions: HashMap::new(),
            opening: HashSet::new(),
            active: None,
            next_session_id: 0,
            completion_receiver,
            event_sender,
            event_receiver,
        }
    }

    /// Returns the sender feeding [`Self::run`].
    pub fn event_sender(&self) -> UnboundedSender<RegistryEvent> {
        self.event_sender.clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, document: &DocumentId) -> Option<&PreviewSession> {
        self.sessions.get(document)
    }

    pub fn get_active(&self) -> Option<&PreviewSession> {
        self.active.as_ref().and_then(|id| self.sessions.get(id))
    }

    fn get_active_mut(&mut self) -> Option<&mut PreviewSession> {
        self.active.as_ref().and_then(|id| self.sessions.get_mut(id))
    }

    fn update_active(&mut self, event: ActiveEvent<'_>) {
        self.active = active::reduce(self.active.take(), event);
        debug_assert!(
            self.active
                .as_ref()
                .map_or(true, |id| self.sessions.contains_key(id)),
            "active preview must refer to a live session"
        );
    }

    fn session_by_panel(&mut self, panel_id: PanelId) -> Option<&mut PreviewSession> {
        self.sessions
            .values_mut()
            .find(|session| session.panel_id() == panel_id)
    }

    /// Opens a preview of `uri`, or of the active editor if `uri` is `None`.
    ///
    /// A document has at most one preview, an existing one is revealed. The
    /// document is opened on its own task, the session is created once
    /// [`RegistryEvent::PreviewOpened`] comes back. Requests for a document
    /// already being opened are merged into the first one.
    pub fn show_preview(&mut self, uri: Option<String>, side_by_side: bool) {
        let host = self.pipeline.host.clone();
        let column = ViewColumn::new(side_by_side);

        let Some(uri) = uri.or_else(|| {
            host.active_document()
                .filter(DocumentRef::is_supported)
                .map(|document| document.uri)
        }) else {
            host.show_message(MessageLevel::Error, NO_FILE_TO_PREVIEW);
            return;
        };

        let requested = DocumentId::from(uri.as_str());
        if let Some(session) = self.sessions.get(&requested) {
            session.reveal(column);
            return;
        }

        if !self.opening.insert(requested.clone()) {
            tracing::debug!(document = %requested, "Preview is already being opened");
            return;
        }

        let event_sender = self.event_sender.clone();
        tokio::spawn(async move {
            let opened = open_preview(host.as_ref(), &uri, column).await;
            let _ = event_sender.send(RegistryEvent::PreviewOpened(OpenedPreview {
                requested,
                column,
                opened,
            }));
        });
    }

    fn on_preview_opened(&mut self, opened: OpenedPreview) {
        let OpenedPreview {
            requested,
            column,
            opened,
        } = opened;

        let still_wanted = self.opening.remove(&requested);
        let Some((document, panel)) = opened else {
            return;
        };

        if !still_wanted {
            tracing::debug!(document = %requested, "Document went away while opening its preview");
            panel.dispose();
            return;
        }

        // The editor may canonicalize the uri.
        let document_id = document.id();
        if let Some(session) = self.sessions.get(&document_id) {
            panel.dispose();
            session.reveal(column);
            return;
        }

        self.next_session_id += 1;
        let mut session =
            PreviewSession::new(self.next_session_id, document, panel, self.pipeline.clone());

        tracing::debug!(document = %document_id, panel_id = session.panel_id(), "New preview session");

        session.refresh();
        self.sessions.insert(document_id.clone(), session);
        self.update_active(ActiveEvent::Created(&document_id));
    }

    pub fn set_props_file(&mut self, props_file: Option<PathBuf>) {
        if let Some(session) = self.get_active_mut() {
            session.set_props_file(props_file);
        }
    }

    pub fn clear_props_file(&mut self) {
        self.set_props_file(None);
    }

    pub fn refresh_active(&mut self) {
        if let Some(session) = self.get_active_mut() {
            session.refresh();
        }
    }

    /// Lets the user pick the props file of the active preview.
    ///
    /// The picker runs on its own task, the choice comes back as a
    /// [`RegistryEvent`] and applies to whichever preview is active by then.
    pub fn select_props_file(&mut self) {
        let host = self.pipeline.host.clone();

        let Some(session) = self.get_active() else {
            host.show_message(MessageLevel::Warning, NO_ACTIVE_PREVIEW);
            return;
        };

        let current = session.props_file().map(PathBuf::from);
        let event_sender = self.event_sender.clone();

        tokio::spawn(async move {
            let event = match props::pick_props_file(host.as_ref(), current.as_deref()).await {
                Ok(Some(PropsSelection::Clear)) => RegistryEvent::ClearPropsFile,
                Ok(Some(PropsSelection::File(path))) => RegistryEvent::SetPropsFile(Some(path)),
                Ok(None) => return,
                Err(err) => {
                    tracing::error!(?err, "Failed to select props file");
                    return;
                }
            };
            let _ = event_sender.send(event);
        });
    }

    pub fn on_document_changed(&mut self, document: &DocumentId) {
        if !self.config.load().preview.auto_refresh {
            return;
        }
        if let Some(session) = self.sessions.get_mut(document) {
            session.refresh();
        }
    }

    pub fn on_document_closed(&mut self, document: &DocumentId) {
        self.opening.remove(document);
        if let Some(mut session) = self.sessions.remove(document) {
            tracing::debug!(%document, "Document closed, disposing its preview");
            session.dispose();
            self.update_active(ActiveEvent::Removed(document));
        }
    }

    pub fn on_active_editor_changed(&mut self, document: Option<&DocumentRef>) {
        let Some(document) = document else {
            return;
        };
        let document_id = document.id();
        let has_session = self.sessions.contains_key(&document_id);
        self.update_active(ActiveEvent::EditorFocused {
            document: &document_id,
            supported: document.is_supported(),
            has_session,
        });
    }

    pub fn on_panel_message(&mut self, panel_id: PanelId, message: PanelMessage) {
        let Some(session) = self.session_by_panel(panel_id) else {
            tracing::debug!(panel_id, ?message, "Message from an unknown panel");
            return;
        };

        match message {
            PanelMessage::SelectProps => {
                let document = session.document().id();
                self.update_active(ActiveEvent::PanelInteracted(&document));
                self.select_props_file();
            }
            message => session.handle_message(message),
        }
    }

    /// The user closed the panel.
    pub fn on_panel_disposed(&mut self, panel_id: PanelId) {
        let Some(document) = self
            .sessions
            .iter()
            .find(|(_, session)| session.panel_id() == panel_id)
            .map(|(document, _)| document.clone())
        else {
            return;
        };

        if let Some(mut session) = self.sessions.remove(&document) {
            tracing::debug!(%document, panel_id, "Preview panel closed");
            session.mark_closed();
        }
        self.update_active(ActiveEvent::Removed(&document));
    }

    /// Applies a render result if its session is still alive.
    pub fn apply_completion(&mut self, completion: RenderCompletion) -> bool {
        let RenderCompletion {
            session_id,
            document,
            seq,
            result,
        } = completion;

        match self.sessions.get_mut(&document) {
            Some(session) if session.id() == session_id => session.apply(seq, result),
            _ => {
                tracing::trace!(%document, session_id, seq, "Dropped result of a closed preview");
                false
            }
        }
    }

    /// Waits for the next render result.
    pub async fn next_completion(&mut self) -> Option<RenderCompletion> {
        self.completion_receiver.recv().await
    }

    /// Waits for the next event sent through [`Self::event_sender`].
    pub async fn next_event(&mut self) -> Option<RegistryEvent> {
        self.event_receiver.recv().await
    }

    /// Handles one event, returns `false` once the registry must stop.
    pub fn handle_event(&mut self, event: RegistryEvent) -> bool {
        tracing::trace!(?event, "Registry event");

        match event {
            RegistryEvent::ShowPreview { uri, side_by_side } => {
                self.show_preview(uri, side_by_side)
            }
            RegistryEvent::RefreshPreview => self.refresh_active(),
            RegistryEvent::SelectPropsFile => self.select_props_file(),
            RegistryEvent::SetPropsFile(props_file) => self.set_props_file(props_file),
            RegistryEvent::ClearPropsFile => self.clear_props_file(),
            RegistryEvent::DocumentChanged(document) => self.on_document_changed(&document),
            RegistryEvent::DocumentClosed(document) => self.on_document_closed(&document),
            RegistryEvent::ActiveEditorChanged(document) => {
                self.on_active_editor_changed(document.as_ref())
            }
            RegistryEvent::PanelMessage { panel_id, message } => {
                self.on_panel_message(panel_id, message)
            }
            RegistryEvent::PanelDisposed(panel_id) => self.on_panel_disposed(panel_id),
            RegistryEvent::PreviewOpened(opened) => self.on_preview_opened(opened),
            RegistryEvent::QueryActive(sender) => {
                let _ = sender.send(self.get_active().map(PreviewState::from));
            }
            RegistryEvent::Shutdown => return false,
        }

        true
    }

    /// Disposes every session.
    pub fn dispose(&mut self) {
        self.opening.clear();
        for (_, mut session) in self.sessions.drain() {
            session.dispose();
        }
        self.update_active(ActiveEvent::Cleared);
    }

    /// Runs the event loop until [`RegistryEvent::Shutdown`], then disposes
    /// every session.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                Some(completion) = self.completion_receiver.recv() => {
                    self.apply_completion(completion);
                }
                maybe_event = self.event_receiver.recv() => {
                    match maybe_event {
                        Some(event) => {
                            if !self.handle_event(event) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        tracing::debug!(sessions = self.sessions.len(), "Registry is shutting down");
        self.dispose();
    }
}
