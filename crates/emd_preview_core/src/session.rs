//! A preview session binds one document to one panel.

use crate::document::{base_name, DocumentId, DocumentRef};
use crate::emd::{RenderRequest, RenderResult, TemplateRenderer};
use crate::host::{EditorHost, Panel, PanelId, ViewColumn};
use crate::html::{self, Toolbar};
use crate::markdown::MarkdownConverter;
use crate::protocol::PanelMessage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub type SessionId = u64;

const NO_PROPS: &str = "No props";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Rendered,
    Source,
}

impl DisplayMode {
    pub fn toggle(self) -> Self {
        match self {
            Self::Rendered => Self::Source,
            Self::Source => Self::Rendered,
        }
    }
}

/// Result of a render, sent back to the event loop by the render task.
#[derive(Debug, Clone)]
pub struct RenderCompletion {
    pub session_id: SessionId,
    pub document: DocumentId,
    pub seq: u64,
    pub result: RenderResult,
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct RenderPipeline {
    pub host: Arc<dyn EditorHost>,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub converter: Arc<dyn MarkdownConverter>,
    pub completion_sender: UnboundedSender<RenderCompletion>,
}

pub struct PreviewSession {
    id: SessionId,
    document: DocumentRef,
    props_file: Option<PathBuf>,
    display_mode: DisplayMode,
    panel: Box<dyn Panel>,
    pipeline: RenderPipeline,
    /// Sequence number of the last issued render.
    issued: u64,
    /// Sequence number of the last applied render.
    applied: u64,
    disposed: bool,
}

impl std::fmt::Debug for PreviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSession")
            .field("id", &self.id)
            .field("document", &self.document.uri)
            .field("panel", &self.panel.id())
            .field("props_file", &self.props_file)
            .field("display_mode", &self.display_mode)
            .field("issued", &self.issued)
            .field("applied", &self.applied)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl PreviewSession {
    pub fn new(
        id: SessionId,
        document: DocumentRef,
        panel: Box<dyn Panel>,
        pipeline: RenderPipeline,
    ) -> Self {
        Self {
            id,
            document,
            props_file: None,
            display_mode: DisplayMode::default(),
            panel,
            pipeline,
            issued: 0,
            applied: 0,
            disposed: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    pub fn panel_id(&self) -> PanelId {
        self.panel.id()
    }

    pub fn props_file(&self) -> Option<&Path> {
        self.props_file.as_deref()
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Panel title for the current document and props file.
    pub fn title(&self) -> String {
        match &self.props_file {
            Some(props_file) => format!(
                "Preview: {} ({})",
                self.document.file_name(),
                base_name(props_file)
            ),
            None => format!("Preview: {}", self.document.file_name()),
        }
    }

    /// Issues a new render of the document.
    ///
    /// The result is delivered as a [`RenderCompletion`] and must be handed to
    /// [`Self::apply`] by the owner of the session.
    pub fn refresh(&mut self) {
        if self.disposed {
            return;
        }

        self.issued += 1;

        let request = RenderRequest {
            document: self.document.path.clone(),
            props: self.props_file.clone(),
            cwd: self.pipeline.host.workspace_root(),
        };
        let renderer = self.pipeline.renderer.clone();
        let completion_sender = self.pipeline.completion_sender.clone();
        let session_id = self.id;
        let document = self.document.id();
        let seq = self.issued;

        tracing::debug!(%document, seq, ?request.props, "Issuing render");

        tokio::spawn(async move {
            let result = renderer.render(&request).await;
            let completion = RenderCompletion {
                session_id,
                document,
                seq,
                result,
            };
            if let Err(err) = completion_sender.send(completion) {
                tracing::debug!(seq = err.0.seq, "Event loop is gone, render result dropped");
            }
        });
    }

    pub fn set_props_file(&mut self, props_file: Option<PathBuf>) {
        if self.disposed {
            return;
        }
        self.props_file = props_file;
        self.panel.set_title(self.title());
        self.refresh();
    }

    pub fn toggle_source(&mut self) {
        if self.disposed {
            return;
        }
        self.display_mode = self.display_mode.toggle();
        self.refresh();
    }

    pub fn reveal(&self, column: ViewColumn) {
        if !self.disposed {
            self.panel.reveal(column);
        }
    }

    /// Disposes the panel. Calling it more than once is a no-op.
    pub fn dispose(&mut self) {
        if !std::mem::replace(&mut self.disposed, true) {
            self.panel.dispose();
        }
    }

    /// The panel was closed on the editor side, it must not be touched again.
    pub fn mark_closed(&mut self) {
        self.disposed = true;
    }

    /// Applies the result of render `seq`.
    ///
    /// Returns `false` if the result was superseded by a newer one or the
    /// session is gone, in which case the panel is left untouched.
    pub fn apply(&mut self, seq: u64, result: RenderResult) -> bool {
        if self.disposed || seq <= self.applied {
            tracing::trace!(
                seq,
                applied = self.applied,
                disposed = self.disposed,
                "Discarded stale render"
            );
            return false;
        }

        debug_assert!(seq <= self.issued, "render {seq} was never issued");
        self.applied = seq;

        match result {
            RenderResult::Success { output } => {
                let content = self.compose(&output);
                let nonce = html::generate_nonce();
                self.panel.set_html(html::content_page(
                    self.panel.resources(),
                    &self.toolbar(),
                    &content,
                    &nonce,
                ));
            }
            RenderResult::Failure { message } => {
                tracing::debug!(document = %self.document.uri, %message, "Render failed");
                self.panel
                    .set_html(html::error_page(self.panel.resources(), &message));
            }
        }

        true
    }

    /// Body of the content container for a successful render.
    fn compose(&self, output: &str) -> String {
        match self.display_mode {
            DisplayMode::Rendered => self.pipeline.converter.to_html(output),
            DisplayMode::Source => html::source_view(output),
        }
    }

    fn toolbar(&self) -> Toolbar {
        Toolbar {
            props_label: self
                .props_file
                .as_deref()
                .map(base_name)
                .unwrap_or_else(|| NO_PROPS.to_string()),
            source_mode: self.display_mode == DisplayMode::Source,
        }
    }

    /// Handles a message of the panel, except `selectProps` which needs the
    /// registry.
    pub fn handle_message(&mut self, message: PanelMessage) {
        match message {
            PanelMessage::Refresh => self.refresh(),
            PanelMessage::ToggleSource => self.toggle_source(),
            PanelMessage::OpenLink { href } => self.pipeline.host.open_link(&href),
            PanelMessage::SelectProps => {
                tracing::debug!("selectProps must be handled by the registry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::strip_nonce;
    use crate::markdown::GfmConverter;
    use crate::testing::{FakeHost, FakeRenderer};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Fixture {
        host: Arc<FakeHost>,
        session: PreviewSession,
        completions: UnboundedReceiver<RenderCompletion>,
    }

    async fn fixture(renderer: Arc<FakeRenderer>) -> Fixture {
        let host = Arc::new(FakeHost::default());
        let (completion_sender, completions) = unbounded_channel();
        let pipeline = RenderPipeline {
            host: host.clone(),
            renderer,
            converter: Arc::new(GfmConverter),
            completion_sender,
        };
        let document = FakeHost::document("/work/intro.emd");
        let panel = host
            .create_panel(crate::host::PanelOptions::preview(
                "Preview: intro.emd".into(),
                ViewColumn::Active,
            ))
            .await
            .unwrap();
        Fixture {
            host,
            session: PreviewSession::new(1, document, panel, pipeline),
            completions,
        }
    }

    impl Fixture {
        async fn refresh_and_apply(&mut self) -> bool {
            self.session.refresh();
            let completion = self.completions.recv().await.unwrap();
            self.session.apply(completion.seq, completion.result)
        }
    }

    #[tokio::test]
    async fn test_rendered_and_source_views() {
        let mut fx = fixture(Arc::new(FakeRenderer::succeeding("# Hi"))).await;
        let panel = fx.host.panel(0);

        assert!(fx.refresh_and_apply().await);
        assert!(panel.content().contains("<h1"));
        assert!(panel.content().contains("Hi</h1>"));

        fx.session.toggle_source();
        let completion = fx.completions.recv().await.unwrap();
        assert!(fx.session.apply(completion.seq, completion.result));
        assert_eq!(
            panel.content(),
            r#"<pre class="source-view"><code># Hi</code></pre>"#
        );
        assert!(panel.html().contains(r#"<div class="content source-mode">"#));
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_the_page() {
        let mut fx = fixture(Arc::new(FakeRenderer::succeeding("# Hi\n\nsome *text*"))).await;
        let panel = fx.host.panel(0);

        fx.refresh_and_apply().await;
        let initial = panel.html();
        assert_eq!(fx.session.display_mode(), DisplayMode::Rendered);

        for _ in 0..2 {
            fx.session.toggle_source();
            let completion = fx.completions.recv().await.unwrap();
            fx.session.apply(completion.seq, completion.result);
        }

        assert_eq!(fx.session.display_mode(), DisplayMode::Rendered);
        assert_eq!(strip_nonce(&panel.html()), strip_nonce(&initial));
    }

    #[tokio::test]
    async fn test_failure_then_recovery() {
        let renderer = Arc::new(FakeRenderer::failing("parse error at line 3"));
        let mut fx = fixture(renderer.clone()).await;
        let panel = fx.host.panel(0);

        fx.refresh_and_apply().await;
        assert!(panel.html().contains("Error rendering template"));
        assert!(panel.html().contains("<pre>parse error at line 3</pre>"));

        renderer.set_result(RenderResult::Success {
            output: "fixed".into(),
        });
        fx.refresh_and_apply().await;
        assert!(!panel.html().contains("Error rendering template"));
        assert_eq!(panel.content(), "<p>fixed</p>\n");
    }

    #[tokio::test]
    async fn test_every_render_replaces_the_page_with_a_new_nonce() {
        let renderer = Arc::new(FakeRenderer::succeeding("one"));
        let mut fx = fixture(renderer.clone()).await;
        let panel = fx.host.panel(0);

        fx.refresh_and_apply().await;
        let first = panel.html();

        renderer.set_result(RenderResult::Success {
            output: "two".into(),
        });
        fx.refresh_and_apply().await;
        let second = panel.html();

        assert_eq!(panel.set_html_count(), 2);
        assert_eq!(panel.content(), "<p>two</p>\n");

        let nonce_of = |page: &str| {
            let start = page.find("'nonce-").unwrap() + "'nonce-".len();
            page[start..start + 32].to_string()
        };
        assert_ne!(nonce_of(&first), nonce_of(&second));
        assert!(second.contains(&format!(r#"<script nonce="{}""#, nonce_of(&second))));
    }

    #[tokio::test]
    async fn test_props_file_updates_title_and_request() {
        let renderer = Arc::new(FakeRenderer::succeeding("ok"));
        let mut fx = fixture(renderer.clone()).await;
        let panel = fx.host.panel(0);

        fx.session
            .set_props_file(Some(PathBuf::from("/work/data/props.json")));
        assert_eq!(panel.title(), "Preview: intro.emd (props.json)");
        let completion = fx.completions.recv().await.unwrap();
        fx.session.apply(completion.seq, completion.result);
        assert!(panel.html().contains(r#"<span class="label">props.json</span>"#));
        assert_eq!(
            renderer.requests().last().unwrap().props,
            Some(PathBuf::from("/work/data/props.json"))
        );

        fx.session.set_props_file(None);
        assert_eq!(panel.title(), "Preview: intro.emd");
        let completion = fx.completions.recv().await.unwrap();
        fx.session.apply(completion.seq, completion.result);
        assert!(panel.html().contains(r#"<span class="label">No props</span>"#));
    }

    #[tokio::test]
    async fn test_stale_completions_are_discarded() {
        let mut fx = fixture(Arc::new(FakeRenderer::succeeding("x"))).await;
        let panel = fx.host.panel(0);

        fx.session.refresh();
        fx.session.refresh();
        fx.session.refresh();
        let mut completions = Vec::new();
        for _ in 0..3 {
            completions.push(fx.completions.recv().await.unwrap());
        }
        assert_eq!(
            completions.iter().map(|c| c.seq).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let result = |output: &str| RenderResult::Success {
            output: output.into(),
        };
        assert!(fx.session.apply(3, result("third")));
        assert!(!fx.session.apply(1, result("first")));
        assert!(!fx.session.apply(2, result("second")));
        assert_eq!(panel.content(), "<p>third</p>\n");
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_final() {
        let mut fx = fixture(Arc::new(FakeRenderer::succeeding("x"))).await;
        let panel = fx.host.panel(0);

        fx.session.refresh();
        fx.session.dispose();
        fx.session.dispose();
        assert_eq!(panel.dispose_count(), 1);

        let completion = fx.completions.recv().await.unwrap();
        assert!(!fx.session.apply(completion.seq, completion.result));
        assert_eq!(panel.set_html_count(), 0);

        fx.session.refresh();
        fx.session.reveal(ViewColumn::Beside);
        assert!(panel.reveals().is_empty());
    }

    #[tokio::test]
    async fn test_open_link_is_delegated() {
        let mut fx = fixture(Arc::new(FakeRenderer::succeeding("x"))).await;
        fx.session.handle_message(PanelMessage::OpenLink {
            href: "https://example.com/docs".into(),
        });
        assert_eq!(fx.host.opened_links(), vec!["https://example.com/docs"]);
    }
}
