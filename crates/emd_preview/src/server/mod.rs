//! Stdio server bridging the editor and the session registry.

mod host;
mod input;

use self::host::RpcHost;
use self::input::{Event, InitializeParams};
use emd_config::{ConfigError, ConfigHandle};
use emd_preview_core::host::MessageLevel;
use emd_preview_core::{
    check_renderer, EditorHost, EmdRenderer, GfmConverter, RegistryEvent, SessionRegistry,
    TemplateRenderer,
};
use rpc::{EditorMessage, RpcClient, RpcNotification, RpcRequest};
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// Starts and keeps running the server on top of stdio until the editor goes away.
pub async fn start(config: ConfigHandle, config_err: Option<ConfigError>) {
    let (editor_sender, editor_receiver) = tokio::sync::mpsc::unbounded_channel();

    let rpc_client = Arc::new(RpcClient::new(
        BufReader::new(std::io::stdin()),
        BufWriter::new(std::io::stdout()),
        editor_sender,
    ));

    let host = Arc::new(RpcHost::new(rpc_client.clone()));
    let renderer: Arc<dyn TemplateRenderer> = Arc::new(EmdRenderer::new(config.clone()));

    let registry = SessionRegistry::new(
        host.clone(),
        renderer.clone(),
        Arc::new(GfmConverter),
        config.clone(),
    );
    let registry_events = registry.event_sender();
    let registry_handle = tokio::spawn(registry.run());

    watch_config(config.clone(), registry_events.clone());

    let server = Server {
        rpc_client,
        host,
        renderer,
        config,
        registry_events: registry_events.clone(),
        config_err,
    };
    server.run(editor_receiver).await;

    let _ = registry_events.send(RegistryEvent::Shutdown);
    if let Err(err) = registry_handle.await {
        tracing::error!(?err, "Registry task failed");
    }
}

/// Re-renders the active preview whenever the config file changes.
fn watch_config(config: ConfigHandle, registry_events: UnboundedSender<RegistryEvent>) {
    let (reload_sender, mut reload_receiver) = tokio::sync::mpsc::channel(1);
    emd_config::monitor::watch(config, reload_sender);

    tokio::spawn(async move {
        while reload_receiver.recv().await.is_some() {
            tracing::info!("Config file reloaded");
            if registry_events.send(RegistryEvent::RefreshPreview).is_err() {
                break;
            }
        }
    });
}

struct Server {
    rpc_client: Arc<RpcClient>,
    host: Arc<RpcHost>,
    renderer: Arc<dyn TemplateRenderer>,
    config: ConfigHandle,
    registry_events: UnboundedSender<RegistryEvent>,
    config_err: Option<ConfigError>,
}

impl Server {
    async fn run(mut self, mut editor_receiver: UnboundedReceiver<EditorMessage>) {
        while let Some(message) = editor_receiver.recv().await {
            let keep_running = match message {
                EditorMessage::Notification(notification) => {
                    self.process_notification(notification)
                }
                EditorMessage::Request(request) => {
                    self.process_request(request);
                    true
                }
            };

            if !keep_running {
                break;
            }
        }

        tracing::debug!("Editor loop exited");
    }

    /// Returns `false` once the editor asked to shut down.
    fn process_notification(&mut self, notification: RpcNotification) -> bool {
        let RpcNotification { method, params, .. } = notification;

        let event = match Event::parse(&method, params) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(%method, %err, "Invalid notification");
                return true;
            }
        };

        match event {
            Event::Initialize(params) => self.initialize(params),
            Event::ActiveEditorChanged(document) => {
                self.host.set_active_document(document.clone());
                self.forward(RegistryEvent::ActiveEditorChanged(document));
            }
            Event::Registry(event) => self.forward(event),
            Event::Shutdown => return false,
            Event::Other(method) => {
                tracing::warn!(%method, "Unknown notification");
            }
        }

        true
    }

    fn process_request(&self, request: RpcRequest) {
        let RpcRequest { id, method, .. } = request;

        match method.as_str() {
            "previewState" => {
                let (sender, receiver) = oneshot::channel();
                self.forward(RegistryEvent::QueryActive(sender));

                let rpc_client = self.rpc_client.clone();
                tokio::spawn(async move {
                    let result = receiver
                        .await
                        .map_err(|_| rpc::Error::internal_error("preview registry is gone"));
                    if let Err(err) = rpc_client.send_response(id, result) {
                        tracing::error!(?err, "Failed to send previewState response");
                    }
                });
            }
            other => {
                tracing::warn!(method = %other, "Unknown request");
                let result: Result<(), _> = Err(rpc::Error::method_not_found(other));
                if let Err(err) = self.rpc_client.send_response(id, result) {
                    tracing::error!(?err, "Failed to send response");
                }
            }
        }
    }

    fn initialize(&mut self, params: InitializeParams) {
        let InitializeParams {
            workspace_root,
            active_document,
            panel_resources,
        } = params;

        tracing::info!(?workspace_root, "Initializing");

        self.host
            .initialize(workspace_root, active_document, panel_resources);

        if let Some(err) = self.config_err.take() {
            let path = self
                .config
                .file_path()
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            self.host.show_message(
                MessageLevel::Error,
                &format!("Invalid config file {path}, using the defaults: {err}"),
            );
        }

        let host = self.host.clone();
        let renderer = self.renderer.clone();
        let config_file = self.config.file_path().map(ToOwned::to_owned);
        tokio::spawn(async move {
            check_renderer(&*host, &*renderer, config_file.as_deref()).await;
        });
    }

    fn forward(&self, event: RegistryEvent) {
        if let Err(err) = self.registry_events.send(event) {
            tracing::error!(event = ?err.0, "Registry is gone");
        }
    }
}
