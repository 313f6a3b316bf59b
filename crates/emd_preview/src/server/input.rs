//! Messages initiated by the editor.

use emd_preview_core::{
    DocumentId, DocumentRef, PanelId, PanelMessage, PanelResources, RegistryEvent,
};
use rpc::{Error, Params};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InitializeParams {
    pub workspace_root: Option<PathBuf>,
    pub active_document: Option<DocumentRef>,
    pub panel_resources: Option<PanelResources>,
}

#[derive(Debug, Deserialize)]
struct ShowPreviewParams {
    document: Option<String>,
    #[serde(default)]
    side_by_side: bool,
}

#[derive(Debug, Deserialize)]
struct SetPropsFileParams {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct DocumentParams {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct ActiveEditorParams {
    document: Option<DocumentRef>,
}

#[derive(Debug, Deserialize)]
struct PanelMessageParams {
    panel_id: PanelId,
    message: PanelMessage,
}

#[derive(Debug, Deserialize)]
struct PanelParams {
    panel_id: PanelId,
}

/// Notification sent by the editor.
#[derive(Debug)]
pub enum Event {
    Initialize(InitializeParams),
    /// Focus moved to another editor, the host state must follow.
    ActiveEditorChanged(Option<DocumentRef>),
    Registry(RegistryEvent),
    Shutdown,
    Other(String),
}

impl Event {
    pub fn parse(method: &str, params: Params) -> Result<Self, Error> {
        let event = match method {
            "initialize" => Self::Initialize(params.parse()?),
            "showPreview" => {
                let ShowPreviewParams {
                    document,
                    side_by_side,
                } = params.parse()?;
                Self::Registry(RegistryEvent::ShowPreview {
                    uri: document,
                    side_by_side,
                })
            }
            "refreshPreview" => Self::Registry(RegistryEvent::RefreshPreview),
            "selectPropsFile" => Self::Registry(RegistryEvent::SelectPropsFile),
            "clearPropsFile" => Self::Registry(RegistryEvent::ClearPropsFile),
            "setPropsFile" => {
                let SetPropsFileParams { path } = params.parse()?;
                Self::Registry(RegistryEvent::SetPropsFile(path))
            }
            "didChangeTextDocument" => {
                let DocumentParams { uri } = params.parse()?;
                Self::Registry(RegistryEvent::DocumentChanged(DocumentId::from(uri)))
            }
            "didCloseTextDocument" => {
                let DocumentParams { uri } = params.parse()?;
                Self::Registry(RegistryEvent::DocumentClosed(DocumentId::from(uri)))
            }
            "didChangeActiveEditor" => {
                let ActiveEditorParams { document } = params.parse()?;
                Self::ActiveEditorChanged(document)
            }
            "panelMessage" => {
                let PanelMessageParams { panel_id, message } = params.parse()?;
                Self::Registry(RegistryEvent::PanelMessage { panel_id, message })
            }
            "panelDisposed" => {
                let PanelParams { panel_id } = params.parse()?;
                Self::Registry(RegistryEvent::PanelDisposed(panel_id))
            }
            "shutdown" => Self::Shutdown,
            other => Self::Other(other.to_string()),
        };

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(method: &str, params: serde_json::Value) -> Result<Event, Error> {
        Event::parse(method, Params::from_serializable(params).unwrap())
    }

    #[test]
    fn test_show_preview() {
        match parse("showPreview", json!({"side_by_side": true})).unwrap() {
            Event::Registry(RegistryEvent::ShowPreview { uri, side_by_side }) => {
                assert_eq!(uri, None);
                assert!(side_by_side);
            }
            other => panic!("Unexpected event {other:?}"),
        }

        match Event::parse("refreshPreview", Params::None).unwrap() {
            Event::Registry(RegistryEvent::RefreshPreview) => {}
            other => panic!("Unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_panel_message() {
        let event = parse(
            "panelMessage",
            json!({"panel_id": 3, "message": {"type": "openLink", "href": "https://example.com"}}),
        )
        .unwrap();
        match event {
            Event::Registry(RegistryEvent::PanelMessage { panel_id, message }) => {
                assert_eq!(panel_id, 3);
                assert_eq!(
                    message,
                    PanelMessage::OpenLink {
                        href: "https://example.com".into()
                    }
                );
            }
            other => panic!("Unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_initialize() {
        let event = parse(
            "initialize",
            json!({
                "workspace_root": "/work",
                "active_document": {
                    "uri": "file:///work/intro.emd",
                    "path": "/work/intro.emd",
                    "language_id": "expressivemd"
                }
            }),
        )
        .unwrap();
        match event {
            Event::Initialize(params) => {
                assert_eq!(params.workspace_root, Some(PathBuf::from("/work")));
                assert!(params.active_document.unwrap().is_supported());
                assert!(params.panel_resources.is_none());
            }
            other => panic!("Unexpected event {other:?}"),
        }

        assert!(matches!(
            Event::parse("initialize", Params::None).unwrap(),
            Event::Initialize(_)
        ));
    }

    #[test]
    fn test_invalid_params() {
        let err = parse("didCloseTextDocument", json!({"path": "/a.emd"})).unwrap_err();
        assert_eq!(err.code, rpc::ErrorCode::InvalidParams);

        assert!(matches!(
            Event::parse("unknown", Params::None).unwrap(),
            Event::Other(method) if method == "unknown"
        ));
    }
}
