//! Messages exchanged between the preview panel script and the backend.

use serde::{Deserialize, Serialize};

/// Messages sent from the panel to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelMessage {
    /// The props button in the toolbar was clicked.
    SelectProps,
    /// The refresh button in the toolbar was clicked.
    Refresh,
    /// The source/rendered toggle in the toolbar was clicked.
    ToggleSource,
    /// A link inside the rendered content was clicked.
    OpenLink { href: String },
}

/// Messages understood by the panel script for its local content updates.
///
/// Sessions never send them, every render replaces the whole page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelUpdate {
    /// Replace the inner HTML of the content container in place.
    UpdateContent { html: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_panel_message_deserialization() {
        let msg: PanelMessage = serde_json::from_value(json!({"type": "toggleSource"})).unwrap();
        assert_eq!(msg, PanelMessage::ToggleSource);

        let msg: PanelMessage =
            serde_json::from_value(json!({"type": "openLink", "href": "https://example.com"}))
                .unwrap();
        assert_eq!(
            msg,
            PanelMessage::OpenLink {
                href: "https://example.com".into()
            }
        );

        assert!(serde_json::from_value::<PanelMessage>(json!({"type": "scroll"})).is_err());
    }

    #[test]
    fn test_panel_update_serialization() {
        let update = PanelUpdate::UpdateContent {
            html: "<p>Hi</p>".into(),
        };
        assert_eq!(
            serde_json::to_value(update).unwrap(),
            json!({"type": "updateContent", "html": "<p>Hi</p>"})
        );
    }
}
