//! Tracking of the active preview session.

use crate::document::DocumentId;

/// Events affecting which session is the active one.
#[derive(Debug, Clone, Copy)]
pub enum ActiveEvent<'a> {
    /// A session was created for the document.
    Created(&'a DocumentId),
    /// A text editor gained focus.
    EditorFocused {
        document: &'a DocumentId,
        supported: bool,
        has_session: bool,
    },
    /// The user interacted with the panel of the document.
    PanelInteracted(&'a DocumentId),
    /// The session of the document is gone.
    Removed(&'a DocumentId),
    /// Every session is gone.
    Cleared,
}

/// Returns the active document after `event`.
///
/// Focusing an editor without a preview never deactivates the current one.
pub fn reduce(active: Option<DocumentId>, event: ActiveEvent<'_>) -> Option<DocumentId> {
    match event {
        ActiveEvent::Created(document) | ActiveEvent::PanelInteracted(document) => {
            Some(document.clone())
        }
        ActiveEvent::EditorFocused {
            document,
            supported: true,
            has_session: true,
        } => Some(document.clone()),
        ActiveEvent::EditorFocused { .. } => active,
        ActiveEvent::Removed(document) => active.filter(|active| active != document),
        ActiveEvent::Cleared => None,
    }
}
