//! Preview lifecycle and rendering pipeline for ExpressiveMD templates.
//!
//! Templates are rendered by the external `emd` command, the output is shown
//! in a webview panel of the editor, either converted from markdown or as raw
//! source.
//!
//! # Modules
//!
//! - [`emd`] - Invocation of the `emd` command
//! - [`session`] - One document bound to one preview panel
//! - [`registry`] - The table of sessions and its event loop
//! - [`host`] - Capabilities required from the editor
//! - [`html`] - The documents shown in the panel
//! - [`markdown`] - Markdown to HTML conversion
//! - [`props`] - The props file picker

mod active;
mod check;
pub mod document;
pub mod emd;
pub mod host;
pub mod html;
pub mod markdown;
pub mod props;
pub mod protocol;
pub mod registry;
pub mod session;

#[cfg(test)]
mod testing;

pub use self::check::{check_renderer, OPEN_FILE_COMMAND};
pub use self::document::{DocumentId, DocumentRef, LANGUAGE_ID};
pub use self::emd::{EmdRenderer, RenderRequest, RenderResult, TemplateRenderer};
pub use self::host::{EditorHost, HostError, Panel, PanelId, PanelResources, ViewColumn};
pub use self::markdown::{GfmConverter, MarkdownConverter};
pub use self::protocol::{PanelMessage, PanelUpdate};
pub use self::registry::{PreviewState, RegistryEvent, SessionRegistry};
pub use self::session::DisplayMode;
