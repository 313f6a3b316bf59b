//! Documents as seen by the preview.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Language id of the documents this preview supports.
pub const LANGUAGE_ID: &str = "expressivemd";

/// Canonical resource identifier of a document, the key of the session table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(uri: &str) -> Self {
        Self(uri.to_owned())
    }
}

impl From<String> for DocumentId {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opened editor document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Resource identifier, e.g. `file:///home/me/notes/intro.emd`.
    pub uri: String,
    /// File system path handed to the render command.
    pub path: PathBuf,
    pub language_id: String,
}

impl DocumentRef {
    pub fn id(&self) -> DocumentId {
        DocumentId::from(self.uri.as_str())
    }

    pub fn is_supported(&self) -> bool {
        self.language_id == LANGUAGE_ID
    }

    /// Base name of the document, used in the panel title.
    pub fn file_name(&self) -> String {
        base_name(&self.path)
    }
}

/// Returns the last component of `path`, or the whole path if it has none.
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
