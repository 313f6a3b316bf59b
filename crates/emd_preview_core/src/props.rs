//! Picking the props file of a preview.

use crate::document::base_name;
use crate::host::{EditorHost, HostError, OpenDialogOptions, QuickPickItem, QuickPickOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const CLEAR_LABEL: &str = "$(close) Clear props file";
const BROWSE_LABEL: &str = "$(file) Browse...";

const JSON_GLOB: &str = "**/*.json";
const EXCLUDE_GLOB: &str = "**/node_modules/**";
const MAX_CANDIDATES: usize = 100;

/// Outcome of the props file picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropsSelection {
    Clear,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Choice {
    Clear,
    Browse,
    File(PathBuf),
}

/// Quick pick entries, in display order.
#[derive(Debug)]
struct Candidates {
    items: Vec<QuickPickItem>,
    choices: Vec<Choice>,
}

impl Candidates {
    fn new(files: Vec<PathBuf>, workspace_root: Option<&Path>, current: Option<&Path>) -> Self {
        let mut file_items = files
            .into_iter()
            .map(|path| {
                let item = QuickPickItem {
                    label: relative_label(&path, workspace_root),
                    description: Some(path.display().to_string()),
                    always_show: false,
                };
                (item, Choice::File(path))
            })
            .collect::<Vec<_>>();
        file_items.sort_by(|(a, _), (b, _)| a.label.cmp(&b.label));

        let mut items = Vec::with_capacity(file_items.len() + 2);
        let mut choices = Vec::with_capacity(file_items.len() + 2);

        if let Some(current) = current {
            items.push(QuickPickItem {
                label: CLEAR_LABEL.into(),
                description: Some(format!("Currently: {}", base_name(current))),
                always_show: true,
            });
            choices.push(Choice::Clear);
        }

        items.push(QuickPickItem {
            label: BROWSE_LABEL.into(),
            description: Some("Select a JSON file from disk".into()),
            always_show: true,
        });
        choices.push(Choice::Browse);

        for (item, choice) in file_items {
            items.push(item);
            choices.push(choice);
        }

        Self { items, choices }
    }
}

/// Label of a candidate, relative to the workspace root when inside it.
fn relative_label(path: &Path, workspace_root: Option<&Path>) -> String {
    workspace_root
        .and_then(|root| path.strip_prefix(root).ok())
        .map(|relative| {
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_else(|| path.display().to_string())
}

/// Asks the user for a props file.
///
/// `current` is the props file of the preview the choice is made for. Returns
/// `None` if the user dismissed the picker or the file dialog.
pub async fn pick_props_file(
    host: &dyn EditorHost,
    current: Option<&Path>,
) -> Result<Option<PropsSelection>, HostError> {
    let files = host
        .find_files(JSON_GLOB, EXCLUDE_GLOB, MAX_CANDIDATES)
        .await?;

    let Candidates { items, choices } =
        Candidates::new(files, host.workspace_root().as_deref(), current);

    let options = QuickPickOptions {
        title: "ExpressiveMD: Select Props File".into(),
        placeholder: "Select a props file for preview".into(),
        match_on_description: true,
    };

    let Some(index) = host.show_quick_pick(items, options).await? else {
        return Ok(None);
    };

    match choices.into_iter().nth(index) {
        Some(Choice::Clear) => Ok(Some(PropsSelection::Clear)),
        Some(Choice::File(path)) => Ok(Some(PropsSelection::File(path))),
        Some(Choice::Browse) => {
            let options = OpenDialogOptions {
                title: "Select Props File".into(),
                can_select_files: true,
                can_select_folders: false,
                can_select_many: false,
                filters: BTreeMap::from([("JSON".to_string(), vec!["json".to_string()])]),
            };
            Ok(host
                .show_open_dialog(options)
                .await?
                .map(PropsSelection::File))
        }
        None => {
            tracing::warn!(index, "Quick pick returned an unknown item");
            Ok(None)
        }
    }
}
