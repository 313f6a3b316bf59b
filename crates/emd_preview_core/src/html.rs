//! HTML documents shown in the preview panel.

use crate::host::PanelResources;
use rand::distributions::Alphanumeric;
use rand::Rng;

const NONCE_LEN: usize = 32;

/// Escapes text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Returns a fresh alphanumeric nonce for the script-src policy.
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

/// State of the toolbar on top of the content page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolbar {
    /// Base name of the props file or `No props`.
    pub props_label: String,
    pub source_mode: bool,
}

/// Body of the content container when the raw template output is shown.
pub fn source_view(output: &str) -> String {
    format!(
        r#"<pre class="source-view"><code>{}</code></pre>"#,
        escape_html(output)
    )
}

/// Full page of a successful render.
///
/// `content` is inserted verbatim into the content container.
pub fn content_page(
    resources: &PanelResources,
    toolbar: &Toolbar,
    content: &str,
    nonce: &str,
) -> String {
    let PanelResources {
        csp_source,
        style_uri,
        script_uri,
        codicons_uri,
    } = resources;

    let (toggle_icon, toggle_title, toggle_class, content_class) = if toolbar.source_mode {
        (
            "codicon-preview",
            "Show Rendered Preview",
            "active",
            "content source-mode",
        )
    } else {
        ("codicon-code", "Show Markdown Source", "", "content")
    };

    let props_label = escape_html(&toolbar.props_label);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <meta http-equiv="Content-Security-Policy" content="default-src 'none'; style-src {csp_source} 'unsafe-inline'; script-src 'nonce-{nonce}'; img-src {csp_source} https: data:; font-src {csp_source};">
  <link href="{codicons_uri}" rel="stylesheet">
  <link href="{style_uri}" rel="stylesheet">
  <title>ExpressiveMD Preview</title>
</head>
<body>
  <div class="toolbar">
    <button id="select-props" title="Select Props File">
      <span class="codicon codicon-json"></span>
      <span class="label">{props_label}</span>
    </button>
    <div class="toolbar-separator"></div>
    <button id="toggle-source" title="{toggle_title}" class="{toggle_class}">
      <span class="codicon {toggle_icon}"></span>
    </button>
    <button id="refresh" title="Refresh Preview">
      <span class="codicon codicon-refresh"></span>
    </button>
  </div>
  <div class="{content_class}">
    {content}
  </div>
  <script nonce="{nonce}" src="{script_uri}"></script>
</body>
</html>"#
    )
}

/// Full page of a failed render. Carries no script.
pub fn error_page(resources: &PanelResources, message: &str) -> String {
    let PanelResources {
        csp_source,
        style_uri,
        ..
    } = resources;
    let message = escape_html(message);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <meta http-equiv="Content-Security-Policy" content="default-src 'none'; style-src {csp_source} 'unsafe-inline';">
  <link href="{style_uri}" rel="stylesheet">
  <title>ExpressiveMD Preview - Error</title>
</head>
<body>
  <div class="error">
    <h2>Error rendering template</h2>
    <pre>{message}</pre>
  </div>
</body>
</html>"#
    )
}

#[cfg(test)]
pub(crate) fn strip_nonce(html: &str) -> String {
    let mut stripped = String::with_capacity(html.len());
    let mut rest = html;
    for marker in ["nonce-", "nonce=\""] {
        if let Some(start) = rest.find(marker) {
            let start = start + marker.len();
            stripped.push_str(&rest[..start]);
            rest = &rest[(start + NONCE_LEN).min(rest.len())..];
        }
    }
    stripped.push_str(rest);
    stripped
}
