use crate::Args;
use anyhow::Result;
use clap::Parser;
use emd_preview_core::html::{error_page, source_view};
use emd_preview_core::{
    EmdRenderer, GfmConverter, MarkdownConverter, PanelResources, RenderRequest, RenderResult,
    TemplateRenderer,
};
use std::io::Write;
use std::path::PathBuf;

/// Renders a template once and prints what the preview panel would show.
#[derive(Parser, Debug, Clone)]
pub struct Render {
    /// Template to render.
    #[clap(value_parser)]
    file: PathBuf,

    /// Props file passed to emd.
    #[clap(long, value_parser)]
    props: Option<PathBuf>,

    /// Print the escaped emd output instead of converting it from markdown.
    #[clap(long)]
    source: bool,
}

impl Render {
    /// Returns the exit code, `1` if the template failed to render.
    pub async fn run(&self, args: Args) -> Result<i32> {
        let (config, config_err) = emd_config::load_config_on_startup(args.config_file);
        if let Some(err) = config_err {
            eprintln!("Ignored invalid config file: {err}");
        }

        let request = RenderRequest {
            document: self.file.clone(),
            props: self.props.clone(),
            cwd: None,
        };

        let result = EmdRenderer::new(config).render(&request).await;
        let exit_code = if result.is_success() { 0 } else { 1 };

        let html = self.to_html(result);
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{html}")?;

        Ok(exit_code)
    }

    fn to_html(&self, result: RenderResult) -> String {
        match result {
            RenderResult::Success { output } if self.source => source_view(&output),
            RenderResult::Success { output } => GfmConverter.to_html(&output),
            RenderResult::Failure { message } => error_page(&PanelResources::default(), &message),
        }
    }
}
