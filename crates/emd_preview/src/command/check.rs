use crate::Args;
use clap::Parser;
use emd_preview_core::{EmdRenderer, TemplateRenderer};

/// Checks whether the configured emd command can be launched.
#[derive(Parser, Debug, Clone)]
pub struct Check;

impl Check {
    /// Returns the exit code, `1` if emd is unavailable.
    pub async fn run(&self, args: Args) -> i32 {
        let (config, config_err) = emd_config::load_config_on_startup(args.config_file);
        if let Some(err) = config_err {
            eprintln!("Ignored invalid config file: {err}");
        }

        let emd_path = config.load().emd_path.clone();

        if EmdRenderer::new(config).is_available().await {
            println!("{emd_path}: available");
            0
        } else {
            println!("{emd_path}: not found, set emd-path in the config file");
            1
        }
    }
}
