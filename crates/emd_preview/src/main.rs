mod command;
mod server;

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub enum Cmd {
    /// Display the current version.
    #[clap(name = "version")]
    Version,

    /// Start the stdio-based service talking to the editor.
    #[clap(name = "rpc")]
    Rpc(command::rpc::Rpc),

    /// Render a template once and print the panel content.
    #[clap(name = "render")]
    Render(command::render::Render),

    /// Check whether the configured emd command is available.
    #[clap(name = "check")]
    Check(command::check::Check),
}

/// Global arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Enable the logging system and write to the given file.
    #[clap(long, value_parser)]
    pub log: Option<PathBuf>,

    /// Specify the path of the config file.
    #[clap(long, value_parser)]
    pub config_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[clap(name = "emd-preview", disable_version_flag = true)]
pub struct EmdPreview {
    #[clap(flatten)]
    pub args: Args,

    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let EmdPreview { args, cmd } = EmdPreview::parse();

    let exit_code = match cmd {
        Cmd::Version => {
            println!("emd-preview {}", env!("CARGO_PKG_VERSION"));
            0
        }
        Cmd::Rpc(rpc) => {
            rpc.run(args).await?;
            0
        }
        Cmd::Render(render) => render.run(args).await?,
        Cmd::Check(check) => check.run(args).await,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}
