use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    notebookify::logging::init().context("init logging")?;

    let cli = notebookify::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        notebookify::cli::Command::Render(args) => {
            notebookify::commands::render_notebook(args).context("render")?;
        }
        notebookify::cli::Command::Ids(args) => {
            notebookify::commands::ids(args).context("ids")?;
        }
        notebookify::cli::Command::Locate(args) => {
            notebookify::commands::locate_id(args).context("locate")?;
        }
        notebookify::cli::Command::Apply(args) => {
            notebookify::commands::apply(args).context("apply")?;
        }
        notebookify::cli::Command::Check(args) => {
            notebookify::commands::check(args).context("check")?;
        }
    }

    Ok(())
}
