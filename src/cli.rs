use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the plain or ID-tagged markdown rendering.
    Render(RenderArgs),
    /// Assign missing IDs and repair the outline.
    Ids(IdsArgs),
    /// Resolve an ID to the node or field carrying it.
    Locate(LocateArgs),
    /// Apply one edit request.
    Apply(ApplyArgs),
    /// Report invariant violations.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Notebook file (.yaml, .yml or .json).
    #[arg(long)]
    pub notebook: String,

    /// Wrap nodes and fields in ID markers.
    #[arg(long, default_value_t = false)]
    pub tagged: bool,

    /// Output file (stdout when omitted).
    #[arg(long)]
    pub out: Option<String>,
}

#[derive(Debug, Args)]
pub struct IdsArgs {
    /// Notebook file (.yaml, .yml or .json).
    #[arg(long)]
    pub notebook: String,

    /// Write the result here instead of overwriting the notebook.
    #[arg(long)]
    pub out: Option<String>,
}

#[derive(Debug, Args)]
pub struct LocateArgs {
    /// Notebook file (.yaml, .yml or .json).
    #[arg(long)]
    pub notebook: String,

    /// Object or field ID to resolve.
    #[arg(long)]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Notebook file (.yaml, .yml or .json).
    #[arg(long)]
    pub notebook: String,

    /// JSON edit request (`-` reads stdin).
    #[arg(long)]
    pub request: String,

    /// Write the result here instead of overwriting the notebook.
    #[arg(long)]
    pub out: Option<String>,

    /// Reject the edit unless the notebook still has this fingerprint.
    #[arg(long)]
    pub expect_fingerprint: Option<String>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Notebook file (.yaml, .yml or .json).
    #[arg(long)]
    pub notebook: String,
}
