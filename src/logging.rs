use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "NOTEBOOKIFY_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Installs the stderr subscriber.
///
/// The filter comes from `NOTEBOOKIFY_LOG`, then `RUST_LOG`, then `warn`.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
