use anyhow::Context as _;

pub const DEFAULT_DESCRIPTION_MAX_CHARS: usize = 200;
pub const DEFAULT_DESCRIPTION_PLACEHOLDER: &str = "Description pending.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Length cap for outline descriptions synthesized from introductions.
    pub description_max_chars: usize,
    /// Outline description used when a section has no introduction.
    pub description_placeholder: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            description_max_chars: DEFAULT_DESCRIPTION_MAX_CHARS,
            description_placeholder: DEFAULT_DESCRIPTION_PLACEHOLDER.to_owned(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("NOTEBOOKIFY_DESCRIPTION_MAX_CHARS") {
            config.description_max_chars = parse_max_chars(&raw)
                .context("parse NOTEBOOKIFY_DESCRIPTION_MAX_CHARS")?;
        }
        if let Ok(placeholder) = std::env::var("NOTEBOOKIFY_DESCRIPTION_PLACEHOLDER")
            && !placeholder.trim().is_empty()
        {
            config.description_placeholder = placeholder;
        }
        Ok(config)
    }
}

fn parse_max_chars(raw: &str) -> anyhow::Result<usize> {
    let value: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("not a number: `{raw}`"))?;
    if value == 0 {
        anyhow::bail!("must be > 0");
    }
    Ok(value)
}
