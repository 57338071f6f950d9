use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;

use crate::formats::Notebook;

/// On-disk encoding of a notebook, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotebookFormat {
    Yaml,
    Json,
}

impl NotebookFormat {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => anyhow::bail!(
                "unsupported notebook extension (expected .yaml, .yml or .json): {}",
                path.display()
            ),
        }
    }

    pub fn parse(self, contents: &str) -> anyhow::Result<Notebook> {
        match self {
            Self::Yaml => serde_yaml::from_str(contents).context("parse notebook yaml"),
            Self::Json => serde_json::from_str(contents).context("parse notebook json"),
        }
    }

    pub fn to_string(self, notebook: &Notebook) -> anyhow::Result<String> {
        match self {
            Self::Yaml => serde_yaml::to_string(notebook).context("serialize notebook yaml"),
            Self::Json => {
                let mut json =
                    serde_json::to_string_pretty(notebook).context("serialize notebook json")?;
                json.push('\n');
                Ok(json)
            }
        }
    }
}

pub fn load(path: &Path) -> anyhow::Result<Notebook> {
    let format = NotebookFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read notebook: {}", path.display()))?;
    format
        .parse(&contents)
        .with_context(|| format!("load notebook: {}", path.display()))
}

/// Writes `notebook` to `path` through a temporary file in the same directory.
pub fn save(path: &Path, notebook: &Notebook) -> anyhow::Result<()> {
    let format = NotebookFormat::from_path(path)?;
    let contents = format.to_string(notebook)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create notebook dir: {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in: {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .context("write notebook temp file")?;
    tmp.flush().context("flush notebook temp file")?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("persist notebook: {}", path.display()))?;

    tracing::debug!(path = %path.display(), "saved notebook");
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Context as _;

    use super::*;
    use crate::formats::{ExampleBody, Section};

    #[test]
    fn format_follows_extension() -> anyhow::Result<()> {
        assert_eq!(
            NotebookFormat::from_path(Path::new("a/b.YML"))?,
            NotebookFormat::Yaml
        );
        assert_eq!(
            NotebookFormat::from_path(Path::new("b.json"))?,
            NotebookFormat::Json
        );
        assert!(NotebookFormat::from_path(Path::new("b.toml")).is_err());
        Ok(())
    }

    #[test]
    fn save_then_load_keeps_section_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut notebook = Notebook {
            title: "Order".to_owned(),
            ..Notebook::default()
        };
        for title in ["zeta", "alpha"] {
            notebook.sections.insert(
                title,
                Section {
                    title: title.to_owned(),
                    ..Section::default()
                },
            );
        }

        for name in ["nb.yaml", "nb.json"] {
            let path = dir.path().join(name);
            save(&path, &notebook)?;
            let loaded = load(&path)?;
            assert_eq!(loaded, notebook, "{name}");
            assert_eq!(
                loaded.sections.keys().collect::<Vec<_>>(),
                vec!["zeta", "alpha"]
            );
        }
        Ok(())
    }

    #[test]
    fn yaml_numeric_answers_load_as_text() -> anyhow::Result<()> {
        let yaml = r#"
title: Numbers
sections:
  S:
    title: S
    exercises:
      - question: 1 - 1?
        kind: short_answer
        answer: 0
      - question: "{{x}} + {{y}} = 5"
        kind: fill_in_blank
        answers: {x: 2, y: 3}
      - question: Which is prime?
        kind: multiple_choice
        options: [4, 6, 7, 9]
        answer: C
      - question: Print it.
        kind: code
        language: 3
        answer: true
"#;
        let notebook = NotebookFormat::Yaml.parse(yaml)?;
        let exercises = &notebook.sections.get("S").context("S")?.exercises;

        let ExampleBody::ShortAnswer { answer, .. } = &exercises[0].body else {
            anyhow::bail!("expected a short answer");
        };
        assert_eq!(answer, "0");
        let ExampleBody::FillInBlank { answers, .. } = &exercises[1].body else {
            anyhow::bail!("expected a fill in the blank");
        };
        assert_eq!(answers.get("x").map(String::as_str), Some("2"));
        assert_eq!(answers.get("y").map(String::as_str), Some("3"));
        let ExampleBody::MultipleChoice { options, .. } = &exercises[2].body else {
            anyhow::bail!("expected a multiple choice");
        };
        assert_eq!(options, &["4", "6", "7", "9"]);
        let ExampleBody::Code {
            language, answer, ..
        } = &exercises[3].body
        else {
            anyhow::bail!("expected code");
        };
        assert_eq!(language.as_deref(), Some("3"));
        assert_eq!(answer, "true");
        Ok(())
    }
}
