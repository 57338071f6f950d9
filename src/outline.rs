use std::collections::HashSet;

use pulldown_cmark::{Event, Parser, TagEnd};

use crate::config::EngineConfig;
use crate::formats::{Notebook, Section, TitleMap};

/// Produces the outline description of a section that has none yet.
pub trait DescribeSection {
    fn describe(&self, section: &Section) -> String;
}

/// Describes a section by the plain-text start of its introduction.
#[derive(Debug, Clone)]
pub struct IntroExcerpt {
    max_chars: usize,
    placeholder: String,
}

impl IntroExcerpt {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_chars: config.description_max_chars.max(1),
            placeholder: config.description_placeholder.clone(),
        }
    }
}

impl Default for IntroExcerpt {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl DescribeSection for IntroExcerpt {
    fn describe(&self, section: &Section) -> String {
        let text = markdown_to_text(&section.introduction);
        if text.is_empty() {
            return self.placeholder.clone();
        }
        truncate_chars(&text, self.max_chars)
    }
}

fn markdown_to_text(markdown: &str) -> String {
    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(
                TagEnd::Emphasis
                | TagEnd::Strong
                | TagEnd::Strikethrough
                | TagEnd::Link
                | TagEnd::Image,
            ) => {}
            Event::End(_) => text.push(' '),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.truncate(truncated.trim_end().len());
    truncated.push('…');
    truncated
}

/// What a synchronization pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub header_updated: bool,
    /// `(old key, new key)` per renamed section.
    pub renamed: Vec<(String, String)>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        !self.header_updated
            && self.renamed.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
    }
}

pub fn sync(notebook: &mut Notebook) -> SyncReport {
    sync_with(notebook, &IntroExcerpt::default())
}

/// Repairs the outline so that it matches the live sections.
pub fn sync_with(notebook: &mut Notebook, describer: &impl DescribeSection) -> SyncReport {
    let mut report = SyncReport::default();

    if notebook.outline.title != notebook.title {
        notebook.outline.title = notebook.title.clone();
        report.header_updated = true;
    }
    if notebook.outline.description != notebook.description {
        notebook.outline.description = notebook.description.clone();
        report.header_updated = true;
    }

    rekey_renamed_sections(notebook, &mut report);
    add_missing_entries(notebook, describer, &mut report);

    let live = notebook
        .sections
        .keys()
        .map(str::to_owned)
        .collect::<HashSet<_>>();
    notebook.outline.sections.retain(|key, _| {
        let keep = live.contains(key);
        if !keep {
            report.removed.push(key.to_owned());
        }
        keep
    });

    if !report.is_clean() {
        tracing::debug!(
            renamed = report.renamed.len(),
            added = report.added.len(),
            removed = report.removed.len(),
            header_updated = report.header_updated,
            "outline synchronized"
        );
    }
    report
}

fn rekey_renamed_sections(notebook: &mut Notebook, report: &mut SyncReport) {
    for index in 0..notebook.sections.len() {
        let Some((key, section)) = notebook.sections.get_index_mut(index) else {
            continue;
        };
        if section.title.trim().is_empty() {
            // Legacy entries may only carry the title as their key.
            section.title = key.to_owned();
            continue;
        }
        if section.title == key {
            continue;
        }

        let old_key = key.to_owned();
        let mut new_key = section.title.clone();
        if notebook.sections.contains_key(&new_key) {
            let unique = unique_title(&notebook.sections, &new_key);
            tracing::warn!(
                title = %new_key,
                renamed_to = %unique,
                "section title collides with another section; disambiguating"
            );
            new_key = unique;
        }
        if let Some((_, section)) = notebook.sections.get_index_mut(index) {
            section.title = new_key.clone();
        }

        notebook.sections.rekey_index(index, new_key.clone());
        if notebook.outline.sections.contains_key(&new_key) {
            // Stale entry: no live section carried this key before the rename.
            notebook.outline.sections.remove(&new_key);
        }
        notebook.outline.sections.rekey(&old_key, new_key.clone());
        report.renamed.push((old_key, new_key));
    }
}

fn unique_title(sections: &TitleMap<Section>, title: &str) -> String {
    let mut n = 2usize;
    loop {
        let candidate = format!("{title} ({n})");
        if !sections.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn add_missing_entries(
    notebook: &mut Notebook,
    describer: &impl DescribeSection,
    report: &mut SyncReport,
) {
    for index in 0..notebook.sections.len() {
        let Some((key, section)) = notebook.sections.get_index(index) else {
            continue;
        };
        if notebook.outline.sections.contains_key(key) {
            continue;
        }

        // Place the entry right after the closest preceding section that is
        // already listed, so that reading order follows collection order.
        let position = (0..index)
            .rev()
            .filter_map(|prev| notebook.sections.get_index(prev))
            .find_map(|(prev_key, _)| notebook.outline.sections.position(prev_key))
            .map_or(0, |pos| pos + 1);

        let description = describer.describe(section);
        let key = key.to_owned();
        notebook
            .outline
            .sections
            .insert_at(position, key.clone(), description);
        report.added.push(key);
    }
}
