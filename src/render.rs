use sha2::{Digest as _, Sha256};

use crate::formats::{
    ConceptBlock, Example, ExampleBody, NodeId, Notebook, Section, Theorem, present,
};
use crate::validate::{CHOICE_MARKERS, placeholders};

pub fn render(notebook: &Notebook, tagged: bool) -> String {
    let mut writer = Writer::new(tagged);
    writer.notebook(notebook);
    writer.finish()
}

pub fn render_plain(notebook: &Notebook) -> String {
    render(notebook, false)
}

pub fn render_tagged(notebook: &Notebook) -> String {
    render(notebook, true)
}

/// Lowercase hex SHA-256 of the tagged rendering.
pub fn fingerprint(notebook: &Notebook) -> String {
    fingerprint_text(&render_tagged(notebook))
}

pub(crate) fn fingerprint_text(tagged: &str) -> String {
    hex::encode(Sha256::digest(tagged.as_bytes()))
}

/// Sections in render order: outline order first, then unlisted sections.
pub fn sections_in_order(notebook: &Notebook) -> Vec<&Section> {
    let mut ordered = notebook
        .outline
        .sections
        .keys()
        .filter_map(|key| notebook.sections.get(key))
        .collect::<Vec<_>>();
    ordered.extend(
        notebook
            .sections
            .iter()
            .filter(|(key, _)| !notebook.outline.sections.contains_key(key))
            .map(|(_, section)| section),
    );
    ordered
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

struct Writer {
    out: String,
    tagged: bool,
}

impl Writer {
    fn new(tagged: bool) -> Self {
        Self {
            out: String::new(),
            tagged,
        }
    }

    fn finish(self) -> String {
        let mut out = self.out.trim_end().to_owned();
        out.push('\n');
        out
    }

    fn open(&mut self, tag: &str, id: Option<&NodeId>, kind: Option<&str>) {
        if !self.tagged {
            return;
        }
        self.out.push('<');
        self.out.push_str(tag);
        if let Some(id) = id {
            self.out
                .push_str(&format!(" id=\"{}\"", escape_attr(id.as_str())));
        }
        if let Some(kind) = kind {
            self.out.push_str(&format!(" kind=\"{}\"", escape_attr(kind)));
        }
        self.out.push_str(">\n");
    }

    fn close(&mut self, tag: &str) {
        if !self.tagged {
            return;
        }
        while self.out.ends_with("\n\n") {
            self.out.pop();
        }
        self.out.push_str(&format!("</{tag}>\n\n"));
    }

    fn paragraph(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.out.push_str(text);
        self.out.push_str("\n\n");
    }

    /// Writes one field, preceded by its optional label.
    ///
    /// Empty fields are skipped, except in tagged mode when they carry an ID.
    fn field(&mut self, tag: &str, slot: &Option<NodeId>, label: Option<&str>, text: &str) {
        let id = present(slot);
        let visible = !text.trim().is_empty() || (self.tagged && id.is_some());
        if !visible {
            return;
        }
        if let Some(label) = label {
            self.paragraph(label);
        }
        self.open(tag, id, None);
        self.paragraph(text);
        self.close(tag);
    }

    fn notebook(&mut self, notebook: &Notebook) {
        self.paragraph(&format!("# {}", notebook.title));
        self.paragraph(&notebook.description);

        if !notebook.outline.sections.is_empty() {
            self.paragraph("## Contents");
            let contents = notebook
                .outline
                .sections
                .iter()
                .map(|(title, description)| {
                    let description = description.trim();
                    if description.is_empty() {
                        format!("- **{title}**")
                    } else {
                        format!("- **{title}**: {description}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            self.paragraph(&contents);
        }

        for section in sections_in_order(notebook) {
            self.section(section);
        }
    }

    fn section(&mut self, section: &Section) {
        self.open("Section", present(&section.id), None);
        self.field(
            "Title",
            &section.title_id,
            None,
            &format!("## {}", section.title),
        );
        self.field(
            "Introduction",
            &section.introduction_id,
            None,
            &section.introduction,
        );
        for block in &section.concept_blocks {
            self.concept_block(block);
        }
        self.examples("### Examples", "Examples", "Example", &section.examples);
        if !section.notes.is_empty() {
            self.paragraph("### Notes");
            let notes = section
                .notes
                .iter()
                .map(|note| format!("- {}", note.trim()))
                .collect::<Vec<_>>()
                .join("\n");
            self.paragraph(&notes);
        }
        self.field(
            "Summary",
            &section.summary_id,
            Some("### Summary"),
            &section.summary,
        );
        self.examples("### Exercises", "Exercises", "Exercise", &section.exercises);
        self.close("Section");
    }

    fn concept_block(&mut self, block: &ConceptBlock) {
        self.open("ConceptBlock", present(&block.id), None);
        self.paragraph(&format!("### {}", block.title));
        self.field("Definition", &block.definition_id, None, &block.definition);
        self.examples("#### Examples", "Examples", "Example", &block.examples);
        for note in &block.notes {
            self.paragraph(&format!("*Note:* {}", note.trim()));
        }
        for (index, theorem) in block.theorems.iter().enumerate() {
            self.theorem(theorem, index + 1);
        }
        self.close("ConceptBlock");
    }

    fn theorem(&mut self, theorem: &Theorem, number: usize) {
        self.open("Theorem", present(&theorem.id), None);
        match theorem.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                self.paragraph(&format!("#### Theorem {number}: {name}"));
            }
            _ => self.paragraph(&format!("#### Theorem {number}")),
        }
        self.field(
            "Statement",
            &theorem.statement_id,
            None,
            &theorem.statement,
        );
        self.field(
            "Proof",
            &theorem.proof_id,
            Some("*Proof.*"),
            theorem.proof.as_deref().unwrap_or_default(),
        );
        self.examples("**Examples**", "Examples", "Example", &theorem.examples);
        self.close("Theorem");
    }

    fn examples(&mut self, heading: &str, tag: &str, label: &str, examples: &[Example]) {
        if examples.is_empty() {
            return;
        }
        self.paragraph(heading);
        self.open(tag, None, None);
        for (index, example) in examples.iter().enumerate() {
            self.example(example, label, index + 1);
        }
        self.close(tag);
    }

    fn example(&mut self, example: &Example, label: &str, number: usize) {
        let kind = example.kind();
        self.open("ExampleItem", present(&example.id), Some(kind.as_str()));
        self.paragraph(&format!("**{label} {number}** ({})", kind.label()));
        self.field("Question", &example.question_id, None, &example.question);

        match &example.body {
            ExampleBody::MultipleChoice {
                options,
                answer,
                answer_id,
            } => {
                let options = options
                    .iter()
                    .zip(CHOICE_MARKERS)
                    .map(|(option, marker)| format!("{marker}. {}", option.trim()))
                    .collect::<Vec<_>>()
                    .join("\n");
                self.paragraph(&options);
                self.field("Answer", answer_id, Some("**Answer:**"), answer);
            }
            ExampleBody::FillInBlank { answers, answer_id } => {
                let mut keys = placeholders(&example.question);
                keys.retain(|key| answers.contains_key(key));
                let unplaced = answers
                    .keys()
                    .filter(|key| !keys.contains(*key))
                    .cloned()
                    .collect::<Vec<_>>();
                keys.extend(unplaced);
                let lines = keys
                    .iter()
                    .filter_map(|key| answers.get(key).map(|value| format!("- {key}: {value}")))
                    .collect::<Vec<_>>()
                    .join("\n");
                self.field("Answer", answer_id, Some("**Answers:**"), &lines);
            }
            ExampleBody::Proof { proof, proof_id } => {
                self.field("Proof", proof_id, Some("**Proof:**"), proof);
            }
            ExampleBody::ShortAnswer { answer, answer_id } => {
                self.field("Answer", answer_id, Some("**Answer:**"), answer);
            }
            ExampleBody::Code {
                language,
                answer,
                answer_id,
            } => {
                let code = if answer.trim().is_empty() {
                    String::new()
                } else {
                    format!(
                        "```{}\n{}\n```",
                        language.as_deref().unwrap_or_default().trim(),
                        answer.trim_end()
                    )
                };
                self.field("Answer", answer_id, Some("**Answer:**"), &code);
            }
        }

        self.field(
            "Explanation",
            &example.explanation_id,
            Some("**Explanation:**"),
            example.explanation.as_deref().unwrap_or_default(),
        );
        self.close("ExampleItem");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::locate::{collect_ids, locate};

    fn id(value: &str) -> Option<NodeId> {
        Some(NodeId::from(value))
    }

    fn sample() -> Notebook {
        let section = Section {
            id: id("s1"),
            title: "S1".to_owned(),
            title_id: id("s1t"),
            introduction: "Intro.".to_owned(),
            introduction_id: id("s1i"),
            concept_blocks: vec![ConceptBlock {
                id: id("b1"),
                title: "Limits".to_owned(),
                definition: "D1".to_owned(),
                definition_id: id("d1"),
                ..ConceptBlock::default()
            }],
            exercises: vec![Example {
                id: id("x1"),
                question_id: id("x1q"),
                body: ExampleBody::ShortAnswer {
                    answer: "A".to_owned(),
                    answer_id: id("x1a"),
                },
                ..Example::short_answer("Q?", "")
            }],
            ..Section::default()
        };
        let mut notebook = Notebook {
            title: "Calculus".to_owned(),
            ..Notebook::default()
        };
        notebook.sections.insert("S1", section);
        notebook
            .outline
            .sections
            .insert("S1", "Limits first.".to_owned());
        notebook
    }

    #[test]
    fn plain_rendering_has_no_markers() {
        let plain = render_plain(&sample());
        assert_eq!(
            plain,
            "# Calculus\n\n\
             ## Contents\n\n\
             - **S1**: Limits first.\n\n\
             ## S1\n\n\
             Intro.\n\n\
             ### Limits\n\n\
             D1\n\n\
             ### Exercises\n\n\
             **Exercise 1** (short answer)\n\n\
             Q?\n\n\
             **Answer:**\n\n\
             A\n"
        );
    }

    #[test]
    fn tagged_rendering_nests_markers_by_ownership() {
        let tagged = render_tagged(&sample());
        assert!(tagged.contains("<Section id=\"s1\">\n<Title id=\"s1t\">\n## S1\n</Title>\n"));
        assert!(tagged.contains("<Definition id=\"d1\">\nD1\n</Definition>\n</ConceptBlock>\n"));
        assert!(tagged.contains(
            "<Exercises>\n<ExampleItem id=\"x1\" kind=\"short_answer\">\n**Exercise 1** (short answer)\n"
        ));
        assert!(tagged.contains(
            "<Answer id=\"x1a\">\nA\n</Answer>\n</ExampleItem>\n</Exercises>\n</Section>\n"
        ));
        assert!(tagged.ends_with("</Section>\n"));
    }

    #[test]
    fn every_tagged_id_is_locatable() {
        let notebook = sample();
        let tagged = render_tagged(&notebook);
        let mut rendered = Vec::new();
        for chunk in tagged.split(" id=\"").skip(1) {
            if let Some(end) = chunk.find('"') {
                rendered.push(chunk[..end].to_owned());
            }
        }
        assert_eq!(rendered.len(), collect_ids(&notebook).len());
        for id in rendered {
            assert!(locate(&notebook, &id).is_some(), "{id} resolves");
        }
    }

    #[test]
    fn sections_follow_outline_order_then_unlisted() {
        let mut notebook = sample();
        notebook.sections.insert(
            "S0",
            Section {
                title: "S0".to_owned(),
                ..Section::default()
            },
        );
        notebook.sections.insert(
            "Loose",
            Section {
                title: "Loose".to_owned(),
                ..Section::default()
            },
        );
        notebook.outline.sections.insert_at(0, "S0", String::new());

        let titles = sections_in_order(&notebook)
            .into_iter()
            .map(|section| section.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["S0", "S1", "Loose"]);
    }

    #[test]
    fn example_variants_render_their_answers() {
        let mut answers = BTreeMap::new();
        answers.insert("b".to_owned(), "2".to_owned());
        answers.insert("a".to_owned(), "1".to_owned());
        let blanks = Example {
            body: ExampleBody::FillInBlank {
                answers,
                answer_id: None,
            },
            ..Example::short_answer("{{b}} then {{a}}", "")
        };
        let code = Example {
            body: ExampleBody::Code {
                language: Some("rust".to_owned()),
                answer: "fn main() {}".to_owned(),
                answer_id: None,
            },
            explanation: Some("Does nothing.".to_owned()),
            ..Example::short_answer("Write main.", "")
        };
        let choice = Example {
            body: ExampleBody::MultipleChoice {
                options: vec!["w".into(), "x".into(), "y".into(), "z".into()],
                answer: "C".to_owned(),
                answer_id: None,
            },
            ..Example::short_answer("Pick.", "")
        };
        let mut notebook = Notebook::default();
        notebook.sections.insert(
            "S",
            Section {
                title: "S".to_owned(),
                examples: vec![blanks, code, choice],
                ..Section::default()
            },
        );

        let plain = render_plain(&notebook);
        assert!(plain.contains("**Answers:**\n\n- b: 2\n- a: 1\n"));
        assert!(plain.contains("```rust\nfn main() {}\n```\n\n**Explanation:**\n\nDoes nothing."));
        assert!(plain.contains("Pick.\n\nA. w\nB. x\nC. y\nD. z\n\n**Answer:**\n\nC\n"));
    }

    #[test]
    fn attributes_are_escaped() {
        assert_eq!(escape_attr(r#"a&b"<c"#), "a&amp;b&quot;&lt;c");
    }

    #[test]
    fn fingerprint_tracks_tagged_content() {
        let mut notebook = sample();
        let before = fingerprint(&notebook);
        assert_eq!(before.len(), 64);
        assert_eq!(before, fingerprint(&notebook));

        if let Some(section) = notebook.sections.get_mut("S1") {
            section.summary = "Done.".to_owned();
        }
        assert_ne!(before, fingerprint(&notebook));
    }
}
