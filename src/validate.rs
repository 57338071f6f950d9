use std::collections::{BTreeSet, HashMap};
use std::ops::ControlFlow;

use crate::fields::FieldName;
use crate::formats::{ConceptBlock, Example, ExampleBody, Node, Notebook, Section, Theorem};
use crate::locate::{NodeRef, collect_ids, walk};

pub const CHOICE_MARKERS: [&str; 4] = ["A", "B", "C", "D"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("multiple-choice example needs exactly 4 options, found {0}")]
    OptionCount(usize),
    #[error("multiple-choice answer must be one of A, B, C, D, found `{0}`")]
    AnswerMarker(String),
    #[error(
        "fill-in-blank answers do not match placeholders (missing: {missing:?}, unexpected: {unexpected:?})"
    )]
    BlankMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("{kind} field `{field}` must not be empty")]
    EmptyField {
        kind: &'static str,
        field: FieldName,
    },
    #[error("section title must not be blank")]
    BlankSectionTitle,
    #[error("section title `{0}` is already used")]
    DuplicateSectionTitle(String),
}

/// Placeholder keys written as `{{key}}` in `text`, in order of appearance.
pub fn placeholders(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let key = after[..end].trim();
        if !key.is_empty() && !key.contains('{') && !keys.iter().any(|k| k == key) {
            keys.push(key.to_owned());
        }
        rest = &after[end + 2..];
    }
    keys
}

pub fn validate_example(example: &Example) -> Result<(), ContentError> {
    let kind = example.kind().as_str();
    if example.question.trim().is_empty() {
        return Err(ContentError::EmptyField {
            kind,
            field: FieldName::Question,
        });
    }

    match &example.body {
        ExampleBody::MultipleChoice {
            options, answer, ..
        } => {
            if options.len() != CHOICE_MARKERS.len() {
                return Err(ContentError::OptionCount(options.len()));
            }
            let marker = answer.trim().to_ascii_uppercase();
            if !CHOICE_MARKERS.contains(&marker.as_str()) {
                return Err(ContentError::AnswerMarker(answer.clone()));
            }
        }
        ExampleBody::FillInBlank { answers, .. } => {
            let expected = placeholders(&example.question)
                .into_iter()
                .collect::<BTreeSet<_>>();
            let actual = answers.keys().cloned().collect::<BTreeSet<_>>();
            if expected != actual {
                return Err(ContentError::BlankMismatch {
                    missing: expected.difference(&actual).cloned().collect(),
                    unexpected: actual.difference(&expected).cloned().collect(),
                });
            }
        }
        ExampleBody::Proof { proof, .. } => {
            if proof.trim().is_empty() {
                return Err(ContentError::EmptyField {
                    kind,
                    field: FieldName::Proof,
                });
            }
        }
        ExampleBody::ShortAnswer { answer, .. } | ExampleBody::Code { answer, .. } => {
            if answer.trim().is_empty() {
                return Err(ContentError::EmptyField {
                    kind,
                    field: FieldName::Answer,
                });
            }
        }
    }
    Ok(())
}

/// Validates every example inside `node`, including nested ones.
pub fn validate_node(node: &Node) -> Result<(), ContentError> {
    match node {
        Node::Section(section) => validate_section(section),
        Node::ConceptBlock(block) => validate_block(block),
        Node::Theorem(theorem) => validate_theorem(theorem),
        Node::Example(example) => validate_example(example),
    }
}

pub fn validate_section(section: &Section) -> Result<(), ContentError> {
    if section.title.trim().is_empty() {
        return Err(ContentError::BlankSectionTitle);
    }
    section.concept_blocks.iter().try_for_each(validate_block)?;
    section
        .examples
        .iter()
        .chain(&section.exercises)
        .try_for_each(validate_example)
}

fn validate_block(block: &ConceptBlock) -> Result<(), ContentError> {
    block.examples.iter().try_for_each(validate_example)?;
    block.theorems.iter().try_for_each(validate_theorem)
}

fn validate_theorem(theorem: &Theorem) -> Result<(), ContentError> {
    theorem.examples.iter().try_for_each(validate_example)
}

/// One problem found by [`check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub location: String,
    pub message: String,
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Reports every invariant violation in `notebook`.
pub fn check(notebook: &Notebook) -> Vec<Issue> {
    let mut issues = Vec::new();

    let mut seen: HashMap<String, usize> = HashMap::new();
    for id in collect_ids(notebook) {
        *seen.entry(id.as_str().to_owned()).or_default() += 1;
    }
    let mut duplicates = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .collect::<Vec<_>>();
    duplicates.sort();
    for (id, count) in duplicates {
        issues.push(Issue {
            location: format!("id `{id}`"),
            message: format!("assigned {count} times"),
        });
    }

    for key in notebook.sections.keys() {
        if !notebook.outline.sections.contains_key(key) {
            issues.push(Issue {
                location: format!("section `{key}`"),
                message: "missing from outline".to_owned(),
            });
        }
    }
    for key in notebook.outline.sections.keys() {
        if !notebook.sections.contains_key(key) {
            issues.push(Issue {
                location: format!("outline `{key}`"),
                message: "names no section".to_owned(),
            });
        }
    }
    for (key, section) in notebook.sections.iter() {
        if section.title != key {
            issues.push(Issue {
                location: format!("section `{key}`"),
                message: format!("title `{}` differs from its key", section.title),
            });
        }
        if section.title.trim().is_empty() {
            issues.push(Issue {
                location: format!("section `{key}`"),
                message: ContentError::BlankSectionTitle.to_string(),
            });
        }
    }

    let _ = walk(notebook, &mut |node, path| {
        if let NodeRef::Example(example) = node
            && let Err(err) = validate_example(example)
        {
            issues.push(Issue {
                location: path.to_string(),
                message: err.to_string(),
            });
        }
        ControlFlow::<()>::Continue(())
    });

    issues
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::formats::NodeId;

    fn multiple_choice(options: usize, answer: &str) -> Example {
        Example {
            body: ExampleBody::MultipleChoice {
                options: (0..options).map(|i| format!("option {i}")).collect(),
                answer: answer.to_owned(),
                answer_id: None,
            },
            ..Example::short_answer("Pick one.", "")
        }
    }

    #[test]
    fn placeholders_are_collected_in_order_without_duplicates() {
        assert_eq!(
            placeholders("{{b}} then {{ a }} then {{b}} and {{}} {{open"),
            vec!["b", "a"]
        );
    }

    #[test]
    fn multiple_choice_requires_four_options_and_marker() {
        assert_eq!(validate_example(&multiple_choice(4, "b")), Ok(()));
        assert_eq!(
            validate_example(&multiple_choice(3, "A")),
            Err(ContentError::OptionCount(3))
        );
        assert_eq!(
            validate_example(&multiple_choice(4, "E")),
            Err(ContentError::AnswerMarker("E".to_owned()))
        );
    }

    #[test]
    fn fill_in_blank_answers_must_match_placeholders() {
        let mut answers = BTreeMap::new();
        answers.insert("x".to_owned(), "2".to_owned());
        answers.insert("z".to_owned(), "9".to_owned());
        let example = Example {
            body: ExampleBody::FillInBlank {
                answers,
                answer_id: None,
            },
            ..Example::short_answer("{{x}} + {{y}} = 5", "")
        };

        assert_eq!(
            validate_example(&example),
            Err(ContentError::BlankMismatch {
                missing: vec!["y".to_owned()],
                unexpected: vec!["z".to_owned()],
            })
        );
    }

    #[test]
    fn check_reports_duplicate_ids_and_outline_drift() {
        let mut notebook = Notebook::default();
        notebook.sections.insert(
            "A",
            Section {
                id: Some(NodeId::from("dup")),
                title: "A".to_owned(),
                exercises: vec![Example {
                    id: Some(NodeId::from("dup")),
                    ..Example::short_answer("Q?", "A")
                }],
                ..Section::default()
            },
        );
        notebook.outline.sections.insert("Gone", "stale".to_owned());

        let issues = check(&notebook);
        let rendered = issues.iter().map(Issue::to_string).collect::<Vec<_>>();
        assert_eq!(
            rendered,
            vec![
                "id `dup`: assigned 2 times",
                "section `A`: missing from outline",
                "outline `Gone`: names no section",
            ]
        );
    }
}
