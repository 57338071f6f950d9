#![allow(dead_code)]

use notebookify::backfill::ensure_ids;
use notebookify::formats::{ConceptBlock, Example, Notebook, NodeId, Section};
use notebookify::outline::sync;

pub fn id(value: &str) -> Option<NodeId> {
    Some(NodeId::from(value))
}

/// Two sections; `S1` holds block `b1` whose definition has field ID `d1`.
pub fn calculus() -> Notebook {
    let mut notebook = Notebook {
        title: "Calculus".to_owned(),
        description: "A short course.".to_owned(),
        ..Notebook::default()
    };
    notebook.sections.insert(
        "S1",
        Section {
            id: id("s1"),
            title: "S1".to_owned(),
            title_id: id("s1-title"),
            introduction: "Limits come first.".to_owned(),
            introduction_id: id("s1-intro"),
            concept_blocks: vec![ConceptBlock {
                id: id("b1"),
                title: "Limits".to_owned(),
                definition: "D1".to_owned(),
                definition_id: id("d1"),
                examples: vec![
                    Example {
                        id: id("e1"),
                        ..Example::short_answer("lim x->0 of x?", "0")
                    },
                    Example {
                        id: id("e2"),
                        explanation: Some("Squeeze it.".to_owned()),
                        ..Example::short_answer("lim x->0 of sin(x)/x?", "1")
                    },
                ],
                ..ConceptBlock::default()
            }],
            exercises: vec![Example {
                id: id("x1"),
                ..Example::short_answer("lim x->1 of x^2?", "1")
            }],
            ..Section::default()
        },
    );
    notebook.sections.insert(
        "S2",
        Section {
            id: id("s2"),
            title: "S2".to_owned(),
            title_id: id("s2-title"),
            introduction: "Then derivatives.".to_owned(),
            ..Section::default()
        },
    );
    ensure_ids(&mut notebook);
    sync(&mut notebook);
    notebook
}
