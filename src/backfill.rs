use crate::fields::FieldName;
use crate::formats::{ConceptBlock, Example, Node, NodeId, NodeKind, Notebook, Section, Theorem};
use crate::ids::IdAllocator;

/// Nodes that can receive IDs for themselves and all their descendants.
pub trait AssignIds {
    /// Fills every missing ID under this node, returning the node's own ID.
    fn assign_ids_with(&mut self, parent: Option<&NodeId>, ids: &mut IdAllocator) -> NodeId;

    /// Drops every ID under this node, so that new ones get minted.
    fn clear_ids(&mut self);
}

/// Assigns IDs to every node and field of `notebook` that lacks one.
///
/// Returns the number of IDs allocated; zero for a fully identified tree.
pub fn ensure_ids(notebook: &mut Notebook) -> usize {
    let mut ids = IdAllocator::seeded(notebook);
    for section in notebook.sections.values_mut() {
        section.assign_ids_with(None, &mut ids);
    }
    let allocated = ids.allocated();
    if allocated > 0 {
        tracing::debug!(allocated, "backfilled notebook ids");
    }
    allocated
}

/// Assigns IDs to a detached node and its descendants.
///
/// Returns the number of IDs allocated.
pub fn assign_ids<N: AssignIds + ?Sized>(node: &mut N, parent: Option<&NodeId>) -> usize {
    let mut ids = IdAllocator::new();
    node.assign_ids_with(parent, &mut ids);
    ids.allocated()
}

impl AssignIds for Section {
    fn assign_ids_with(&mut self, parent: Option<&NodeId>, ids: &mut IdAllocator) -> NodeId {
        let own = ids.fill(&mut self.id, NodeKind::Section, parent);
        ids.fill(&mut self.title_id, FieldName::Title, Some(&own));
        ids.fill(&mut self.introduction_id, FieldName::Introduction, Some(&own));
        ids.fill(&mut self.summary_id, FieldName::Summary, Some(&own));
        for block in &mut self.concept_blocks {
            block.assign_ids_with(Some(&own), ids);
        }
        for example in self.examples.iter_mut().chain(self.exercises.iter_mut()) {
            example.assign_ids_with(Some(&own), ids);
        }
        own
    }

    fn clear_ids(&mut self) {
        self.id = None;
        self.title_id = None;
        self.introduction_id = None;
        self.summary_id = None;
        self.concept_blocks.iter_mut().for_each(AssignIds::clear_ids);
        self.examples.iter_mut().for_each(AssignIds::clear_ids);
        self.exercises.iter_mut().for_each(AssignIds::clear_ids);
    }
}

impl AssignIds for ConceptBlock {
    fn assign_ids_with(&mut self, parent: Option<&NodeId>, ids: &mut IdAllocator) -> NodeId {
        let own = ids.fill(&mut self.id, NodeKind::ConceptBlock, parent);
        ids.fill(&mut self.definition_id, FieldName::Definition, Some(&own));
        for example in &mut self.examples {
            example.assign_ids_with(Some(&own), ids);
        }
        for theorem in &mut self.theorems {
            theorem.assign_ids_with(Some(&own), ids);
        }
        own
    }

    fn clear_ids(&mut self) {
        self.id = None;
        self.definition_id = None;
        self.examples.iter_mut().for_each(AssignIds::clear_ids);
        self.theorems.iter_mut().for_each(AssignIds::clear_ids);
    }
}

impl AssignIds for Theorem {
    fn assign_ids_with(&mut self, parent: Option<&NodeId>, ids: &mut IdAllocator) -> NodeId {
        let own = ids.fill(&mut self.id, NodeKind::Theorem, parent);
        ids.fill(&mut self.statement_id, FieldName::Statement, Some(&own));
        ids.fill(&mut self.proof_id, FieldName::Proof, Some(&own));
        for example in &mut self.examples {
            example.assign_ids_with(Some(&own), ids);
        }
        own
    }

    fn clear_ids(&mut self) {
        self.id = None;
        self.statement_id = None;
        self.proof_id = None;
        self.examples.iter_mut().for_each(AssignIds::clear_ids);
    }
}

impl AssignIds for Example {
    fn assign_ids_with(&mut self, parent: Option<&NodeId>, ids: &mut IdAllocator) -> NodeId {
        let own = ids.fill(&mut self.id, NodeKind::Example, parent);
        ids.fill(&mut self.question_id, FieldName::Question, Some(&own));
        if let Some(slot) = self.body.answer_id_mut() {
            ids.fill(slot, FieldName::Answer, Some(&own));
        }
        ids.fill(&mut self.explanation_id, FieldName::Explanation, Some(&own));
        if let Some(slot) = self.body.proof_id_mut() {
            ids.fill(slot, FieldName::Proof, Some(&own));
        }
        own
    }

    fn clear_ids(&mut self) {
        self.id = None;
        self.question_id = None;
        self.explanation_id = None;
        if let Some(slot) = self.body.answer_id_mut() {
            *slot = None;
        }
        if let Some(slot) = self.body.proof_id_mut() {
            *slot = None;
        }
    }
}

impl AssignIds for Node {
    fn assign_ids_with(&mut self, parent: Option<&NodeId>, ids: &mut IdAllocator) -> NodeId {
        match self {
            Self::Section(node) => node.assign_ids_with(parent, ids),
            Self::ConceptBlock(node) => node.assign_ids_with(parent, ids),
            Self::Theorem(node) => node.assign_ids_with(parent, ids),
            Self::Example(node) => node.assign_ids_with(parent, ids),
        }
    }

    fn clear_ids(&mut self) {
        match self {
            Self::Section(node) => node.clear_ids(),
            Self::ConceptBlock(node) => node.clear_ids(),
            Self::Theorem(node) => node.clear_ids(),
            Self::Example(node) => node.clear_ids(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ExampleBody;
    use crate::locate::{collect_ids, locate};

    fn legacy_notebook() -> Notebook {
        let block = ConceptBlock {
            title: "Derivative".to_owned(),
            definition: "Rate of change.".to_owned(),
            examples: vec![Example::short_answer("d/dx x^2?", "2x")],
            theorems: vec![Theorem {
                statement: "Differentiable implies continuous.".to_owned(),
                ..Theorem::default()
            }],
            ..ConceptBlock::default()
        };
        let section = Section {
            id: Some(NodeId::from("sec-legacy")),
            title: "Derivatives".to_owned(),
            concept_blocks: vec![block],
            exercises: vec![Example {
                body: ExampleBody::Proof {
                    proof: "By definition.".to_owned(),
                    proof_id: None,
                },
                ..Example::short_answer("Prove it.", "")
            }],
            ..Section::default()
        };
        let mut notebook = Notebook {
            title: "Calculus".to_owned(),
            ..Notebook::default()
        };
        notebook.sections.insert("Derivatives", section);
        notebook
    }

    #[test]
    fn ensure_ids_fills_missing_ids_and_keeps_existing() {
        let mut notebook = legacy_notebook();
        let allocated = ensure_ids(&mut notebook);

        // section: 3 fields; block: 1 + 1 field; block example: 1 + 3 fields;
        // theorem: 1 + 2 fields; exercise: 1 + 3 fields.
        assert_eq!(allocated, 3 + 2 + 4 + 3 + 4);

        let section = notebook.sections.get("Derivatives").expect("section");
        assert_eq!(section.id, Some(NodeId::from("sec-legacy")));
        let title_id = section.title_id.as_ref().expect("title id");
        assert!(title_id.as_str().starts_with("sec-legacy.title-"));

        let block_id = section.concept_blocks[0].id.as_ref().expect("block id");
        assert!(block_id.as_str().starts_with("sec-legacy.concept_block-"));
    }

    #[test]
    fn ensure_ids_is_idempotent() {
        let mut notebook = legacy_notebook();
        ensure_ids(&mut notebook);
        let once = notebook.clone();

        assert_eq!(ensure_ids(&mut notebook), 0);
        assert_eq!(notebook, once);
    }

    #[test]
    fn backfilled_ids_are_unique_and_locatable() {
        let mut notebook = legacy_notebook();
        ensure_ids(&mut notebook);

        let ids = collect_ids(&notebook);
        let unique = ids.iter().collect::<std::collections::HashSet<_>>();
        assert_eq!(unique.len(), ids.len());
        for id in &ids {
            assert!(locate(&notebook, id.as_str()).is_some(), "{id} resolves");
        }
    }

    #[test]
    fn assign_ids_covers_descendants_of_detached_node() {
        let mut block = ConceptBlock {
            examples: vec![Example::short_answer("Q?", "A")],
            ..ConceptBlock::default()
        };
        let parent = NodeId::from("sec-1");
        let allocated = assign_ids(&mut block, Some(&parent));

        assert_eq!(allocated, 2 + 4);
        let example_id = block.examples[0].id.as_ref().expect("example id");
        let block_id = block.id.as_ref().expect("block id");
        assert!(example_id.as_str().starts_with(block_id.as_str()));
    }

    #[test]
    fn clear_ids_then_assign_mints_fresh_ids() {
        let mut example = Example {
            id: Some(NodeId::from("caller-supplied")),
            ..Example::short_answer("Q?", "A")
        };
        example.clear_ids();
        assign_ids(&mut example, None);
        assert_ne!(example.id, Some(NodeId::from("caller-supplied")));
        assert!(example.question_id.is_some());
    }
}
