use std::fmt;
use std::ops::ControlFlow;

use crate::fields::FieldName;
use crate::formats::{
    ConceptBlock, Example, Node, NodeId, NodeKind, Notebook, Section, Theorem, present,
};

/// A child collection of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    ConceptBlocks,
    Theorems,
    Examples,
    Exercises,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConceptBlocks => "concept_blocks",
            Self::Theorems => "theorems",
            Self::Examples => "examples",
            Self::Exercises => "exercises",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub collection: Collection,
    pub index: usize,
}

/// Structural address of a node: section position plus child slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    pub section: usize,
    pub slots: Vec<Slot>,
}

impl NodePath {
    pub fn section(index: usize) -> Self {
        Self {
            section: index,
            slots: Vec::new(),
        }
    }

    /// Splits off the last slot, yielding the parent path.
    pub fn split_last(&self) -> Option<(NodePath, Slot)> {
        let (last, rest) = self.slots.split_last()?;
        Some((
            NodePath {
                section: self.section,
                slots: rest.to_vec(),
            },
            *last,
        ))
    }

    pub fn resolve<'a>(&self, notebook: &'a Notebook) -> Option<NodeRef<'a>> {
        let (_, section) = notebook.sections.get_index(self.section)?;
        let mut node = NodeRef::Section(section);
        for slot in &self.slots {
            node = node.child(*slot)?;
        }
        Some(node)
    }

    pub fn resolve_mut<'a>(&self, notebook: &'a mut Notebook) -> Option<NodeMut<'a>> {
        let (_, section) = notebook.sections.get_index_mut(self.section)?;
        let mut node = NodeMut::Section(section);
        for slot in &self.slots {
            node = node.child(*slot)?;
        }
        Some(node)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sections[{}]", self.section)?;
        for slot in &self.slots {
            write!(f, ".{}[{}]", slot.collection, slot.index)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Section(&'a Section),
    ConceptBlock(&'a ConceptBlock),
    Theorem(&'a Theorem),
    Example(&'a Example),
}

impl<'a> NodeRef<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Section(_) => NodeKind::Section,
            Self::ConceptBlock(_) => NodeKind::ConceptBlock,
            Self::Theorem(_) => NodeKind::Theorem,
            Self::Example(_) => NodeKind::Example,
        }
    }

    pub fn id(&self) -> Option<&'a NodeId> {
        match *self {
            Self::Section(node) => present(&node.id),
            Self::ConceptBlock(node) => present(&node.id),
            Self::Theorem(node) => present(&node.id),
            Self::Example(node) => present(&node.id),
        }
    }

    pub fn field_ids(&self) -> Vec<(FieldName, &'a NodeId)> {
        match *self {
            Self::Section(node) => node.field_ids(),
            Self::ConceptBlock(node) => node.field_ids(),
            Self::Theorem(node) => node.field_ids(),
            Self::Example(node) => node.field_ids(),
        }
    }

    pub fn to_node(&self) -> Node {
        match *self {
            Self::Section(node) => Node::Section(node.clone()),
            Self::ConceptBlock(node) => Node::ConceptBlock(node.clone()),
            Self::Theorem(node) => Node::Theorem(node.clone()),
            Self::Example(node) => Node::Example(node.clone()),
        }
    }

    pub fn child(self, slot: Slot) -> Option<NodeRef<'a>> {
        match (self, slot.collection) {
            (Self::Section(s), Collection::ConceptBlocks) => {
                s.concept_blocks.get(slot.index).map(NodeRef::ConceptBlock)
            }
            (Self::Section(s), Collection::Examples) => {
                s.examples.get(slot.index).map(NodeRef::Example)
            }
            (Self::Section(s), Collection::Exercises) => {
                s.exercises.get(slot.index).map(NodeRef::Example)
            }
            (Self::ConceptBlock(b), Collection::Examples) => {
                b.examples.get(slot.index).map(NodeRef::Example)
            }
            (Self::ConceptBlock(b), Collection::Theorems) => {
                b.theorems.get(slot.index).map(NodeRef::Theorem)
            }
            (Self::Theorem(t), Collection::Examples) => {
                t.examples.get(slot.index).map(NodeRef::Example)
            }
            _ => None,
        }
    }

    /// Length of one of this node's child collections.
    pub fn collection_len(&self, collection: Collection) -> Option<usize> {
        match (*self, collection) {
            (Self::Section(s), Collection::ConceptBlocks) => Some(s.concept_blocks.len()),
            (Self::Section(s), Collection::Examples) => Some(s.examples.len()),
            (Self::Section(s), Collection::Exercises) => Some(s.exercises.len()),
            (Self::ConceptBlock(b), Collection::Examples) => Some(b.examples.len()),
            (Self::ConceptBlock(b), Collection::Theorems) => Some(b.theorems.len()),
            (Self::Theorem(t), Collection::Examples) => Some(t.examples.len()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum NodeMut<'a> {
    Section(&'a mut Section),
    ConceptBlock(&'a mut ConceptBlock),
    Theorem(&'a mut Theorem),
    Example(&'a mut Example),
}

impl<'a> NodeMut<'a> {
    pub fn child(self, slot: Slot) -> Option<NodeMut<'a>> {
        match (self, slot.collection) {
            (Self::Section(s), Collection::ConceptBlocks) => {
                s.concept_blocks.get_mut(slot.index).map(NodeMut::ConceptBlock)
            }
            (Self::Section(s), Collection::Examples) => {
                s.examples.get_mut(slot.index).map(NodeMut::Example)
            }
            (Self::Section(s), Collection::Exercises) => {
                s.exercises.get_mut(slot.index).map(NodeMut::Example)
            }
            (Self::ConceptBlock(b), Collection::Examples) => {
                b.examples.get_mut(slot.index).map(NodeMut::Example)
            }
            (Self::ConceptBlock(b), Collection::Theorems) => {
                b.theorems.get_mut(slot.index).map(NodeMut::Theorem)
            }
            (Self::Theorem(t), Collection::Examples) => {
                t.examples.get_mut(slot.index).map(NodeMut::Example)
            }
            _ => None,
        }
    }

    /// Overwrites this node with `node`; fails when the kinds differ.
    pub fn replace(self, node: Node) -> Result<(), Node> {
        match (self, node) {
            (Self::Section(slot), Node::Section(node)) => *slot = node,
            (Self::ConceptBlock(slot), Node::ConceptBlock(node)) => *slot = node,
            (Self::Theorem(slot), Node::Theorem(node)) => *slot = node,
            (Self::Example(slot), Node::Example(node)) => *slot = node,
            (_, node) => return Err(node),
        }
        Ok(())
    }

    /// Inserts `node` into one of this node's child collections.
    ///
    /// The caller checks `index` against the collection length first.
    pub fn insert(self, collection: Collection, index: usize, node: Node) -> Result<(), Node> {
        match (self, collection, node) {
            (Self::Section(s), Collection::ConceptBlocks, Node::ConceptBlock(n)) => {
                s.concept_blocks.insert(index, n)
            }
            (Self::Section(s), Collection::Examples, Node::Example(n)) => {
                s.examples.insert(index, n)
            }
            (Self::Section(s), Collection::Exercises, Node::Example(n)) => {
                s.exercises.insert(index, n)
            }
            (Self::ConceptBlock(b), Collection::Examples, Node::Example(n)) => {
                b.examples.insert(index, n)
            }
            (Self::ConceptBlock(b), Collection::Theorems, Node::Theorem(n)) => {
                b.theorems.insert(index, n)
            }
            (Self::Theorem(t), Collection::Examples, Node::Example(n)) => {
                t.examples.insert(index, n)
            }
            (_, _, node) => return Err(node),
        }
        Ok(())
    }

    /// Removes the child at `slot`, returning it.
    pub fn remove(self, slot: Slot) -> Option<Node> {
        fn take<T>(items: &mut Vec<T>, index: usize) -> Option<T> {
            (index < items.len()).then(|| items.remove(index))
        }

        match (self, slot.collection) {
            (Self::Section(s), Collection::ConceptBlocks) => {
                take(&mut s.concept_blocks, slot.index).map(Node::ConceptBlock)
            }
            (Self::Section(s), Collection::Examples) => {
                take(&mut s.examples, slot.index).map(Node::Example)
            }
            (Self::Section(s), Collection::Exercises) => {
                take(&mut s.exercises, slot.index).map(Node::Example)
            }
            (Self::ConceptBlock(b), Collection::Examples) => {
                take(&mut b.examples, slot.index).map(Node::Example)
            }
            (Self::ConceptBlock(b), Collection::Theorems) => {
                take(&mut b.theorems, slot.index).map(Node::Theorem)
            }
            (Self::Theorem(t), Collection::Examples) => {
                take(&mut t.examples, slot.index).map(Node::Example)
            }
            _ => None,
        }
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct Found<'a> {
    pub node: NodeRef<'a>,
    /// Set when the ID named a field of `node` rather than the node itself.
    pub field: Option<FieldName>,
    pub path: NodePath,
}

impl Found<'_> {
    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }
}

/// Visits every node in traversal order until `visit` breaks.
pub fn walk<'a, B>(
    notebook: &'a Notebook,
    visit: &mut impl FnMut(NodeRef<'a>, &NodePath) -> ControlFlow<B>,
) -> ControlFlow<B> {
    for (index, section) in notebook.sections.values().enumerate() {
        let mut path = NodePath::section(index);
        walk_section(section, &mut path, visit)?;
    }
    ControlFlow::Continue(())
}

fn walk_section<'a, B>(
    section: &'a Section,
    path: &mut NodePath,
    visit: &mut impl FnMut(NodeRef<'a>, &NodePath) -> ControlFlow<B>,
) -> ControlFlow<B> {
    visit(NodeRef::Section(section), path)?;
    for (index, block) in section.concept_blocks.iter().enumerate() {
        path.slots.push(Slot {
            collection: Collection::ConceptBlocks,
            index,
        });
        let flow = walk_block(block, path, visit);
        path.slots.pop();
        flow?;
    }
    walk_examples(&section.examples, Collection::Examples, path, visit)?;
    walk_examples(&section.exercises, Collection::Exercises, path, visit)
}

fn walk_block<'a, B>(
    block: &'a ConceptBlock,
    path: &mut NodePath,
    visit: &mut impl FnMut(NodeRef<'a>, &NodePath) -> ControlFlow<B>,
) -> ControlFlow<B> {
    visit(NodeRef::ConceptBlock(block), path)?;
    walk_examples(&block.examples, Collection::Examples, path, visit)?;
    for (index, theorem) in block.theorems.iter().enumerate() {
        path.slots.push(Slot {
            collection: Collection::Theorems,
            index,
        });
        let flow = match visit(NodeRef::Theorem(theorem), path) {
            ControlFlow::Continue(()) => {
                walk_examples(&theorem.examples, Collection::Examples, path, visit)
            }
            stop => stop,
        };
        path.slots.pop();
        flow?;
    }
    ControlFlow::Continue(())
}

fn walk_examples<'a, B>(
    examples: &'a [Example],
    collection: Collection,
    path: &mut NodePath,
    visit: &mut impl FnMut(NodeRef<'a>, &NodePath) -> ControlFlow<B>,
) -> ControlFlow<B> {
    for (index, example) in examples.iter().enumerate() {
        path.slots.push(Slot { collection, index });
        let flow = visit(NodeRef::Example(example), path);
        path.slots.pop();
        flow?;
    }
    ControlFlow::Continue(())
}

/// Resolves `id` to the node or field carrying it.
///
/// Returns `None` when nothing in the notebook carries `id`.
pub fn locate<'a>(notebook: &'a Notebook, id: &str) -> Option<Found<'a>> {
    if id.trim().is_empty() {
        return None;
    }
    let flow = walk(notebook, &mut |node, path| {
        if node.id().is_some_and(|own| own.as_str() == id) {
            return ControlFlow::Break(Found {
                node,
                field: None,
                path: path.clone(),
            });
        }
        for (field, field_id) in node.field_ids() {
            if field_id.as_str() == id {
                return ControlFlow::Break(Found {
                    node,
                    field: Some(field),
                    path: path.clone(),
                });
            }
        }
        ControlFlow::Continue(())
    });
    match flow {
        ControlFlow::Break(found) => Some(found),
        ControlFlow::Continue(()) => None,
    }
}

/// Every assigned ID (object IDs and field IDs) in traversal order.
pub fn collect_ids(notebook: &Notebook) -> Vec<NodeId> {
    let mut ids = Vec::new();
    let _ = walk(notebook, &mut |node, _| {
        ids.extend(node.id().cloned());
        ids.extend(node.field_ids().into_iter().map(|(_, id)| id.clone()));
        ControlFlow::<()>::Continue(())
    });
    ids
}
