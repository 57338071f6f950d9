use std::collections::HashSet;

use uuid::Uuid;

use crate::fields::FieldName;
use crate::formats::{NodeId, NodeKind, Notebook, present};
use crate::locate::collect_ids;

const TOKEN_LEN: usize = 8;

/// What an ID names: a whole node or one of its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Node(NodeKind),
    Field(FieldName),
}

impl IdKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Node(kind) => kind.as_str(),
            Self::Field(field) => field.as_str(),
        }
    }
}

impl From<NodeKind> for IdKind {
    fn from(value: NodeKind) -> Self {
        Self::Node(value)
    }
}

impl From<FieldName> for IdKind {
    fn from(value: FieldName) -> Self {
        Self::Field(value)
    }
}

pub fn allocate(kind: impl Into<IdKind>, parent: Option<&NodeId>) -> NodeId {
    let label = kind.into().label();
    let token = random_token();
    match parent.filter(|id| !id.is_blank()) {
        Some(parent) => NodeId::new(format!("{parent}.{label}-{token}")),
        None => NodeId::new(format!("{label}-{token}")),
    }
}

fn random_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(TOKEN_LEN);
    token
}

/// Allocator that never hands out an ID already taken in one notebook.
#[derive(Debug, Default)]
pub struct IdAllocator {
    taken: HashSet<NodeId>,
    allocated: usize,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the allocator with every ID already assigned in `notebook`.
    pub fn seeded(notebook: &Notebook) -> Self {
        Self {
            taken: collect_ids(notebook).into_iter().collect(),
            allocated: 0,
        }
    }

    pub fn allocate(&mut self, kind: impl Into<IdKind>, parent: Option<&NodeId>) -> NodeId {
        let kind = kind.into();
        loop {
            let id = allocate(kind, parent);
            if self.taken.insert(id.clone()) {
                self.allocated += 1;
                return id;
            }
            tracing::debug!(id = %id, "id collision; drawing again");
        }
    }

    /// Returns the ID in `slot`, allocating one first when it is missing.
    pub fn fill(
        &mut self,
        slot: &mut Option<NodeId>,
        kind: impl Into<IdKind>,
        parent: Option<&NodeId>,
    ) -> NodeId {
        if let Some(id) = present(slot) {
            return id.clone();
        }
        let id = self.allocate(kind, parent);
        *slot = Some(id.clone());
        id
    }

    /// Number of IDs minted so far.
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_prefixes_parent_and_kind() {
        let parent = NodeId::from("section-1a2b3c4d");
        let id = allocate(FieldName::Definition, Some(&parent));
        let rest = id
            .as_str()
            .strip_prefix("section-1a2b3c4d.definition-")
            .expect("parent and kind prefix");
        assert_eq!(rest.len(), TOKEN_LEN);
        assert!(rest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn allocate_without_parent_uses_kind_only() {
        let id = allocate(NodeKind::Section, None);
        assert!(id.as_str().starts_with("section-"));
        assert!(!id.as_str().contains('.'));
    }

    #[test]
    fn allocations_are_distinct() {
        let mut allocator = IdAllocator::new();
        let ids = (0..500)
            .map(|_| allocator.allocate(NodeKind::Example, None))
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), 500);
        assert_eq!(allocator.allocated(), 500);
    }

    #[test]
    fn fill_keeps_existing_id() {
        let mut allocator = IdAllocator::new();
        let mut slot = Some(NodeId::from("kept"));
        assert_eq!(allocator.fill(&mut slot, NodeKind::Theorem, None).as_str(), "kept");
        assert_eq!(allocator.allocated(), 0);

        let mut blank = Some(NodeId::from(""));
        let fresh = allocator.fill(&mut blank, NodeKind::Theorem, None);
        assert_eq!(blank, Some(fresh));
        assert_eq!(allocator.allocated(), 1);
    }
}
