use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backfill::{AssignIds as _, ensure_ids};
use crate::config::EngineConfig;
use crate::fields::{FieldName, FieldValue};
use crate::formats::{Node, NodeId, NodeKind, Notebook, Section};
use crate::ids::IdAllocator;
use crate::locate::{Collection, locate};
use crate::outline::{DescribeSection, IntroExcerpt, SyncReport, sync_with};
use crate::render::{fingerprint, fingerprint_text, render_plain, render_tagged};
use crate::validate::{ContentError, validate_example, validate_node, validate_section};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    #[default]
    Replace,
    Append,
    Prepend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Before,
    After,
    #[default]
    Append,
}

/// What a create operation builds, which also fixes where it may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateKind {
    Section,
    ConceptBlock,
    Theorem,
    Example,
    Exercise,
}

impl CreateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::ConceptBlock => "concept_block",
            Self::Theorem => "theorem",
            Self::Example => "example",
            Self::Exercise => "exercise",
        }
    }

    /// Child collection of a `parent` node that holds this kind.
    pub fn collection_under(self, parent: NodeKind) -> Option<Collection> {
        match (self, parent) {
            (
                Self::Example,
                NodeKind::Section | NodeKind::ConceptBlock | NodeKind::Theorem,
            ) => Some(Collection::Examples),
            (Self::Exercise, NodeKind::Section) => Some(Collection::Exercises),
            (Self::ConceptBlock, NodeKind::Section) => Some(Collection::ConceptBlocks),
            (Self::Theorem, NodeKind::ConceptBlock) => Some(Collection::Theorems),
            _ => None,
        }
    }
}

impl fmt::Display for CreateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreateKind {
    type Err = MutationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value
            .trim()
            .to_ascii_lowercase()
            .replace(|c: char| c == ' ' || c == '-', "_");
        match normalized.as_str() {
            "section" => Ok(Self::Section),
            "concept_block" | "conceptblock" => Ok(Self::ConceptBlock),
            "theorem" => Ok(Self::Theorem),
            "example" => Ok(Self::Example),
            "exercise" => Ok(Self::Exercise),
            _ => Err(MutationError::UnsupportedKind(value.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Update {
        id: NodeId,
        field: FieldName,
        value: Value,
        mode: UpdateMode,
    },
    Create {
        kind: CreateKind,
        parent_id: Option<NodeId>,
        payload: Value,
        position: Position,
        target_index: Option<usize>,
    },
    Delete {
        id: NodeId,
    },
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Update { .. } => "update",
            Self::Create { .. } => "create",
            Self::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("no node or field has id `{0}`")]
    NotFound(NodeId),
    #[error("id `{id}` names field `{actual}`, not `{requested}`")]
    FieldMismatch {
        id: NodeId,
        requested: FieldName,
        actual: FieldName,
    },
    #[error("{kind} has no field `{field}`")]
    UnsupportedField { kind: String, field: String },
    #[error("missing required parameter `{0}`")]
    MissingRequiredParameter(&'static str),
    #[error("unsupported kind `{0}`")]
    UnsupportedKind(String),
    #[error("malformed {what}: {message}")]
    ParsePayload { what: String, message: String },
    #[error("index {index} is out of range for {collection} (length {len})")]
    IndexOutOfRange {
        index: usize,
        len: usize,
        collection: &'static str,
    },
    #[error("cannot place a {kind} under a {parent}")]
    InvalidParent { kind: CreateKind, parent: String },
    #[error("id `{0}` names a field, not a node")]
    FieldTarget(NodeId),
    #[error("invalid content: {0}")]
    InvalidContent(#[from] ContentError),
    #[error("notebook changed: expected fingerprint {expected}, found {actual}")]
    StaleFingerprint { expected: String, actual: String },
}

/// Result of one successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// ID minted for the created node.
    pub created_id: Option<NodeId>,
    pub changed: bool,
    pub plain: String,
    pub tagged: String,
    pub fingerprint: String,
    pub sync: SyncReport,
    /// IDs assigned by the post-edit backfill.
    pub backfilled: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Mutator<D = IntroExcerpt> {
    describer: D,
}

impl Mutator<IntroExcerpt> {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            describer: IntroExcerpt::new(config),
        }
    }
}

impl<D: DescribeSection> Mutator<D> {
    pub fn with_describer(describer: D) -> Self {
        Self { describer }
    }

    pub fn apply(&self, notebook: &mut Notebook, op: Op) -> Result<Outcome, MutationError> {
        let name = op.name();
        let created_id = match op {
            Op::Update {
                id,
                field,
                value,
                mode,
            } => {
                update(notebook, &id, field, value, mode)?;
                None
            }
            Op::Create {
                kind,
                parent_id,
                payload,
                position,
                target_index,
            } => Some(create(
                notebook,
                kind,
                parent_id.as_ref(),
                payload,
                position,
                target_index,
            )?),
            Op::Delete { id } => {
                delete(notebook, &id)?;
                None
            }
        };

        let backfilled = ensure_ids(notebook);
        let sync = sync_with(notebook, &self.describer);
        let tagged = render_tagged(notebook);
        let plain = render_plain(notebook);
        let fingerprint = fingerprint_text(&tagged);

        tracing::info!(
            op = name,
            created_id = created_id.as_ref().map(NodeId::as_str),
            backfilled,
            %fingerprint,
            "applied edit"
        );

        Ok(Outcome {
            created_id,
            changed: true,
            plain,
            tagged,
            fingerprint,
            sync,
            backfilled,
        })
    }

    /// Applies `op` only when the notebook still has fingerprint `expected`.
    pub fn apply_if_fingerprint(
        &self,
        notebook: &mut Notebook,
        op: Op,
        expected: &str,
    ) -> Result<Outcome, MutationError> {
        let actual = fingerprint(notebook);
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            tracing::warn!(expected, %actual, "rejecting edit against stale notebook");
            return Err(MutationError::StaleFingerprint {
                expected: expected.to_owned(),
                actual,
            });
        }
        self.apply(notebook, op)
    }
}

/// Applies `op` with the default engine configuration.
pub fn apply(notebook: &mut Notebook, op: Op) -> Result<Outcome, MutationError> {
    Mutator::new(&EngineConfig::default()).apply(notebook, op)
}

fn update(
    notebook: &mut Notebook,
    id: &NodeId,
    field: FieldName,
    value: Value,
    mode: UpdateMode,
) -> Result<(), MutationError> {
    let found = locate(notebook, id.as_str()).ok_or_else(|| MutationError::NotFound(id.clone()))?;
    if let Some(actual) = found.field
        && actual != field
    {
        return Err(MutationError::FieldMismatch {
            id: id.clone(),
            requested: field,
            actual,
        });
    }

    let path = found.path.clone();
    let mut staged = found.node.to_node();
    let unsupported = MutationError::UnsupportedField {
        kind: staged.kind_label(),
        field: field.to_string(),
    };
    let Some(current) = staged.field(field) else {
        return Err(unsupported);
    };
    let next = combine(field, current, value, mode)?;
    if !staged.set_field(field, next) {
        return Err(unsupported);
    }

    match &staged {
        Node::Example(example) => validate_example(example)?,
        Node::Section(section) => {
            check_section_title(notebook, Some(path.section), &section.title)?
        }
        Node::ConceptBlock(_) | Node::Theorem(_) => {}
    }

    let target = path
        .resolve_mut(notebook)
        .ok_or_else(|| MutationError::NotFound(id.clone()))?;
    target
        .replace(staged)
        .map_err(|_| MutationError::NotFound(id.clone()))?;
    tracing::debug!(id = %id, %field, ?mode, "updated field");
    Ok(())
}

fn combine(
    field: FieldName,
    current: FieldValue,
    value: Value,
    mode: UpdateMode,
) -> Result<FieldValue, MutationError> {
    let what = format!("value for `{field}`");
    match current {
        FieldValue::Text(old) => Ok(FieldValue::Text(compose(&old, text(&what, value)?, mode))),
        FieldValue::OptionalText(old) => {
            if value.is_null() {
                return match mode {
                    UpdateMode::Replace => Ok(FieldValue::OptionalText(None)),
                    UpdateMode::Append | UpdateMode::Prepend => Err(MutationError::ParsePayload {
                        what,
                        message: "null can only replace a value".to_owned(),
                    }),
                };
            }
            let new = text(&what, value)?;
            Ok(FieldValue::OptionalText(Some(compose(
                old.as_deref().unwrap_or_default(),
                new,
                mode,
            ))))
        }
        FieldValue::List(_) => typed(&what, value).map(FieldValue::List),
        FieldValue::Map(_) => typed(&what, value).map(FieldValue::Map),
    }
}

fn compose(old: &str, new: String, mode: UpdateMode) -> String {
    if old.is_empty() {
        return new;
    }
    match mode {
        UpdateMode::Replace => new,
        UpdateMode::Append => format!("{old}\n\n{new}"),
        UpdateMode::Prepend => format!("{new}\n\n{old}"),
    }
}

fn text(what: &str, value: Value) -> Result<String, MutationError> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(MutationError::ParsePayload {
            what: what.to_owned(),
            message: format!("expected a string, found {other}"),
        }),
    }
}

/// Deserializes `value`, also accepting JSON encoded inside a string.
fn typed<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, MutationError> {
    let parsed = match value {
        Value::String(raw) => serde_json::from_str(&raw),
        other => serde_json::from_value(other),
    };
    parsed.map_err(|err| MutationError::ParsePayload {
        what: what.to_owned(),
        message: err.to_string(),
    })
}

fn check_section_title(
    notebook: &Notebook,
    skip: Option<usize>,
    title: &str,
) -> Result<(), ContentError> {
    if title.trim().is_empty() {
        return Err(ContentError::BlankSectionTitle);
    }
    let taken = notebook
        .sections
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != skip)
        .any(|(_, (key, section))| key == title || section.title == title);
    if taken {
        return Err(ContentError::DuplicateSectionTitle(title.to_owned()));
    }
    Ok(())
}

fn insertion_index(
    position: Position,
    target_index: Option<usize>,
    len: usize,
    collection: &'static str,
) -> Result<usize, MutationError> {
    match position {
        Position::Append => Ok(len),
        Position::Before | Position::After => {
            let index =
                target_index.ok_or(MutationError::MissingRequiredParameter("target_index"))?;
            if index >= len {
                return Err(MutationError::IndexOutOfRange {
                    index,
                    len,
                    collection,
                });
            }
            Ok(match position {
                Position::After => index + 1,
                _ => index,
            })
        }
    }
}

fn parse_payload(kind: CreateKind, payload: Value) -> Result<Node, MutationError> {
    let what = format!("{kind} payload");
    let mut node = match kind {
        CreateKind::Section => Node::Section(typed(&what, payload)?),
        CreateKind::ConceptBlock => Node::ConceptBlock(typed(&what, payload)?),
        CreateKind::Theorem => Node::Theorem(typed(&what, payload)?),
        CreateKind::Example | CreateKind::Exercise => Node::Example(typed(&what, payload)?),
    };
    node.clear_ids();
    Ok(node)
}

fn create(
    notebook: &mut Notebook,
    kind: CreateKind,
    parent_id: Option<&NodeId>,
    payload: Value,
    position: Position,
    target_index: Option<usize>,
) -> Result<NodeId, MutationError> {
    let parent_id = parent_id.filter(|id| !id.is_blank());
    if kind == CreateKind::Section {
        if let Some(parent_id) = parent_id {
            let found = locate(notebook, parent_id.as_str())
                .ok_or_else(|| MutationError::NotFound(parent_id.clone()))?;
            return Err(MutationError::InvalidParent {
                kind,
                parent: found.kind().to_string(),
            });
        }
        let Node::Section(section) = parse_payload(kind, payload)? else {
            return Err(MutationError::UnsupportedKind(kind.to_string()));
        };
        return create_section(notebook, section, position, target_index);
    }

    let parent_id = parent_id.ok_or(MutationError::MissingRequiredParameter("parent_id"))?;
    let found = locate(notebook, parent_id.as_str())
        .ok_or_else(|| MutationError::NotFound(parent_id.clone()))?;
    if found.field.is_some() {
        return Err(MutationError::FieldTarget(parent_id.clone()));
    }
    let invalid_parent = || MutationError::InvalidParent {
        kind,
        parent: found.kind().to_string(),
    };
    let collection = kind.collection_under(found.kind()).ok_or_else(invalid_parent)?;
    let len = found
        .node
        .collection_len(collection)
        .ok_or_else(invalid_parent)?;
    let index = insertion_index(position, target_index, len, collection.as_str())?;

    let mut node = parse_payload(kind, payload)?;
    validate_node(&node)?;

    let path = found.path.clone();
    let mut ids = IdAllocator::seeded(notebook);
    let id = node.assign_ids_with(Some(parent_id), &mut ids);

    let parent = path
        .resolve_mut(notebook)
        .ok_or_else(|| MutationError::NotFound(parent_id.clone()))?;
    parent
        .insert(collection, index, node)
        .map_err(|_| MutationError::InvalidParent {
            kind,
            parent: "node".to_owned(),
        })?;
    tracing::debug!(id = %id, %kind, parent = %parent_id, index, "created node");
    Ok(id)
}

fn create_section(
    notebook: &mut Notebook,
    mut section: Section,
    position: Position,
    target_index: Option<usize>,
) -> Result<NodeId, MutationError> {
    let index = insertion_index(position, target_index, notebook.sections.len(), "sections")?;
    check_section_title(notebook, None, &section.title)?;
    validate_section(&section)?;

    let mut ids = IdAllocator::seeded(notebook);
    let id = section.assign_ids_with(None, &mut ids);
    notebook
        .sections
        .insert_at(index, section.title.clone(), section);
    tracing::debug!(id = %id, index, "created section");
    Ok(id)
}

fn delete(notebook: &mut Notebook, id: &NodeId) -> Result<(), MutationError> {
    let found = locate(notebook, id.as_str()).ok_or_else(|| MutationError::NotFound(id.clone()))?;
    if found.field.is_some() {
        return Err(MutationError::FieldTarget(id.clone()));
    }
    let path = found.path.clone();

    let removed = match path.split_last() {
        None => notebook
            .sections
            .remove_index(path.section)
            .map(|(_, section)| Node::Section(section)),
        Some((parent, slot)) => parent
            .resolve_mut(notebook)
            .and_then(|parent| parent.remove(slot)),
    };
    let removed = removed.ok_or_else(|| MutationError::NotFound(id.clone()))?;
    tracing::debug!(id = %id, kind = %removed.kind(), %path, "deleted node");
    Ok(())
}
