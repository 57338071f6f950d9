use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a node or of a single field inside a node.
///
/// IDs are opaque: nothing in the crate parses them back into structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Legacy documents sometimes carry empty IDs; those count as missing.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Returns the ID in `slot` unless it is absent or blank.
pub fn present(slot: &Option<NodeId>) -> Option<&NodeId> {
    slot.as_ref().filter(|id| !id.is_blank())
}

/// Ordered map keyed by title.
///
/// Serialized as a plain map in insertion order. Duplicate keys are rejected
/// when deserializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for TitleMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> TitleMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_index(&self, index: usize) -> Option<(&str, &V)> {
        self.entries.get(index).map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_index_mut(&mut self, index: usize) -> Option<(&str, &mut V)> {
        self.entries.get_mut(index).map(|(k, v)| (k.as_str(), v))
    }

    /// Replaces the value under an existing key in place, or appends.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Inserts a new entry at `index` (clamped to the length).
    ///
    /// The caller is responsible for `key` not being present yet.
    pub fn insert_at(&mut self, index: usize, key: impl Into<String>, value: V) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, (key.into(), value));
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let index = self.position(key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn remove_index(&mut self, index: usize) -> Option<(String, V)> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    /// Changes the key at `index`, keeping position and value.
    pub fn rekey_index(&mut self, index: usize, new_key: impl Into<String>) -> Option<String> {
        let entry = self.entries.get_mut(index)?;
        Some(std::mem::replace(&mut entry.0, new_key.into()))
    }

    /// Changes the key `old` to `new_key`, keeping position and value.
    pub fn rekey(&mut self, old: &str, new_key: impl Into<String>) -> bool {
        match self.position(old) {
            Some(index) => self.rekey_index(index, new_key).is_some(),
            None => false,
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &V) -> bool) {
        self.entries.retain(|(k, v)| keep(k, v));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> FromIterator<(String, V)> for TitleMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<V: Serialize> Serialize for TitleMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for TitleMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TitleMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for TitleMapVisitor<V> {
            type Value = TitleMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map keyed by title")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = TitleMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if map.contains_key(&key) {
                        return Err(de::Error::custom(format!("duplicate title `{key}`")));
                    }
                    map.entries.push((key, value));
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(TitleMapVisitor(PhantomData))
    }
}

/// Kind of a structural node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Section,
    ConceptBlock,
    Theorem,
    Example,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::ConceptBlock => "concept_block",
            Self::Theorem => "theorem",
            Self::Example => "example",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub outline: Outline,
    #[serde(default)]
    pub sections: TitleMap<Section>,
}

/// Section index of a notebook: title → description, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sections: TitleMap<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_id: Option<NodeId>,
    #[serde(default)]
    pub introduction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concept_blocks: Vec<ConceptBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exercises: Vec<Example>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub theorems: Vec<Theorem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theorem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,
}

/// A worked example or exercise.
///
/// The question-kind tag `kind` selects the variant-specific fields of
/// `body`; on the wire the tag and those fields sit next to `question`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<NodeId>,
    #[serde(flatten)]
    pub body: ExampleBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_id: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExampleBody {
    MultipleChoice {
        #[serde(deserialize_with = "scalar::strings")]
        options: Vec<String>,
        /// Marker of the correct option: `A`, `B`, `C` or `D`.
        #[serde(deserialize_with = "scalar::string")]
        answer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer_id: Option<NodeId>,
    },
    FillInBlank {
        /// Placeholder key (as written inside `{{…}}` in the question) → answer.
        #[serde(deserialize_with = "scalar::string_map")]
        answers: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer_id: Option<NodeId>,
    },
    Proof {
        #[serde(deserialize_with = "scalar::string")]
        proof: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        proof_id: Option<NodeId>,
    },
    ShortAnswer {
        #[serde(deserialize_with = "scalar::string")]
        answer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer_id: Option<NodeId>,
    },
    Code {
        #[serde(
            default,
            deserialize_with = "scalar::optional_string",
            skip_serializing_if = "Option::is_none"
        )]
        language: Option<String>,
        #[serde(deserialize_with = "scalar::string")]
        answer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer_id: Option<NodeId>,
    },
}

/// Text fields of [`ExampleBody`] reach serde through the `kind` tag's
/// buffered content, where a YAML plain scalar such as `0` is no longer
/// readable as a string. These accept any scalar and keep its text.
mod scalar {
    use std::collections::BTreeMap;

    use serde::de::{self, Deserialize as _, Deserializer};
    use serde_json::Value;

    fn text<E: de::Error>(value: Value) -> Result<String, E> {
        match value {
            Value::String(text) => Ok(text),
            Value::Number(number) => Ok(number.to_string()),
            Value::Bool(flag) => Ok(flag.to_string()),
            other => Err(E::custom(format!("expected a string, found {other}"))),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        text(Value::deserialize(deserializer)?)
    }

    pub fn optional_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            value => text(value).map(Some),
        }
    }

    pub fn strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Vec::<Value>::deserialize(deserializer)?
            .into_iter()
            .map(text)
            .collect()
    }

    pub fn string_map<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, String>, D::Error> {
        BTreeMap::<String, Value>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, value)| Ok((key, text(value)?)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleKind {
    MultipleChoice,
    FillInBlank,
    Proof,
    ShortAnswer,
    Code,
}

impl ExampleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::FillInBlank => "fill_in_blank",
            Self::Proof => "proof",
            Self::ShortAnswer => "short_answer",
            Self::Code => "code",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple choice",
            Self::FillInBlank => "fill in the blank",
            Self::Proof => "proof",
            Self::ShortAnswer => "short answer",
            Self::Code => "code",
        }
    }
}

impl ExampleBody {
    pub fn kind(&self) -> ExampleKind {
        match self {
            Self::MultipleChoice { .. } => ExampleKind::MultipleChoice,
            Self::FillInBlank { .. } => ExampleKind::FillInBlank,
            Self::Proof { .. } => ExampleKind::Proof,
            Self::ShortAnswer { .. } => ExampleKind::ShortAnswer,
            Self::Code { .. } => ExampleKind::Code,
        }
    }

    pub fn answer_id(&self) -> Option<&Option<NodeId>> {
        match self {
            Self::MultipleChoice { answer_id, .. }
            | Self::FillInBlank { answer_id, .. }
            | Self::ShortAnswer { answer_id, .. }
            | Self::Code { answer_id, .. } => Some(answer_id),
            Self::Proof { .. } => None,
        }
    }

    pub fn answer_id_mut(&mut self) -> Option<&mut Option<NodeId>> {
        match self {
            Self::MultipleChoice { answer_id, .. }
            | Self::FillInBlank { answer_id, .. }
            | Self::ShortAnswer { answer_id, .. }
            | Self::Code { answer_id, .. } => Some(answer_id),
            Self::Proof { .. } => None,
        }
    }

    pub fn proof_id(&self) -> Option<&Option<NodeId>> {
        match self {
            Self::Proof { proof_id, .. } => Some(proof_id),
            _ => None,
        }
    }

    pub fn proof_id_mut(&mut self) -> Option<&mut Option<NodeId>> {
        match self {
            Self::Proof { proof_id, .. } => Some(proof_id),
            _ => None,
        }
    }
}

impl Example {
    pub fn kind(&self) -> ExampleKind {
        self.body.kind()
    }

    pub fn short_answer(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: None,
            question: question.into(),
            question_id: None,
            body: ExampleBody::ShortAnswer {
                answer: answer.into(),
                answer_id: None,
            },
            explanation: None,
            explanation_id: None,
        }
    }
}

/// An owned node of any kind: a create payload or a staged edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Section(Section),
    ConceptBlock(ConceptBlock),
    Theorem(Theorem),
    Example(Example),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Section(_) => NodeKind::Section,
            Self::ConceptBlock(_) => NodeKind::ConceptBlock,
            Self::Theorem(_) => NodeKind::Theorem,
            Self::Example(_) => NodeKind::Example,
        }
    }
}
