use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::formats::{
    ConceptBlock, Example, ExampleBody, Node, NodeId, Section, Theorem, present,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Title,
    Introduction,
    Summary,
    Notes,
    Definition,
    Name,
    Statement,
    Proof,
    Question,
    Answer,
    Explanation,
    Options,
    Language,
}

impl FieldName {
    pub const ALL: [FieldName; 13] = [
        Self::Title,
        Self::Introduction,
        Self::Summary,
        Self::Notes,
        Self::Definition,
        Self::Name,
        Self::Statement,
        Self::Proof,
        Self::Question,
        Self::Answer,
        Self::Explanation,
        Self::Options,
        Self::Language,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Introduction => "introduction",
            Self::Summary => "summary",
            Self::Notes => "notes",
            Self::Definition => "definition",
            Self::Name => "name",
            Self::Statement => "statement",
            Self::Proof => "proof",
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Explanation => "explanation",
            Self::Options => "options",
            Self::Language => "language",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown field `{}`", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for FieldName {
    type Err = UnknownField;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == normalized)
            .ok_or_else(|| UnknownField(value.to_owned()))
    }
}

/// Current or replacement value of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    OptionalText(Option<String>),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Section {
    pub fn field(&self, field: FieldName) -> Option<FieldValue> {
        match field {
            FieldName::Title => Some(FieldValue::Text(self.title.clone())),
            FieldName::Introduction => Some(FieldValue::Text(self.introduction.clone())),
            FieldName::Summary => Some(FieldValue::Text(self.summary.clone())),
            FieldName::Notes => Some(FieldValue::List(self.notes.clone())),
            _ => None,
        }
    }

    pub fn set_field(&mut self, field: FieldName, value: FieldValue) -> bool {
        match (field, value) {
            (FieldName::Title, FieldValue::Text(v)) => self.title = v,
            (FieldName::Introduction, FieldValue::Text(v)) => self.introduction = v,
            (FieldName::Summary, FieldValue::Text(v)) => self.summary = v,
            (FieldName::Notes, FieldValue::List(v)) => self.notes = v,
            _ => return false,
        }
        true
    }

    pub fn field_ids(&self) -> Vec<(FieldName, &NodeId)> {
        [
            (FieldName::Title, &self.title_id),
            (FieldName::Introduction, &self.introduction_id),
            (FieldName::Summary, &self.summary_id),
        ]
        .into_iter()
        .filter_map(|(field, slot)| present(slot).map(|id| (field, id)))
        .collect()
    }
}

impl ConceptBlock {
    pub fn field(&self, field: FieldName) -> Option<FieldValue> {
        match field {
            FieldName::Title => Some(FieldValue::Text(self.title.clone())),
            FieldName::Definition => Some(FieldValue::Text(self.definition.clone())),
            FieldName::Notes => Some(FieldValue::List(self.notes.clone())),
            _ => None,
        }
    }

    pub fn set_field(&mut self, field: FieldName, value: FieldValue) -> bool {
        match (field, value) {
            (FieldName::Title, FieldValue::Text(v)) => self.title = v,
            (FieldName::Definition, FieldValue::Text(v)) => self.definition = v,
            (FieldName::Notes, FieldValue::List(v)) => self.notes = v,
            _ => return false,
        }
        true
    }

    pub fn field_ids(&self) -> Vec<(FieldName, &NodeId)> {
        present(&self.definition_id)
            .map(|id| (FieldName::Definition, id))
            .into_iter()
            .collect()
    }
}

impl Theorem {
    pub fn field(&self, field: FieldName) -> Option<FieldValue> {
        match field {
            FieldName::Name => Some(FieldValue::OptionalText(self.name.clone())),
            FieldName::Statement => Some(FieldValue::Text(self.statement.clone())),
            FieldName::Proof => Some(FieldValue::OptionalText(self.proof.clone())),
            _ => None,
        }
    }

    pub fn set_field(&mut self, field: FieldName, value: FieldValue) -> bool {
        match (field, value) {
            (FieldName::Name, FieldValue::OptionalText(v)) => self.name = v,
            (FieldName::Statement, FieldValue::Text(v)) => self.statement = v,
            (FieldName::Proof, FieldValue::OptionalText(v)) => self.proof = v,
            _ => return false,
        }
        true
    }

    pub fn field_ids(&self) -> Vec<(FieldName, &NodeId)> {
        [
            (FieldName::Statement, &self.statement_id),
            (FieldName::Proof, &self.proof_id),
        ]
        .into_iter()
        .filter_map(|(field, slot)| present(slot).map(|id| (field, id)))
        .collect()
    }
}

impl Example {
    pub fn field(&self, field: FieldName) -> Option<FieldValue> {
        match (field, &self.body) {
            (FieldName::Question, _) => Some(FieldValue::Text(self.question.clone())),
            (FieldName::Explanation, _) => Some(FieldValue::OptionalText(self.explanation.clone())),
            (FieldName::Options, ExampleBody::MultipleChoice { options, .. }) => {
                Some(FieldValue::List(options.clone()))
            }
            (FieldName::Answer, ExampleBody::FillInBlank { answers, .. }) => {
                Some(FieldValue::Map(answers.clone()))
            }
            (
                FieldName::Answer,
                ExampleBody::MultipleChoice { answer, .. }
                | ExampleBody::ShortAnswer { answer, .. }
                | ExampleBody::Code { answer, .. },
            ) => Some(FieldValue::Text(answer.clone())),
            (FieldName::Proof, ExampleBody::Proof { proof, .. }) => {
                Some(FieldValue::Text(proof.clone()))
            }
            (FieldName::Language, ExampleBody::Code { language, .. }) => {
                Some(FieldValue::OptionalText(language.clone()))
            }
            _ => None,
        }
    }

    pub fn set_field(&mut self, field: FieldName, value: FieldValue) -> bool {
        match (field, value, &mut self.body) {
            (FieldName::Question, FieldValue::Text(v), _) => self.question = v,
            (FieldName::Explanation, FieldValue::OptionalText(v), _) => self.explanation = v,
            (
                FieldName::Options,
                FieldValue::List(v),
                ExampleBody::MultipleChoice { options, .. },
            ) => *options = v,
            (FieldName::Answer, FieldValue::Map(v), ExampleBody::FillInBlank { answers, .. }) => {
                *answers = v
            }
            (
                FieldName::Answer,
                FieldValue::Text(v),
                ExampleBody::MultipleChoice { answer, .. }
                | ExampleBody::ShortAnswer { answer, .. }
                | ExampleBody::Code { answer, .. },
            ) => *answer = v,
            (FieldName::Proof, FieldValue::Text(v), ExampleBody::Proof { proof, .. }) => *proof = v,
            (
                FieldName::Language,
                FieldValue::OptionalText(v),
                ExampleBody::Code { language, .. },
            ) => *language = v,
            _ => return false,
        }
        true
    }

    pub fn field_ids(&self) -> Vec<(FieldName, &NodeId)> {
        let mut ids = Vec::with_capacity(4);
        if let Some(id) = present(&self.question_id) {
            ids.push((FieldName::Question, id));
        }
        if let Some(id) = self.body.answer_id().and_then(present) {
            ids.push((FieldName::Answer, id));
        }
        if let Some(id) = present(&self.explanation_id) {
            ids.push((FieldName::Explanation, id));
        }
        if let Some(id) = self.body.proof_id().and_then(present) {
            ids.push((FieldName::Proof, id));
        }
        ids
    }
}

impl Node {
    pub fn field(&self, field: FieldName) -> Option<FieldValue> {
        match self {
            Self::Section(node) => node.field(field),
            Self::ConceptBlock(node) => node.field(field),
            Self::Theorem(node) => node.field(field),
            Self::Example(node) => node.field(field),
        }
    }

    pub fn set_field(&mut self, field: FieldName, value: FieldValue) -> bool {
        match self {
            Self::Section(node) => node.set_field(field, value),
            Self::ConceptBlock(node) => node.set_field(field, value),
            Self::Theorem(node) => node.set_field(field, value),
            Self::Example(node) => node.set_field(field, value),
        }
    }

    /// Human-readable kind used in error messages (`example (proof)`).
    pub fn kind_label(&self) -> String {
        match self {
            Self::Example(example) => format!("example ({})", example.kind().as_str()),
            other => other.kind().as_str().to_owned(),
        }
    }
}
