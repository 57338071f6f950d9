use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::fields::FieldName;
use crate::formats::NodeId;
use crate::mutate::{CreateKind, MutationError, Op, Position, UpdateMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    Update,
    Create,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    pub action: EditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// `Some(Value::Null)` when the request carries an explicit `null`.
    #[serde(
        default,
        deserialize_with = "explicit_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<UpdateMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<usize>,
}

fn explicit_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn required(value: Option<String>, name: &'static str) -> Result<String, MutationError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or(MutationError::MissingRequiredParameter(name))
}

impl EditRequest {
    pub fn into_op(self) -> Result<Op, MutationError> {
        match self.action {
            EditAction::Update => {
                let id = required(self.id, "id")?;
                let field_name = required(self.field, "field")?;
                let field = field_name
                    .parse::<FieldName>()
                    .map_err(|_| MutationError::UnsupportedField {
                        kind: "notebook node".to_owned(),
                        field: field_name.clone(),
                    })?;
                let value = self
                    .value
                    .ok_or(MutationError::MissingRequiredParameter("value"))?;
                Ok(Op::Update {
                    id: NodeId::new(id),
                    field,
                    value,
                    mode: self.mode.unwrap_or_default(),
                })
            }
            EditAction::Create => {
                let kind = required(self.kind, "kind")?.parse::<CreateKind>()?;
                let payload = self
                    .payload
                    .filter(|payload| !payload.is_null())
                    .ok_or(MutationError::MissingRequiredParameter("payload"))?;
                Ok(Op::Create {
                    kind,
                    parent_id: self
                        .parent_id
                        .filter(|id| !id.trim().is_empty())
                        .map(NodeId::new),
                    payload,
                    position: self.position.unwrap_or_default(),
                    target_index: self.target_index,
                })
            }
            EditAction::Delete => Ok(Op::Delete {
                id: NodeId::new(required(self.id, "id")?),
            }),
        }
    }
}
