use serde::{de::Error, Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use super::request_error::RequestError;
use crate::task::{TaskDraft, UNASSIGNED_USER_NAME};
use crate::timestamp;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<Value>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub completed: Option<bool>,
    pub assigned_user: Option<String>,
    pub assigned_user_name: Option<String>,
    pub date_created: Option<Value>,
}

impl TaskRequest {
    pub fn validate(self) -> Result<TaskDraft, RequestError> {
        let name = self.name.filter(|n| !n.is_empty());
        let deadline = self.deadline.filter(is_present);
        let (Some(name), Some(deadline)) = (name, deadline) else {
            return Err(RequestError::MissingFields("Name and deadline are required"));
        };

        let deadline = timestamp::parse_input(&deadline)
            .ok_or(RequestError::InvalidDate { field: "deadline" })?;
        let date_created = match self.date_created.filter(is_present) {
            Some(value) => Some(
                timestamp::parse_input(&value)
                    .ok_or(RequestError::InvalidDate { field: "dateCreated" })?,
            ),
            None => None,
        };

        Ok(TaskDraft {
            name,
            description: self.description.unwrap_or_default(),
            deadline,
            completed: self.completed.unwrap_or(false),
            assigned_user: self.assigned_user.map(normalize_id).unwrap_or_default(),
            assigned_user_name: self
                .assigned_user_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNASSIGNED_USER_NAME.to_string()),
            date_created,
        })
    }
}

/// References to other records are stored in canonical UUID form so they
/// match the `_id` they point at. Anything that is not a UUID is kept as sent.
pub(crate) fn normalize_id(id: String) -> String {
    Uuid::parse_str(id.trim()).map_or(id, |uuid| uuid.to_string())
}

/// Falsy JSON values (`null`, `""`, `0`, `false`) count as absent.
pub(crate) fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Accepts `true`/`false`, the strings `"true"`/`"false"`, and 0/1.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
        Number(i64),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(flag)) => Ok(Some(flag)),
        Some(Flag::Number(n)) => Ok(Some(n != 0)),
        Some(Flag::Text(text)) => match text.as_str() {
            "true" => Ok(Some(true)),
            "false" | "" => Ok(Some(false)),
            other => Err(D::Error::custom(format!("invalid boolean {other:?}"))),
        },
    }
}
