use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::request_error::RequestError;
use super::task_request::{is_present, normalize_id};
use crate::timestamp;
use crate::user::UserDraft;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Form bodies may send the list as repeated `pendingTasks[]` keys.
    #[serde(default, alias = "pendingTasks[]", deserialize_with = "list_or_null")]
    pub pending_tasks: Vec<String>,
    pub date_created: Option<Value>,
}

impl UserRequest {
    pub fn validate(self) -> Result<UserDraft, RequestError> {
        let name = self.name.filter(|n| !n.is_empty());
        let email = self.email.filter(|e| !e.is_empty());
        let (Some(name), Some(email)) = (name, email) else {
            return Err(RequestError::MissingFields("Name and email are required"));
        };

        let date_created = match self.date_created.filter(is_present) {
            Some(value) => Some(
                timestamp::parse_input(&value)
                    .ok_or(RequestError::InvalidDate { field: "dateCreated" })?,
            ),
            None => None,
        };

        Ok(UserDraft {
            name,
            email,
            pending_tasks: self
                .pending_tasks
                .into_iter()
                .map(normalize_id)
                .collect(),
            date_created,
        })
    }
}

fn list_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
