use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::timestamp::{self, rfc3339};
use crate::data_access::collection::{Collection, Document};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub pending_tasks: Vec<String>,
    #[serde(with = "rfc3339")]
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub pending_tasks: Vec<String>,
    pub date_created: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(draft: UserDraft) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: draft.name,
            email: draft.email,
            pending_tasks: draft.pending_tasks,
            date_created: draft.date_created.unwrap_or_else(timestamp::now),
        }
    }

    pub fn edit(self, draft: UserDraft) -> Self {
        Self {
            id: self.id,
            name: draft.name,
            email: draft.email,
            pending_tasks: draft.pending_tasks,
            date_created: draft.date_created.unwrap_or(self.date_created),
        }
    }

    pub fn add_pending_task(&mut self, task_id: &str) -> bool {
        if self.pending_tasks.iter().any(|id| id == task_id) {
            return false;
        }
        self.pending_tasks.push(task_id.to_string());
        true
    }

    pub fn remove_pending_task(&mut self, task_id: &str) -> bool {
        let before = self.pending_tasks.len();
        self.pending_tasks.retain(|id| id != task_id);
        self.pending_tasks.len() != before
    }
}

impl Document for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.id
    }
}
