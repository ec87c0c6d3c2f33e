use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::timestamp::{self, rfc3339};
use crate::data_access::collection::{Collection, Document};

pub const UNASSIGNED_USER_NAME: &str = "unassigned";

fn unassigned_user_name() -> String {
    UNASSIGNED_USER_NAME.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "rfc3339")]
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub assigned_user: String,
    #[serde(default = "unassigned_user_name")]
    pub assigned_user_name: String,
    #[serde(with = "rfc3339")]
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub name: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub completed: bool,
    pub assigned_user: String,
    pub assigned_user_name: String,
    pub date_created: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(draft: TaskDraft) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: draft.name,
            description: draft.description,
            deadline: draft.deadline,
            completed: draft.completed,
            assigned_user: draft.assigned_user,
            assigned_user_name: draft.assigned_user_name,
            date_created: draft.date_created.unwrap_or_else(timestamp::now),
        }
    }

    /// Replace every field except the id. `date_created` is kept unless the
    /// draft supplies one.
    pub fn edit(self, draft: TaskDraft) -> Self {
        Self {
            id: self.id,
            name: draft.name,
            description: draft.description,
            deadline: draft.deadline,
            completed: draft.completed,
            assigned_user: draft.assigned_user,
            assigned_user_name: draft.assigned_user_name,
            date_created: draft.date_created.unwrap_or(self.date_created),
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.assigned_user.is_empty()
    }

    pub fn is_pending_for_assignee(&self) -> bool {
        self.is_assigned() && !self.completed
    }
}

impl Document for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn id(&self) -> &str {
        &self.id
    }
}
