use redb::TableDefinition;
use serde::{de::DeserializeOwned, Serialize};

const TASKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");
const USERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const USER_EMAIL_INDEX: TableDefinition<&str, &str> = TableDefinition::new("user_email_index");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Tasks,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Tasks, Collection::Users];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Tasks => "tasks",
            Collection::Users => "users",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            Collection::Tasks => "Task",
            Collection::Users => "User",
        }
    }

    pub(crate) fn table(self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match self {
            Collection::Tasks => TASKS_TABLE,
            Collection::Users => USERS_TABLE,
        }
    }

    /// Field whose values must be unique across the collection, with the
    /// index table mapping each value to its owning document id.
    pub(crate) fn unique_index(
        self,
    ) -> Option<(&'static str, TableDefinition<'static, &'static str, &'static str>)> {
        match self {
            Collection::Tasks => None,
            Collection::Users => Some(("email", USER_EMAIL_INDEX)),
        }
    }
}

pub trait Document: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}
