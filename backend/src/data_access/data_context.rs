use redb::{Database, ReadableTable, Table, WriteTransaction};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

use super::collection::{Collection, Document};
use super::query::{FindOptions, Filter, Projection};
use super::store_error::StoreError;

#[derive(Clone)]
pub struct DataContext {
    db: Arc<Database>,
}

impl DataContext {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        {
            for collection in Collection::ALL {
                let _ = txn.open_table(collection.table())?;
                if let Some((_, index)) = collection.unique_index() {
                    let _ = txn.open_table(index)?;
                }
            }
        }
        txn.commit()?;

        tracing::info!(path = %path.display(), "document store opened");
        Ok(DataContext { db: Arc::new(db) })
    }

    /// Release the database. Outstanding clones keep it open until they drop.
    pub fn close(self) {
        match Arc::try_unwrap(self.db) {
            Ok(db) => {
                drop(db);
                tracing::info!("document store closed");
            }
            Err(_) => tracing::warn!("document store still in use at close, deferring to last handle"),
        }
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn find(&self, collection: Collection, options: &FindOptions) -> Result<Vec<Value>, StoreError> {
        Ok(options.apply(self.scan(collection)?))
    }

    pub fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let documents = self.scan(collection)?;
        Ok(documents.iter().filter(|doc| filter.matches(doc)).count() as u64)
    }

    pub fn find_one(
        &self,
        collection: Collection,
        id: &str,
        projection: &Projection,
    ) -> Result<Option<Value>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(collection.table())?;
        let found = match table.get(id)? {
            Some(data) => Some(projection.apply(decode(data.value())?)),
            None => None,
        };
        Ok(found)
    }

    pub fn find_all<D: Document>(&self, filter: &Filter) -> Result<Vec<D>, StoreError> {
        self.scan(D::COLLECTION)?
            .into_iter()
            .filter(|doc| filter.matches(doc))
            .map(from_document)
            .collect()
    }

    pub fn get<D: Document>(&self, id: &str) -> Result<Option<D>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(D::COLLECTION.table())?;
        let found = match table.get(id)? {
            Some(data) => Some(from_document(decode(data.value())?)?),
            None => None,
        };
        Ok(found)
    }

    fn scan(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(collection.table())?;

        let mut documents = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            documents.push(decode(value.value())?);
        }
        Ok(documents)
    }

    // ── Mutations ──────────────────────────────────────────────

    pub fn insert<D: Document>(&self, document: &D) -> Result<(), StoreError> {
        let collection = D::COLLECTION;
        let value = to_document(document)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(collection.table())?;
            let previous = match table.get(document.id())? {
                Some(data) => Some(decode(data.value())?),
                None => None,
            };
            write_document(&txn, &mut table, collection, document.id(), previous.as_ref(), &value)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Overwrite an existing record. Returns false if it no longer exists.
    pub fn replace<D: Document>(&self, document: &D) -> Result<bool, StoreError> {
        let collection = D::COLLECTION;
        let value = to_document(document)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(collection.table())?;
            let previous = match table.get(document.id())? {
                Some(data) => decode(data.value())?,
                None => return Ok(false),
            };
            write_document(&txn, &mut table, collection, document.id(), Some(&previous), &value)?;
        }
        txn.commit()?;
        Ok(true)
    }

    /// Read-modify-write of one record inside a single transaction.
    /// `edit` returns whether it changed anything; unchanged records are not
    /// rewritten. Returns whether a write happened.
    pub fn modify<D, F>(&self, id: &str, edit: F) -> Result<bool, StoreError>
    where
        D: Document,
        F: FnOnce(&mut D) -> bool,
    {
        let collection = D::COLLECTION;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(collection.table())?;
            let previous = match table.get(id)? {
                Some(data) => decode(data.value())?,
                None => return Ok(false),
            };
            let mut document: D = from_document(previous.clone())?;
            if !edit(&mut document) {
                return Ok(false);
            }
            let value = to_document(&document)?;
            write_document(&txn, &mut table, collection, id, Some(&previous), &value)?;
        }
        txn.commit()?;
        Ok(true)
    }

    pub fn remove<D: Document>(&self, id: &str) -> Result<Option<D>, StoreError> {
        let collection = D::COLLECTION;

        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(collection.table())?;
            let removed = match table.remove(id)? {
                Some(data) => Some(decode(data.value())?),
                None => None,
            };
            if let (Some(document), Some((field, index))) = (&removed, collection.unique_index()) {
                let mut index = txn.open_table(index)?;
                reindex(&mut index, field, id, Some(document), None)?;
            }
            removed
        };
        txn.commit()?;

        removed.map(from_document).transpose()
    }

    /// Set fields on every record matching the filter. Returns how many
    /// records matched.
    pub fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        set: &Map<String, Value>,
    ) -> Result<u64, StoreError> {
        let txn = self.db.begin_write()?;
        let matched = {
            let mut table = txn.open_table(collection.table())?;

            let mut targets = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let document = decode(value.value())?;
                if filter.matches(&document) {
                    targets.push((key.value().to_string(), document));
                }
            }

            for (id, previous) in &targets {
                let mut updated = previous.clone();
                if let Value::Object(fields) = &mut updated {
                    for (field, value) in set {
                        fields.insert(field.clone(), value.clone());
                    }
                }
                write_document(&txn, &mut table, collection, id, Some(previous), &updated)?;
            }
            targets.len() as u64
        };
        txn.commit()?;

        tracing::debug!(collection = collection.name(), matched, "update_many applied");
        Ok(matched)
    }
}

// ── Helpers ────────────────────────────────────────────────────

fn write_document(
    txn: &WriteTransaction,
    table: &mut Table<'_, &'static str, &'static [u8]>,
    collection: Collection,
    id: &str,
    previous: Option<&Value>,
    document: &Value,
) -> Result<(), StoreError> {
    if let Some((field, index)) = collection.unique_index() {
        let mut index = txn.open_table(index)?;
        reindex(&mut index, field, id, previous, Some(document))?;
    }
    let bytes = serde_json::to_vec(document).map_err(|e| StoreError::Encode(e.to_string()))?;
    table.insert(id, bytes.as_slice())?;
    Ok(())
}

fn reindex(
    index: &mut Table<'_, &'static str, &'static str>,
    field: &'static str,
    id: &str,
    previous: Option<&Value>,
    current: Option<&Value>,
) -> Result<(), StoreError> {
    let old_key = previous.and_then(|doc| doc.get(field)).and_then(Value::as_str);
    let new_key = current.and_then(|doc| doc.get(field)).and_then(Value::as_str);
    if old_key == new_key {
        return Ok(());
    }

    if let Some(key) = new_key {
        if let Some(owner) = index.get(key)? {
            if owner.value() != id {
                return Err(StoreError::DuplicateKey { field });
            }
        }
    }
    if let Some(key) = old_key {
        index.remove(key)?;
    }
    if let Some(key) = new_key {
        index.insert(key, id)?;
    }
    Ok(())
}

fn decode(bytes: &[u8]) -> Result<Value, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

fn to_document<D: Document>(document: &D) -> Result<Value, StoreError> {
    serde_json::to_value(document).map_err(|e| StoreError::Encode(e.to_string()))
}

fn from_document<D: Document>(value: Value) -> Result<D, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskDraft};
    use crate::test_support::TempStore;
    use crate::data_access::query::Sort;
    use crate::user::{User, UserDraft};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn task(name: &str, assigned_user: &str) -> Task {
        Task::new(TaskDraft {
            name: name.into(),
            description: String::new(),
            deadline: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            completed: false,
            assigned_user: assigned_user.into(),
            assigned_user_name: "unassigned".into(),
            date_created: None,
        })
    }

    fn user(name: &str, email: &str) -> User {
        User::new(UserDraft {
            name: name.into(),
            email: email.into(),
            pending_tasks: Vec::new(),
            date_created: None,
        })
    }

    #[test]
    fn insert_get_and_remove() {
        let store = TempStore::new("crud");
        let ctx = &store.context;

        let t = task("write docs", "");
        ctx.insert(&t).unwrap();
        assert_eq!(ctx.get::<Task>(&t.id).unwrap(), Some(t.clone()));

        let removed = ctx.remove::<Task>(&t.id).unwrap();
        assert_eq!(removed, Some(t.clone()));
        assert_eq!(ctx.get::<Task>(&t.id).unwrap(), None);
        assert_eq!(ctx.remove::<Task>(&t.id).unwrap(), None);
    }

    #[test]
    fn replace_requires_existing_record() {
        let store = TempStore::new("replace");
        let ctx = &store.context;

        let mut t = task("draft", "");
        assert!(!ctx.replace(&t).unwrap());

        ctx.insert(&t).unwrap();
        t.completed = true;
        assert!(ctx.replace(&t).unwrap());
        assert!(ctx.get::<Task>(&t.id).unwrap().unwrap().completed);
    }

    #[test]
    fn find_and_count_apply_query_options() {
        let store = TempStore::new("find");
        let ctx = &store.context;

        for (name, user) in [("b", "u1"), ("a", ""), ("c", "u1")] {
            ctx.insert(&task(name, user)).unwrap();
        }

        let assigned = Filter::from_json(json!({"assignedUser": "u1"})).unwrap();
        assert_eq!(ctx.count(Collection::Tasks, &assigned).unwrap(), 2);
        assert_eq!(ctx.count(Collection::Tasks, &Filter::default()).unwrap(), 3);

        let options = FindOptions {
            sort: Sort::from_json(json!({"name": -1})).unwrap(),
            projection: Projection::from_json(json!({"name": 1, "_id": 0})).unwrap(),
            limit: Some(2),
            ..FindOptions::default()
        };
        assert_eq!(
            ctx.find(Collection::Tasks, &options).unwrap(),
            vec![json!({"name": "c"}), json!({"name": "b"})]
        );
    }

    #[test]
    fn find_one_projects_fields() {
        let store = TempStore::new("find_one");
        let ctx = &store.context;

        let t = task("ship", "");
        ctx.insert(&t).unwrap();

        let projection = Projection::from_json(json!({"name": 1})).unwrap();
        assert_eq!(
            ctx.find_one(Collection::Tasks, &t.id, &projection).unwrap(),
            Some(json!({"_id": t.id, "name": "ship"}))
        );
        assert_eq!(
            ctx.find_one(Collection::Tasks, "nope", &Projection::default()).unwrap(),
            None
        );
    }

    #[test]
    fn update_many_sets_fields_on_matches() {
        let store = TempStore::new("update_many");
        let ctx = &store.context;

        let a = task("a", "u1");
        let b = task("b", "u1");
        let c = task("c", "u2");
        for t in [&a, &b, &c] {
            ctx.insert(t).unwrap();
        }

        let filter = Filter::from_json(json!({"assignedUser": "u1"})).unwrap();
        let set = json!({"assignedUser": "", "assignedUserName": "unassigned"});
        let matched = ctx
            .update_many(Collection::Tasks, &filter, set.as_object().unwrap())
            .unwrap();
        assert_eq!(matched, 2);

        assert_eq!(ctx.get::<Task>(&a.id).unwrap().unwrap().assigned_user, "");
        assert_eq!(ctx.get::<Task>(&b.id).unwrap().unwrap().assigned_user, "");
        assert_eq!(ctx.get::<Task>(&c.id).unwrap().unwrap().assigned_user, "u2");
    }

    #[test]
    fn modify_skips_unchanged_records() {
        let store = TempStore::new("modify");
        let ctx = &store.context;

        let u = user("Ann", "ann@example.com");
        ctx.insert(&u).unwrap();

        assert!(ctx.modify::<User, _>(&u.id, |u| u.add_pending_task("t1")).unwrap());
        assert!(!ctx.modify::<User, _>(&u.id, |u| u.add_pending_task("t1")).unwrap());
        assert!(!ctx.modify::<User, _>("missing", |u| u.add_pending_task("t1")).unwrap());
        assert_eq!(ctx.get::<User>(&u.id).unwrap().unwrap().pending_tasks, ["t1"]);
    }

    #[test]
    fn user_email_is_unique() {
        let store = TempStore::new("email");
        let ctx = &store.context;

        let ann = user("Ann", "ann@example.com");
        ctx.insert(&ann).unwrap();

        let imposter = user("Other Ann", "ann@example.com");
        assert!(matches!(
            ctx.insert(&imposter),
            Err(StoreError::DuplicateKey { field: "email" })
        ));

        // Changing the email frees the old value
        let mut renamed = ann.clone();
        renamed.email = "ann@work.example.com".into();
        assert!(ctx.replace(&renamed).unwrap());
        ctx.insert(&imposter).unwrap();

        // Deleting frees the value too
        ctx.remove::<User>(&renamed.id).unwrap();
        ctx.insert(&user("New", "ann@work.example.com")).unwrap();
    }
}
