//! Keeps `task.assignedUser` and `user.pendingTasks` mirrored. Each function
//! is an independent write.

use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::data_access::collection::Collection;
use crate::data_access::data_context::DataContext;
use crate::data_access::query::Filter;
use crate::data_access::store_error::StoreError;
use crate::task::{Task, UNASSIGNED_USER_NAME};
use crate::user::User;

// ── User side ──────────────────────────────────────────────────

/// Append a task to a user's pending list if it is not already there.
/// A missing user is not an error.
pub fn add_pending_task(ctx: &DataContext, user_id: &str, task_id: &str) -> Result<(), StoreError> {
    let changed = ctx.modify::<User, _>(user_id, |user| user.add_pending_task(task_id))?;
    tracing::debug!(user_id, task_id, changed, "pending task added");
    Ok(())
}

pub fn remove_pending_task(ctx: &DataContext, user_id: &str, task_id: &str) -> Result<(), StoreError> {
    let changed = ctx.modify::<User, _>(user_id, |user| user.remove_pending_task(task_id))?;
    tracing::debug!(user_id, task_id, changed, "pending task removed");
    Ok(())
}

// ── Task side ──────────────────────────────────────────────────

/// Tasks among `task_ids` that already belong to someone. With `owner`
/// set, tasks assigned to that owner are not conflicts.
pub fn find_conflicting_tasks(
    ctx: &DataContext,
    task_ids: &[String],
    owner: Option<&str>,
) -> Result<Vec<Task>, StoreError> {
    if task_ids.is_empty() {
        return Ok(Vec::new());
    }
    let filter = match owner {
        Some(owner) => json!({"_id": {"$in": task_ids}, "assignedUser": {"$nin": ["", owner]}}),
        None => json!({"_id": {"$in": task_ids}, "assignedUser": {"$ne": ""}}),
    };
    ctx.find_all(&Filter::from_json(filter)?)
}

/// Restrict `task_ids` to tasks that exist and are not completed, keeping
/// the requested order and dropping duplicates.
pub fn resolve_pending_tasks(ctx: &DataContext, task_ids: &[String]) -> Result<Vec<String>, StoreError> {
    if task_ids.is_empty() {
        return Ok(Vec::new());
    }
    let filter = Filter::from_json(json!({"_id": {"$in": task_ids}, "completed": false}))?;
    let open: HashSet<String> = ctx
        .find_all::<Task>(&filter)?
        .into_iter()
        .map(|task| task.id)
        .collect();

    let mut seen = HashSet::new();
    Ok(task_ids
        .iter()
        .filter(|id| open.contains(*id) && seen.insert(*id))
        .cloned()
        .collect())
}

pub fn assign_tasks(ctx: &DataContext, task_ids: &[String], user: &User) -> Result<u64, StoreError> {
    if task_ids.is_empty() {
        return Ok(0);
    }
    let filter = Filter::from_json(json!({"_id": {"$in": task_ids}}))?;
    ctx.update_many(
        Collection::Tasks,
        &filter,
        &assignment(&user.id, &user.name),
    )
}

pub fn release_tasks_except(ctx: &DataContext, user_id: &str, keep: &[String]) -> Result<u64, StoreError> {
    let filter = Filter::from_json(json!({"_id": {"$nin": keep}, "assignedUser": user_id}))?;
    ctx.update_many(
        Collection::Tasks,
        &filter,
        &assignment("", UNASSIGNED_USER_NAME),
    )
}

pub fn release_all_tasks(ctx: &DataContext, user_id: &str) -> Result<u64, StoreError> {
    release_tasks_except(ctx, user_id, &[])
}

fn assignment(user_id: &str, user_name: &str) -> Map<String, Value> {
    let mut set = Map::new();
    set.insert("assignedUser".to_string(), Value::from(user_id));
    set.insert("assignedUserName".to_string(), Value::from(user_name));
    set
}

pub fn best_effort<T>(operation: &'static str, result: Result<T, StoreError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(operation, %error, "best-effort write failed");
            None
        }
    }
}
