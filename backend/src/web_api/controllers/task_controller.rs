use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde_json::Value;

use super::collection_support::{get_document, list_documents, parse_id};
use crate::api_response::ApiResponse;
use crate::app_state::SharedState;
use crate::data_access::collection::Collection;
use crate::list_query::ListQuery;
use crate::services::assignment_sync;
use crate::task::Task;
use crate::task_request::TaskRequest;
use crate::web_api::api_error::ApiError;
use crate::web_api::request_body::RequestBody;

pub const DEFAULT_LIMIT: u64 = 100;

pub struct TaskController {}

impl TaskController {
    pub async fn get_all(
        State(state): State<SharedState>,
        query: Result<Query<ListQuery>, QueryRejection>,
    ) -> Result<Response, ApiError> {
        let Query(query) = query?;
        list_documents(&state.data_context, Collection::Tasks, &query, Some(DEFAULT_LIMIT))
    }

    pub async fn add(
        State(state): State<SharedState>,
        body: Result<RequestBody<TaskRequest>, ApiError>,
    ) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
        let RequestBody(body) = body?;
        let task = Task::new(body.validate()?);

        state
            .data_context
            .insert(&task)
            .map_err(|e| ApiError::store(e, "Failed to create task"))?;
        tracing::info!(task_id = %task.id, assigned_user = %task.assigned_user, "task created");

        if task.is_pending_for_assignee() {
            let (user_id, task_id) = (task.assigned_user.clone(), task.id.clone());
            state.background.spawn(&state.data_context, "add pending task", move |ctx| {
                assignment_sync::add_pending_task(ctx, &user_id, &task_id)
            });
        }

        Ok((StatusCode::CREATED, Json(ApiResponse::created(task))))
    }

    pub async fn get(
        State(state): State<SharedState>,
        Path(id): Path<String>,
        query: Result<Query<ListQuery>, QueryRejection>,
    ) -> Result<Json<ApiResponse<Value>>, ApiError> {
        let Query(query) = query?;
        get_document(&state.data_context, Collection::Tasks, &id, &query)
    }

    pub async fn edit(
        State(state): State<SharedState>,
        Path(id): Path<String>,
        body: Result<RequestBody<TaskRequest>, ApiError>,
    ) -> Result<Json<ApiResponse<Task>>, ApiError> {
        let id = parse_id(Collection::Tasks, &id)?;
        let RequestBody(body) = body?;
        let draft = body.validate()?;
        let ctx = &state.data_context;

        let existing = ctx
            .get::<Task>(&id)
            .map_err(|e| ApiError::store(e, "Failed to update task"))?
            .ok_or_else(|| ApiError::not_found(Collection::Tasks))?;
        let previous_user = existing.assigned_user.clone();

        let task = existing.edit(draft);
        let replaced = ctx
            .replace(&task)
            .map_err(|e| ApiError::store(e, "Failed to update task"))?;
        if !replaced {
            return Err(ApiError::not_found(Collection::Tasks));
        }
        tracing::info!(task_id = %task.id, from = %previous_user, to = %task.assigned_user, "task updated");

        if !previous_user.is_empty() && previous_user != task.assigned_user {
            let task_id = task.id.clone();
            state.background.spawn(ctx, "release previous assignee", move |ctx| {
                assignment_sync::remove_pending_task(ctx, &previous_user, &task_id)
            });
        }
        if task.is_pending_for_assignee() {
            let (user_id, task_id) = (task.assigned_user.clone(), task.id.clone());
            state.background.spawn(ctx, "add pending task", move |ctx| {
                assignment_sync::add_pending_task(ctx, &user_id, &task_id)
            });
        } else if task.completed && task.is_assigned() {
            let (user_id, task_id) = (task.assigned_user.clone(), task.id.clone());
            state.background.spawn(ctx, "drop completed task", move |ctx| {
                assignment_sync::remove_pending_task(ctx, &user_id, &task_id)
            });
        }

        Ok(Json(ApiResponse::ok(task)))
    }

    pub async fn delete(
        State(state): State<SharedState>,
        Path(id): Path<String>,
    ) -> Result<StatusCode, ApiError> {
        let id = parse_id(Collection::Tasks, &id)?;

        let task = state
            .data_context
            .remove::<Task>(&id)
            .map_err(|e| ApiError::store(e, "Failed to delete task"))?
            .ok_or_else(|| ApiError::not_found(Collection::Tasks))?;
        tracing::info!(task_id = %task.id, "task deleted");

        if task.is_assigned() {
            state.background.spawn(&state.data_context, "release deleted task", move |ctx| {
                assignment_sync::remove_pending_task(ctx, &task.assigned_user, &task.id)
            });
        }

        Ok(StatusCode::NO_CONTENT)
    }
}
