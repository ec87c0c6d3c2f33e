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
use crate::data_access::data_context::DataContext;
use crate::data_access::store_error::StoreError;
use crate::list_query::ListQuery;
use crate::services::assignment_sync::{self, best_effort};
use crate::user::User;
use crate::user_request::UserRequest;
use crate::web_api::api_error::ApiError;
use crate::web_api::request_body::RequestBody;

const EMAIL_TAKEN: &str = "Email already exists";
const TASKS_TAKEN: &str = "Some tasks are already assigned to other users";

pub struct UserController {}

impl UserController {
    pub async fn get_all(
        State(state): State<SharedState>,
        query: Result<Query<ListQuery>, QueryRejection>,
    ) -> Result<Response, ApiError> {
        let Query(query) = query?;
        list_documents(&state.data_context, Collection::Users, &query, None)
    }

    /// Create a user and claim its requested pending tasks. The user is
    /// deleted again if any of those tasks already belong to someone.
    pub async fn add(
        State(state): State<SharedState>,
        body: Result<RequestBody<UserRequest>, ApiError>,
    ) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
        let RequestBody(body) = body?;
        let user = User::new(body.validate()?);
        let ctx = &state.data_context;

        ctx.insert(&user).map_err(|e| Self::write_error(e, "Failed to create user"))?;
        tracing::info!(user_id = %user.id, "user created");

        if user.pending_tasks.is_empty() {
            return Ok((StatusCode::CREATED, Json(ApiResponse::created(user))));
        }

        let conflicts = match assignment_sync::find_conflicting_tasks(ctx, &user.pending_tasks, None) {
            Ok(conflicts) => conflicts,
            Err(e) => {
                Self::discard(ctx, &user.id);
                return Err(ApiError::store(e, "Failed to validate task assignments"));
            }
        };
        if !conflicts.is_empty() {
            tracing::info!(user_id = %user.id, conflicts = conflicts.len(), "user rejected, tasks taken");
            Self::discard(ctx, &user.id);
            return Err(ApiError::bad_request(TASKS_TAKEN));
        }

        let resolved = match assignment_sync::resolve_pending_tasks(ctx, &user.pending_tasks) {
            Ok(resolved) => resolved,
            Err(e) => {
                Self::discard(ctx, &user.id);
                return Err(ApiError::store(e, "Failed to create user"));
            }
        };

        let user = Self::claim_tasks(ctx, user, resolved);
        Ok((StatusCode::CREATED, Json(ApiResponse::created(user))))
    }

    pub async fn get(
        State(state): State<SharedState>,
        Path(id): Path<String>,
        query: Result<Query<ListQuery>, QueryRejection>,
    ) -> Result<Json<ApiResponse<Value>>, ApiError> {
        let Query(query) = query?;
        get_document(&state.data_context, Collection::Users, &id, &query)
    }

    pub async fn edit(
        State(state): State<SharedState>,
        Path(id): Path<String>,
        body: Result<RequestBody<UserRequest>, ApiError>,
    ) -> Result<Json<ApiResponse<User>>, ApiError> {
        let id = parse_id(Collection::Users, &id)?;
        let RequestBody(body) = body?;
        let draft = body.validate()?;
        let ctx = &state.data_context;

        let existing = ctx
            .get::<User>(&id)
            .map_err(|e| ApiError::store(e, "Failed to update user"))?
            .ok_or_else(|| ApiError::not_found(Collection::Users))?;

        let conflicts = assignment_sync::find_conflicting_tasks(ctx, &draft.pending_tasks, Some(&id))
            .map_err(|e| ApiError::store(e, "Failed to validate task assignments"))?;
        if !conflicts.is_empty() {
            return Err(ApiError::bad_request(TASKS_TAKEN));
        }

        let user = existing.edit(draft);
        let replaced = ctx
            .replace(&user)
            .map_err(|e| Self::write_error(e, "Failed to update user"))?;
        if !replaced {
            return Err(ApiError::not_found(Collection::Users));
        }
        tracing::info!(user_id = %user.id, "user updated");

        let Some(resolved) = best_effort(
            "resolve pending tasks",
            assignment_sync::resolve_pending_tasks(ctx, &user.pending_tasks),
        ) else {
            return Ok(Json(ApiResponse::ok(user)));
        };
        best_effort(
            "release dropped tasks",
            assignment_sync::release_tasks_except(ctx, &user.id, &resolved),
        );

        Ok(Json(ApiResponse::ok(Self::claim_tasks(ctx, user, resolved))))
    }

    pub async fn delete(
        State(state): State<SharedState>,
        Path(id): Path<String>,
    ) -> Result<StatusCode, ApiError> {
        let id = parse_id(Collection::Users, &id)?;

        let user = state
            .data_context
            .remove::<User>(&id)
            .map_err(|e| ApiError::store(e, "Failed to delete user"))?
            .ok_or_else(|| ApiError::not_found(Collection::Users))?;
        tracing::info!(user_id = %user.id, "user deleted");

        state.background.spawn(&state.data_context, "release deleted user's tasks", move |ctx| {
            assignment_sync::release_all_tasks(ctx, &user.id).map(|_| ())
        });

        Ok(StatusCode::NO_CONTENT)
    }

    // ── Helpers ────────────────────────────────────────────────

    /// Point `resolved` at the user and store it as the pending list.
    /// Falls back to the record as it was if the final write fails.
    fn claim_tasks(ctx: &DataContext, user: User, resolved: Vec<String>) -> User {
        best_effort("assign pending tasks", assignment_sync::assign_tasks(ctx, &resolved, &user));

        let synced = User {
            pending_tasks: resolved,
            ..user.clone()
        };
        match best_effort("store pending tasks", ctx.replace(&synced)) {
            Some(true) => synced,
            _ => user,
        }
    }

    fn discard(ctx: &DataContext, user_id: &str) {
        best_effort("discard rejected user", ctx.remove::<User>(user_id));
    }

    fn write_error(error: StoreError, detail: &'static str) -> ApiError {
        match error {
            StoreError::DuplicateKey { .. } => ApiError::bad_request(EMAIL_TAKEN),
            other => ApiError::store(other, detail),
        }
    }
}
