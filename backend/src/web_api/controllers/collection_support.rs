
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api_response::{ApiResponse, CountResponse};
use crate::data_access::collection::Collection;
use crate::data_access::data_context::DataContext;
use crate::list_query::ListQuery;
use crate::web_api::api_error::ApiError;

pub fn parse_id(collection: Collection, raw: &str) -> Result<String, ApiError> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::invalid_id(collection))
}

pub fn list_documents(
    data_context: &DataContext,
    collection: Collection,
    query: &ListQuery,
    default_limit: Option<u64>,
) -> Result<Response, ApiError> {
    let options = query.find_options(default_limit)?;

    if query.wants_count() {
        let count = data_context
            .count(collection, &options.filter)
            .map_err(|e| ApiError::store(e, format!("Failed to count {}", collection.name())))?;
        return Ok(Json(CountResponse { count }).into_response());
    }

    let documents = data_context
        .find(collection, &options)
        .map_err(|e| ApiError::store(e, format!("Failed to fetch {}", collection.name())))?;
    Ok(Json(ApiResponse::ok(documents)).into_response())
}

pub fn get_document(
    data_context: &DataContext,
    collection: Collection,
    raw_id: &str,
    query: &ListQuery,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let id = parse_id(collection, raw_id)?;
    let projection = query.projection()?;

    let document = data_context
        .find_one(collection, &id, &projection)
        .map_err(|e| {
            ApiError::store(e, format!("Failed to fetch {}", collection.singular().to_lowercase()))
        })?
        .ok_or_else(|| ApiError::not_found(collection))?;
    Ok(Json(ApiResponse::ok(document)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_normalized_uuids() {
        let id = parse_id(Collection::Tasks, "6F9619FF-8B86-D011-B42D-00CF4FC964FF").unwrap();
        assert_eq!(id, "6f9619ff-8b86-d011-b42d-00cf4fc964ff");
    }

    #[test]
    fn malformed_ids_are_not_found() {
        let error = parse_id(Collection::Users, "not-a-valid-id").unwrap_err();
        assert_eq!(error.to_string(), "User Not Found: Invalid user ID");
    }
}
