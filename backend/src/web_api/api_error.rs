use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api_response::ErrorResponse;
use crate::data_access::collection::Collection;
use crate::data_access::store_error::StoreError;
use crate::list_query::InvalidParameter;
use crate::request_error::RequestError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}: {detail}")]
    BadRequest { message: String, detail: String },
    #[error("{} Not Found: {detail}", .collection.singular())]
    NotFound {
        collection: Collection,
        detail: String,
    },
    #[error("Internal Server Error: {detail}")]
    Internal { detail: String },
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: "Bad Request".to_string(),
            detail: detail.into(),
        }
    }

    pub fn invalid_id(collection: Collection) -> Self {
        ApiError::NotFound {
            collection,
            detail: format!("Invalid {} ID", collection.singular().to_lowercase()),
        }
    }

    pub fn not_found(collection: Collection) -> Self {
        ApiError::NotFound {
            collection,
            detail: format!("{} not found", collection.singular()),
        }
    }

    /// A failed primary store operation. Logged here so handlers only pick
    /// the client-facing detail.
    pub fn store(error: StoreError, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(%error, detail = %detail, "store operation failed");
        ApiError::Internal { detail }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_body(self) -> ErrorResponse {
        match self {
            ApiError::BadRequest { message, detail } => ErrorResponse { message, data: detail },
            ApiError::NotFound { collection, detail } => ErrorResponse {
                message: format!("{} Not Found", collection.singular()),
                data: detail,
            },
            ApiError::Internal { detail } => ErrorResponse {
                message: "Internal Server Error".to_string(),
                data: detail,
            },
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(error: RequestError) -> Self {
        ApiError::bad_request(error.to_string())
    }
}

impl From<InvalidParameter> for ApiError {
    fn from(error: InvalidParameter) -> Self {
        ApiError::BadRequest {
            message: error.to_string(),
            detail: "JSON parsing error".to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_client_error() {
            tracing::debug!(%status, error = %self, "request rejected");
        }
        (status, Json(self.into_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    async fn render(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_envelopes() {
        assert_eq!(
            render(ApiError::invalid_id(Collection::Tasks)).await,
            (
                StatusCode::NOT_FOUND,
                json!({"message": "Task Not Found", "data": "Invalid task ID"})
            )
        );
        assert_eq!(
            render(ApiError::not_found(Collection::Users)).await,
            (
                StatusCode::NOT_FOUND,
                json!({"message": "User Not Found", "data": "User not found"})
            )
        );
    }

    #[tokio::test]
    async fn invalid_parameter_envelope() {
        let error = ApiError::from(InvalidParameter { param: "sort" });
        assert_eq!(
            render(error).await,
            (
                StatusCode::BAD_REQUEST,
                json!({"message": "Invalid sort parameter", "data": "JSON parsing error"})
            )
        );
    }

    #[tokio::test]
    async fn store_failures_hide_the_cause() {
        let error = ApiError::store(StoreError::Decode("corrupt".into()), "Failed to fetch tasks");
        assert_eq!(
            render(error).await,
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"message": "Internal Server Error", "data": "Failed to fetch tasks"})
            )
        );
    }

    #[test]
    fn request_errors_are_bad_requests() {
        let error = ApiError::from(RequestError::MissingFields("Name and email are required"));
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_string(), "Bad Request: Name and email are required");
    }
}
