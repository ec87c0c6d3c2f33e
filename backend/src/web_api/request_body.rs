use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use axum_extra::extract::Form;
use serde::de::DeserializeOwned;

use super::api_error::ApiError;

/// A request body sent either as JSON or as an urlencoded form.
pub struct RequestBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for RequestBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(body) = Form::<T>::from_request(request, state)
                .await
                .map_err(|rejection| ApiError::bad_request(rejection.to_string()))?;
            return Ok(RequestBody(body));
        }
        let Json(body) = Json::<T>::from_request(request, state).await?;
        Ok(RequestBody(body))
    }
}
