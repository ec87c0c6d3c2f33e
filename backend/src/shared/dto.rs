// Requests
pub mod list_query;
pub mod request_error;
pub mod task_request;
pub mod user_request;

// Responses
pub mod api_response;
