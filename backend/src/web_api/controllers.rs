pub mod collection_support;
pub mod health_controller;
pub mod task_controller;
pub mod user_controller;
