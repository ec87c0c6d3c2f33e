use axum::{Router, routing::get};
use super::super::controllers::health_controller::HealthController;

pub const ROUTER_PATH: &str = "/healthz";

pub fn get_router() -> Router {
    Router::new()
        .route("/", get(HealthController::root))
        .route(ROUTER_PATH, get(HealthController::get))
}
