use axum::{Router, routing::get};
use crate::{app_state::SharedState, user_controller::UserController};

pub const ROUTER_PATH: &str = "/users";

pub fn get_router(app_state: SharedState) -> Router {
    Router::new()
        .route(ROUTER_PATH, get(UserController::get_all).post(UserController::add))
        .route(
            format!("{}/:id", ROUTER_PATH).as_str(),
            get(UserController::get).put(UserController::edit).delete(UserController::delete),
        )
        .with_state(app_state)
}
