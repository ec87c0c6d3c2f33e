//---------------------------------------
pub mod web_api {
    pub mod api_error;
    pub mod controllers;
    pub mod request_body;
    pub mod routes;
}

pub use web_api::routes::map_routes;
pub use web_api::controllers::*;
//---------------------------------------

//---------------------------------------
pub mod shared {
    pub mod models;
    pub mod dto;
}

pub use shared::models::*;
pub use shared::dto::*;
//---------------------------------------

//---------------------------------------
pub mod services {
    pub mod assignment_sync;
    pub mod background_writes;
}
//---------------------------------------

//---------------------------------------
pub mod data_access {
    pub mod collection;
    pub mod data_context;
    pub mod query;
    pub mod store_error;
}
//---------------------------------------

#[cfg(test)]
mod test_support;
