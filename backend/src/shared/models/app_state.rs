use std::sync::Arc;

use crate::data_access::data_context::DataContext;
use crate::services::background_writes::BackgroundWrites;

pub struct AppState {
    pub data_context: DataContext,
    pub background: BackgroundWrites,
}

impl AppState {
    pub fn new(data_context: DataContext) -> SharedState {
        Arc::new(AppState {
            data_context,
            background: BackgroundWrites::default(),
        })
    }
}

pub type SharedState = Arc<AppState>;
