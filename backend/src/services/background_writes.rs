//! Fire-and-forget store writes. They run on the blocking pool and only log
//! on failure; shutdown and tests drain the tracker before touching the store.

use tokio_util::task::TaskTracker;

use crate::data_access::data_context::DataContext;
use crate::data_access::store_error::StoreError;

#[derive(Clone, Default)]
pub struct BackgroundWrites {
    tracker: TaskTracker,
}

impl BackgroundWrites {
    pub fn spawn<F>(&self, data_context: &DataContext, operation: &'static str, write: F)
    where
        F: FnOnce(&DataContext) -> Result<(), StoreError> + Send + 'static,
    {
        let data_context = data_context.clone();
        let _ = self.tracker.spawn_blocking(move || {
            if let Err(error) = write(&data_context) {
                tracing::warn!(operation, %error, "background write failed");
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every write spawned so far. New writes may be spawned again
    /// afterwards.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
