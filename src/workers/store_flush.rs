use crate::progress::ProgressService;
use crate::store::Store;

/// Drains any snapshot the writer task has not picked up yet, then fsyncs sled.
pub async fn run(progress: &ProgressService, store: &Store) {
    tracing::debug!("store_flush: start");
    match progress.flush() {
        Ok(true) => tracing::info!("store_flush: pending progress written"),
        Ok(false) => {}
        Err(e) => tracing::error!(error=%e, "store_flush: progress write failed"),
    }
    match store.flush() {
        Ok(()) => tracing::debug!("store_flush: done"),
        Err(e) => tracing::error!(error=%e, "store_flush failed"),
    }
}
