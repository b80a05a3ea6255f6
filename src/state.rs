use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::progress::ProgressService;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    progress: Arc<ProgressService>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        progress: Arc<ProgressService>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            store,
            progress,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn progress(&self) -> &ProgressService {
        &self.progress
    }

    pub fn progress_handle(&self) -> Arc<ProgressService> {
        self.progress.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_tx(&self) -> &broadcast::Sender<()> {
        &self.shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_state(tx: broadcast::Sender<()>) -> (AppState, tempfile::TempDir) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut cfg = Config::from_env();
        cfg.persistence.skip = true;
        let store = Arc::new(Store::open(tmp.path().join("state.sled").to_str().unwrap()).unwrap());
        let progress = Arc::new(ProgressService::open(&cfg, store.clone()));
        (AppState::new(store, progress, &cfg, tx), tmp)
    }

    #[tokio::test]
    async fn shutdown_receiver_can_clone() {
        let (tx, _) = broadcast::channel(4);
        let (state, _tmp) = app_state(tx.clone());

        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.shutdown_rx();
        tx.send(()).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn progress_handle_shares_engine() {
        let (tx, _) = broadcast::channel(4);
        let (state, _tmp) = app_state(tx);

        state
            .progress_handle()
            .apply(crate::progress::ProgressEvent::AwardXp { amount: 12 });
        assert_eq!(state.progress().snapshot().total_xp, 12);
    }
}
