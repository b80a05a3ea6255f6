//! Durable storage of the progress aggregate and the coalescing save queue
//! in front of it.
//!
//! Writes are fire-and-forget from the engine's point of view: every mutating
//! event drops a snapshot into a single pending slot (newest wins) and a
//! writer task drains it. Draining holds a write lock across take-and-save,
//! so a stale snapshot can never land after a newer one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

use crate::progress::types::ProgressState;
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    /// The stored bytes exist but do not decode. `raw` is kept so the caller
    /// can preserve them before anything overwrites the blob.
    #[error("stored progress undecodable: {source}")]
    Decode {
        raw: Vec<u8>,
        source: serde_json::Error,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub trait PersistenceAdapter: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<ProgressState>, PersistenceError>;
    fn save(&self, state: &ProgressState) -> Result<(), PersistenceError>;
    /// Sets unreadable bytes aside under a separate key.
    fn preserve_unreadable(&self, raw: &[u8]) -> Result<(), PersistenceError>;
}

fn decode_stored(raw: Vec<u8>) -> Result<ProgressState, PersistenceError> {
    match decode(&raw) {
        Ok(state) => Ok(state),
        Err(source) => Err(PersistenceError::Decode { raw, source }),
    }
}

pub fn encode(state: &ProgressState) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(state)
}

pub fn decode(bytes: &[u8]) -> Result<ProgressState, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Progress blob in the sled `progress` tree.
pub struct SledPersistence {
    store: Arc<Store>,
    profile_id: String,
}

impl SledPersistence {
    pub fn new(store: Arc<Store>, profile_id: impl Into<String>) -> Self {
        Self {
            store,
            profile_id: profile_id.into(),
        }
    }
}

impl PersistenceAdapter for SledPersistence {
    fn load(&self) -> Result<Option<ProgressState>, PersistenceError> {
        match self.store.get_progress_blob(&self.profile_id)? {
            Some(raw) => decode_stored(raw).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, state: &ProgressState) -> Result<(), PersistenceError> {
        let blob = encode(state)?;
        self.store.put_progress_blob(&self.profile_id, &blob)?;
        Ok(())
    }

    fn preserve_unreadable(&self, raw: &[u8]) -> Result<(), PersistenceError> {
        self.store.put_unreadable_progress_blob(&self.profile_id, raw)?;
        self.store.flush()?;
        Ok(())
    }
}

/// In-process blob, used for previews and tests. Can be told to fail writes.
#[derive(Default)]
pub struct MemoryPersistence {
    blob: Mutex<Option<Vec<u8>>>,
    preserved: Mutex<Option<Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self {
            blob: Mutex::new(Some(blob)),
            ..Self::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn blob(&self) -> Option<Vec<u8>> {
        self.blob.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Bytes set aside by `preserve_unreadable`.
    pub fn preserved_blob(&self) -> Option<Vec<u8>> {
        self.preserved.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl PersistenceAdapter for MemoryPersistence {
    fn load(&self) -> Result<Option<ProgressState>, PersistenceError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "memory persistence is failing reads".to_string(),
            ));
        }
        match self.blob() {
            Some(raw) => decode_stored(raw).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, state: &ProgressState) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "memory persistence is failing writes".to_string(),
            ));
        }
        let blob = encode(state)?;
        *self.blob.lock().unwrap_or_else(|p| p.into_inner()) = Some(blob);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn preserve_unreadable(&self, raw: &[u8]) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "memory persistence is failing writes".to_string(),
            ));
        }
        *self.preserved.lock().unwrap_or_else(|p| p.into_inner()) = Some(raw.to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Persist,
    /// Ephemeral contexts: snapshots are dropped, in-memory state is unaffected.
    Skip,
}

struct Pending {
    generation: u64,
    state: ProgressState,
}

struct SaveQueueInner {
    adapter: Arc<dyn PersistenceAdapter>,
    mode: SaveMode,
    pending: Mutex<Option<Pending>>,
    write_lock: Mutex<()>,
    next_generation: AtomicU64,
    written_generation: AtomicU64,
    notify: Notify,
}

#[derive(Clone)]
pub struct SaveQueue {
    inner: Arc<SaveQueueInner>,
}

impl SaveQueue {
    pub fn new(adapter: Arc<dyn PersistenceAdapter>, mode: SaveMode) -> Self {
        Self {
            inner: Arc::new(SaveQueueInner {
                adapter,
                mode,
                pending: Mutex::new(None),
                write_lock: Mutex::new(()),
                next_generation: AtomicU64::new(0),
                written_generation: AtomicU64::new(0),
                notify: Notify::new(),
            }),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn PersistenceAdapter> {
        &self.inner.adapter
    }

    pub fn mode(&self) -> SaveMode {
        self.inner.mode
    }

    /// Replaces whatever snapshot is waiting with `snapshot` and wakes the writer.
    pub fn schedule(&self, snapshot: ProgressState) {
        if self.inner.mode == SaveMode::Skip {
            return;
        }
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.lock_pending() = Some(Pending {
            generation,
            state: snapshot,
        });
        self.inner.notify.notify_one();
    }

    pub fn has_pending(&self) -> bool {
        self.lock_pending().is_some()
    }

    /// Generation of the newest snapshot that reached storage.
    pub fn written_generation(&self) -> u64 {
        self.inner.written_generation.load(Ordering::SeqCst)
    }

    /// Writes the pending snapshot now. Returns `Ok(false)` when there was
    /// nothing to write. A failed snapshot goes back into the slot unless a
    /// newer one arrived meanwhile.
    pub fn flush(&self) -> Result<bool, PersistenceError> {
        let _write = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(|p| p.into_inner());

        let Some(pending) = self.lock_pending().take() else {
            return Ok(false);
        };

        match self.inner.adapter.save(&pending.state) {
            Ok(()) => {
                self.inner
                    .written_generation
                    .fetch_max(pending.generation, Ordering::SeqCst);
                tracing::debug!(generation = pending.generation, "Progress saved");
                Ok(true)
            }
            Err(e) => {
                let generation = pending.generation;
                let mut slot = self.lock_pending();
                if slot.is_none() {
                    *slot = Some(pending);
                }
                tracing::warn!(generation, error = %e, "Progress save failed, will retry");
                Err(e)
            }
        }
    }

    /// Background writer: waits for scheduled snapshots, lets bursts settle for
    /// `debounce`, then drains. Flushes once more on shutdown.
    pub fn spawn_writer(
        &self,
        debounce: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = queue.inner.notify.notified() => {}
                    _ = shutdown_rx.recv() => break,
                }
                if !debounce.is_zero() {
                    tokio::time::sleep(debounce).await;
                }
                queue.flush_in_background().await;
            }

            queue.flush_in_background().await;
            tracing::info!("Progress writer stopped");
        })
    }

    async fn flush_in_background(&self) {
        let queue = self.clone();
        match tokio::task::spawn_blocking(move || queue.flush()).await {
            Ok(Ok(_)) => {}
            // Already logged; the snapshot stays queued for the next event.
            Ok(Err(_)) => {}
            Err(e) => tracing::error!(error = %e, "Progress writer task panicked"),
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<Pending>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_xp(xp: u64) -> ProgressState {
        ProgressState {
            total_xp: xp,
            ..ProgressState::default()
        }
    }

    #[test]
    fn latest_snapshot_wins() {
        let memory = Arc::new(MemoryPersistence::new());
        let queue = SaveQueue::new(memory.clone(), SaveMode::Persist);

        queue.schedule(state_with_xp(10));
        queue.schedule(state_with_xp(20));
        queue.schedule(state_with_xp(30));
        assert!(queue.flush().unwrap());
        assert!(!queue.flush().unwrap());

        assert_eq!(memory.write_count(), 1);
        assert_eq!(memory.load().unwrap().unwrap().total_xp, 30);
        assert_eq!(queue.written_generation(), 3);
    }

    #[test]
    fn failed_write_is_retried_on_next_flush() {
        let memory = Arc::new(MemoryPersistence::new());
        let queue = SaveQueue::new(memory.clone(), SaveMode::Persist);

        memory.set_fail_writes(true);
        queue.schedule(state_with_xp(5));
        assert!(queue.flush().is_err());
        assert!(queue.has_pending());

        memory.set_fail_writes(false);
        assert!(queue.flush().unwrap());
        assert_eq!(memory.load().unwrap().unwrap().total_xp, 5);
    }

    #[test]
    fn failed_write_does_not_shadow_newer_snapshot() {
        let memory = Arc::new(MemoryPersistence::new());
        let queue = SaveQueue::new(memory.clone(), SaveMode::Persist);

        memory.set_fail_writes(true);
        queue.schedule(state_with_xp(1));
        let _ = queue.flush();
        queue.schedule(state_with_xp(2));
        memory.set_fail_writes(false);
        queue.flush().unwrap();

        assert_eq!(memory.load().unwrap().unwrap().total_xp, 2);
    }

    #[test]
    fn skip_mode_never_writes() {
        let memory = Arc::new(MemoryPersistence::new());
        let queue = SaveQueue::new(memory.clone(), SaveMode::Skip);
        queue.schedule(state_with_xp(10));
        assert!(!queue.has_pending());
        assert!(!queue.flush().unwrap());
        assert!(memory.blob().is_none());
    }

    #[test]
    fn corrupt_blob_fails_to_load_with_its_bytes() {
        let memory = MemoryPersistence::with_blob(b"{not json".to_vec());
        match memory.load() {
            Err(PersistenceError::Decode { raw, .. }) => assert_eq!(raw, b"{not json".to_vec()),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn sled_adapter_sets_unreadable_bytes_aside() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("db").to_str().unwrap()).unwrap());
        store.put_progress_blob("default", b"\x00junk").unwrap();
        let adapter = SledPersistence::new(store.clone(), "default");

        let Err(PersistenceError::Decode { raw, .. }) = adapter.load() else {
            panic!("expected decode error");
        };
        adapter.preserve_unreadable(&raw).unwrap();

        assert_eq!(
            store.get_unreadable_progress_blob("default").unwrap(),
            Some(b"\x00junk".to_vec())
        );
        assert_eq!(store.list_progress_profiles().unwrap(), vec!["default"]);
    }

    #[test]
    fn sled_adapter_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("db").to_str().unwrap()).unwrap());
        let adapter = SledPersistence::new(store, "default");

        assert!(adapter.load().unwrap().is_none());
        adapter.save(&state_with_xp(77)).unwrap();
        assert_eq!(adapter.load().unwrap().unwrap().total_xp, 77);
    }

    #[tokio::test]
    async fn writer_task_drains_and_stops_on_shutdown() {
        let memory = Arc::new(MemoryPersistence::new());
        let queue = SaveQueue::new(memory.clone(), SaveMode::Persist);
        let (tx, rx) = broadcast::channel(1);
        let handle = queue.spawn_writer(Duration::from_millis(5), rx);

        queue.schedule(state_with_xp(1));
        queue.schedule(state_with_xp(2));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(memory.load().unwrap().unwrap().total_xp, 2);

        queue.schedule(state_with_xp(3));
        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(memory.load().unwrap().unwrap().total_xp, 3);
    }
}
