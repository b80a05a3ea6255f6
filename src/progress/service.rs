//! Shared handle around the single `ProgressStore`.
//!
//! All mutation is serialised through one mutex; every event that changed
//! state is re-published on a broadcast channel for the realtime feed.

use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::constants::NOTIFICATION_CHANNEL_CAPACITY;
use crate::progress::catalog::StaticLessonCatalog;
use crate::progress::clock::SystemClock;
use crate::progress::engine::ProgressStore;
use crate::progress::persistence::{PersistenceError, SaveMode, SaveQueue, SledPersistence};
use crate::progress::types::{EventOutcome, ProgressEvent, ProgressNotification, ProgressState};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressChange {
    pub event: &'static str,
    pub notifications: Vec<ProgressNotification>,
    pub state: ProgressState,
}

pub struct ProgressService {
    engine: Mutex<ProgressStore>,
    saver: SaveQueue,
    changes: broadcast::Sender<ProgressChange>,
}

impl ProgressService {
    /// Wires the engine for the daemon: sled-backed persistence for the
    /// configured profile, the lesson catalog file if one is configured, the
    /// host calendar, and a goal RNG seeded from config or entropy.
    pub fn open(config: &Config, store: Arc<Store>) -> Self {
        let adapter = Arc::new(SledPersistence::new(store, config.profile_id.clone()));
        let mode = if config.persistence.skip {
            tracing::warn!("Persistence disabled, progress will not be saved");
            SaveMode::Skip
        } else {
            SaveMode::Persist
        };
        let saver = SaveQueue::new(adapter, mode);

        let catalog = match config.lesson_catalog_path.as_deref() {
            Some(path) => match StaticLessonCatalog::from_json_file(path) {
                Ok(catalog) => {
                    tracing::info!(path, lessons = catalog.len(), "Lesson catalog loaded");
                    catalog
                }
                Err(e) => {
                    tracing::error!(path, error = %e, "Lesson catalog unreadable, category achievements disabled");
                    StaticLessonCatalog::default()
                }
            },
            None => StaticLessonCatalog::default(),
        };

        let rng = match config.goal_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let engine = ProgressStore::load(saver, Arc::new(catalog), Arc::new(SystemClock), rng);
        Self::new(engine)
    }

    pub fn new(engine: ProgressStore) -> Self {
        let saver = engine.saver().clone();
        let (changes, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self {
            engine: Mutex::new(engine),
            saver,
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressStore> {
        self.engine.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Progress engine lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn apply(&self, event: ProgressEvent) -> EventOutcome {
        self.apply_and_read(event, |_| ()).0
    }

    /// Applies `event` and runs `f` on the resulting engine before the lock
    /// is released, so the view belongs to exactly this event.
    pub fn apply_and_read<R>(
        &self,
        event: ProgressEvent,
        f: impl FnOnce(&ProgressStore) -> R,
    ) -> (EventOutcome, R) {
        let (outcome, view, change) = {
            let mut engine = self.lock();
            let kind = event.kind();
            let outcome = engine.apply(event);
            let change = outcome.mutated.then(|| ProgressChange {
                event: kind,
                notifications: outcome.notifications.clone(),
                state: engine.snapshot(),
            });
            let view = f(&engine);
            (outcome, view, change)
        };

        if let Some(change) = change {
            // No subscribers is fine.
            let _ = self.changes.send(change);
        }
        (outcome, view)
    }

    /// Runs `f` against the engine under the lock. Keep `f` short.
    pub fn read<R>(&self, f: impl FnOnce(&ProgressStore) -> R) -> R {
        f(&self.lock())
    }

    pub fn snapshot(&self) -> ProgressState {
        self.lock().snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressChange> {
        self.changes.subscribe()
    }

    pub fn saver(&self) -> &SaveQueue {
        &self.saver
    }

    /// Writes the pending snapshot, if any, without holding the engine lock.
    pub fn flush(&self) -> Result<bool, PersistenceError> {
        self.saver.flush()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::progress::clock::FixedClock;
    use crate::progress::persistence::MemoryPersistence;

    fn service() -> ProgressService {
        let saver = SaveQueue::new(Arc::new(MemoryPersistence::new()), SaveMode::Persist);
        let engine = ProgressStore::new(
            ProgressState::default(),
            saver,
            Arc::new(StaticLessonCatalog::default()),
            Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())),
            StdRng::seed_from_u64(9),
        );
        ProgressService::new(engine)
    }

    #[tokio::test]
    async fn mutations_are_broadcast() {
        let service = service();
        let mut rx = service.subscribe();

        service.apply(ProgressEvent::CorrectAnswer);
        let change = rx.recv().await.unwrap();
        assert_eq!(change.event, "correct_answer");
        assert_eq!(change.state.total_xp, 10);
    }

    #[tokio::test]
    async fn noop_events_are_not_broadcast() {
        let service = service();
        let mut rx = service.subscribe();

        service.apply(ProgressEvent::AwardXp { amount: -3 });
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn open_restores_saved_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("db").to_str().unwrap()).unwrap());
        let mut config = Config::from_env();
        config.profile_id = "service-test".to_string();
        config.persistence.skip = false;
        config.lesson_catalog_path = Some(dir.path().join("missing.json").to_string_lossy().to_string());
        config.goal_seed = Some(5);

        let service = ProgressService::open(&config, store.clone());
        service.apply(ProgressEvent::AwardXp { amount: 30 });
        service.flush().unwrap();

        let reopened = ProgressService::open(&config, store);
        assert_eq!(reopened.snapshot().total_xp, 30);
        assert_eq!(reopened.snapshot().active_daily_goals.len(), 3);
    }

    #[test]
    fn apply_and_read_sees_its_own_event() {
        let service = Arc::new(service());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| {
                            let (outcome, xp) = service
                                .apply_and_read(ProgressEvent::AwardXp { amount: 1 }, |e| {
                                    e.state().total_xp
                                });
                            assert_eq!(outcome.xp_awarded, 1);
                            xp
                        })
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut seen: Vec<u64> = writers
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=100).collect::<Vec<u64>>());
    }

    #[test]
    fn reads_see_latest_state() {
        let service = service();
        service.apply(ProgressEvent::AwardXp { amount: 25 });
        assert_eq!(service.read(|e| e.state().total_xp), 25);
        assert!(service.flush().unwrap());
    }
}
