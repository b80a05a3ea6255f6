use crate::progress::ProgressService;

/// Rolls daily goals over once the calendar day has changed. Same-day runs
/// leave state untouched, so the hourly schedule is safe.
pub async fn run(progress: &ProgressService) {
    tracing::debug!("daily_rollover: start");
    let outcome = progress.apply(crate::progress::ProgressEvent::CheckDailyGoals);
    if outcome.mutated {
        let goals = progress.read(|engine| engine.daily_goals().len());
        tracing::info!(goals, "daily_rollover: goals regenerated");
    } else {
        tracing::debug!("daily_rollover: nothing to do");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::progress::catalog::StaticLessonCatalog;
    use crate::progress::clock::FixedClock;
    use crate::progress::persistence::{MemoryPersistence, SaveMode, SaveQueue};
    use crate::progress::{ProgressState, ProgressStore};

    #[tokio::test]
    async fn rollover_is_idempotent_within_a_day() {
        let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()));
        let engine = ProgressStore::new(
            ProgressState::default(),
            SaveQueue::new(Arc::new(MemoryPersistence::new()), SaveMode::Persist),
            Arc::new(StaticLessonCatalog::default()),
            clock.clone(),
            StdRng::seed_from_u64(2),
        );
        let progress = ProgressService::new(engine);

        run(&progress).await;
        let first = progress.snapshot().active_daily_goals;
        assert_eq!(first.len(), 3);

        run(&progress).await;
        assert_eq!(progress.snapshot().active_daily_goals, first);

        clock.advance_days(1);
        run(&progress).await;
        let next = progress.snapshot();
        assert_eq!(
            next.last_daily_goal_reset_date,
            NaiveDate::from_ymd_opt(2026, 6, 2)
        );
    }
}
