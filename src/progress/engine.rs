//! `ProgressStore`: the aggregate root.
//!
//! Every event goes through [`ProgressStore::apply`], which runs the fixed
//! sequence: direct change, then for each XP credit level, daily streak and
//! `xpEarned` goals, then the event's own goal action, then achievements.
//! Goal and achievement rewards are queued as further credits and drained
//! until evaluation unlocks nothing new. None of the steps can fail, so an
//! event is either fully applied or (for no-op input) not at all.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDate;
use rand::rngs::StdRng;

use crate::progress::achievements::{self, AchievementView};
use crate::progress::catalog::LessonCatalog;
use crate::progress::clock::Clock;
use crate::progress::daily_goals;
use crate::progress::level::{self, LevelProgress};
use crate::progress::persistence::{PersistenceError, SaveQueue};
use crate::progress::scoring;
use crate::progress::streak::{self, StreakChange, StreakStatus};
use crate::progress::types::{
    DailyGoal, DisplayPreferences, EventOutcome, GoalAction, ProgressEvent, ProgressNotification,
    ProgressState, XpSource,
};

pub struct ProgressStore {
    state: ProgressState,
    catalog: Arc<dyn LessonCatalog>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    saver: SaveQueue,
}

/// Bookkeeping for one event.
struct Run {
    today: NaiveDate,
    pending: VecDeque<(u64, XpSource)>,
    outcome: EventOutcome,
}

impl Run {
    fn new(today: NaiveDate) -> Self {
        Self {
            today,
            pending: VecDeque::new(),
            outcome: EventOutcome::default(),
        }
    }

    fn notify(&mut self, notification: ProgressNotification) {
        self.outcome.notifications.push(notification);
    }
}

impl ProgressStore {
    /// Wraps an already-loaded state as is. Nothing is normalised or saved.
    pub fn new(
        state: ProgressState,
        saver: SaveQueue,
        catalog: Arc<dyn LessonCatalog>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        Self {
            state,
            catalog,
            clock,
            rng,
            saver,
        }
    }

    /// Reads the stored blob through the saver's adapter. A missing blob
    /// starts from the default state; either way the result is normalised
    /// and today's goals are in place.
    ///
    /// An undecodable blob is set aside before anything can overwrite it. If
    /// storage could not be read at all, or the bad bytes could not be set
    /// aside, the repaired default is not saved; the stored blob is only
    /// replaced once a real event changes progress.
    pub fn load(
        saver: SaveQueue,
        catalog: Arc<dyn LessonCatalog>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        let (state, save_repairs) = match saver.adapter().load() {
            Ok(Some(state)) => (state, true),
            Ok(None) => {
                tracing::info!("No stored progress, starting fresh");
                (ProgressState::default(), true)
            }
            Err(PersistenceError::Decode { raw, source }) => {
                match saver.adapter().preserve_unreadable(&raw) {
                    Ok(()) => {
                        tracing::warn!(
                            error = %source,
                            bytes = raw.len(),
                            "Stored progress unreadable, set aside and starting fresh"
                        );
                        (ProgressState::default(), true)
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            decode_error = %source,
                            "Stored progress unreadable and could not be set aside, leaving it in place"
                        );
                        (ProgressState::default(), false)
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Stored progress could not be read, leaving it in place");
                (ProgressState::default(), false)
            }
        };

        let mut store = Self::new(state, saver, catalog, clock, rng);
        if store.normalize() && save_repairs {
            store.saver.schedule(store.state.clone());
        }
        tracing::info!(
            total_xp = store.state.total_xp,
            level = store.state.level,
            streak_days = store.state.daily_streak_days,
            "Progress loaded"
        );
        store
    }

    fn normalize(&mut self) -> bool {
        let before = self.state.clone();
        let state = &mut self.state;

        state.level = level::level_for(state.total_xp);
        state.question_streak = 0;
        state.session_points = 0;
        state.longest_streak_days = state.longest_streak_days.max(state.daily_streak_days);
        if state.has_generated_goals() && !daily_goals::is_well_formed(&state.active_daily_goals) {
            tracing::warn!(
                goals = state.active_daily_goals.len(),
                "Stored daily goals malformed, regenerating"
            );
            state.active_daily_goals.clear();
            state.last_daily_goal_reset_date = None;
        }

        let today = self.clock.today();
        daily_goals::reset_if_new_day(&mut self.state, today, &mut self.rng);

        self.state != before
    }

    pub fn apply(&mut self, event: ProgressEvent) -> EventOutcome {
        let kind = event.kind();
        let before = self.state.clone();
        let mut run = Run::new(self.clock.today());

        match event {
            ProgressEvent::AwardXp { amount } => {
                // Negative amounts clamp to zero, and zero changes nothing.
                let amount = u64::try_from(amount).unwrap_or(0);
                if amount > 0 {
                    run.pending.push_back((amount, XpSource::Direct));
                    self.settle(&mut run);
                }
            }
            ProgressEvent::CorrectAnswer => {
                self.correct_answer(&mut run);
                self.settle(&mut run);
            }
            ProgressEvent::IncorrectAnswer => {
                self.state.question_streak = 0;
            }
            ProgressEvent::LessonCompleted { lesson_id, perfect } => {
                self.lesson_completed(&mut run, lesson_id, perfect);
                self.settle(&mut run);
            }
            ProgressEvent::DailyGoalAction { action } => {
                self.advance_goals(&mut run, action);
                self.settle(&mut run);
            }
            ProgressEvent::CheckDailyGoals => {
                daily_goals::reset_if_new_day(&mut self.state, run.today, &mut self.rng);
            }
            ProgressEvent::ResetSession => {
                self.state.question_streak = 0;
                self.state.session_points = 0;
            }
            ProgressEvent::SetProStatus { is_pro, expiry } => {
                self.state.is_pro_user = is_pro;
                self.state.pro_expiry = expiry;
            }
            ProgressEvent::UpdatePreferences { preferences } => {
                self.state.preferences = preferences;
            }
        }

        run.outcome.mutated = self.state != before;
        if run.outcome.mutated {
            self.saver.schedule(self.state.clone());
        }

        tracing::debug!(
            event = kind,
            points = run.outcome.points_awarded,
            xp = run.outcome.xp_awarded,
            notifications = run.outcome.notifications.len(),
            mutated = run.outcome.mutated,
            "Progress event applied"
        );
        run.outcome
    }

    fn correct_answer(&mut self, run: &mut Run) {
        let state = &mut self.state;
        state.question_streak = state.question_streak.saturating_add(1);
        state.best_question_streak = state.best_question_streak.max(state.question_streak);

        let streak = state.question_streak;
        let points = scoring::points_for_answer(streak);
        state.session_points = state.session_points.saturating_add(points);
        state.total_points = state.total_points.saturating_add(points);
        run.outcome.points_awarded += points;

        if scoring::is_streak_milestone(streak) {
            tracing::info!(streak, "Question streak milestone");
            run.notify(ProgressNotification::QuestionStreakMilestone { streak });
        }

        run.pending.push_back((points, XpSource::Answer));
        self.settle(run);
        self.advance_goals(run, GoalAction::QuestionCorrect);
    }

    fn lesson_completed(&mut self, run: &mut Run, lesson_id: String, perfect: bool) {
        let lesson_id = lesson_id.trim();
        if lesson_id.is_empty() {
            tracing::warn!("Ignoring lesson completion without an id");
            return;
        }

        if self.state.completed_lesson_ids.insert(lesson_id.to_string()) {
            tracing::info!(lesson_id, "Lesson completed");
        }
        self.advance_goals(run, GoalAction::LessonCompleted);

        if perfect {
            self.state.perfect_lessons = self.state.perfect_lessons.saturating_add(1);
            self.advance_goals(run, GoalAction::PerfectLesson);
        }
    }

    /// Rolls goals over when the day changed, then feeds them `action`.
    /// Rewards are queued, not credited.
    fn advance_goals(&mut self, run: &mut Run, action: GoalAction) {
        if self.state.has_generated_goals() {
            daily_goals::reset_if_new_day(&mut self.state, run.today, &mut self.rng);
        }

        let advance = daily_goals::advance(&mut self.state, action, run.today);
        for goal in advance.completed {
            run.pending.push_back((goal.xp_reward, XpSource::DailyGoal));
            run.notify(ProgressNotification::DailyGoalCompleted {
                goal_id: goal.goal_id,
                title: goal.title,
                xp_reward: goal.xp_reward,
            });
        }
        if let Some(bonus_xp) = advance.bonus_xp {
            run.pending.push_back((bonus_xp, XpSource::DailyGoalBonus));
            run.notify(ProgressNotification::AllDailyGoalsCompleted { bonus_xp });
        }
    }

    /// Drains queued credits and re-evaluates achievements until nothing new
    /// unlocks. Terminates because the unlocked set only grows.
    fn settle(&mut self, run: &mut Run) {
        loop {
            while let Some((amount, source)) = run.pending.pop_front() {
                self.apply_credit(run, amount, source);
            }

            let unlocked = achievements::evaluate(&mut self.state, self.catalog.as_ref());
            if unlocked.is_empty() {
                break;
            }
            for achievement in unlocked {
                if achievement.xp_reward > 0 {
                    run.pending
                        .push_back((achievement.xp_reward, XpSource::Achievement));
                }
                run.notify(ProgressNotification::AchievementUnlocked {
                    id: achievement.id.to_string(),
                    title: achievement.title.to_string(),
                    xp_reward: achievement.xp_reward,
                });
            }
        }
    }

    fn apply_credit(&mut self, run: &mut Run, amount: u64, source: XpSource) {
        let state = &mut self.state;
        let previous_level = state.level;
        state.total_xp = state.total_xp.saturating_add(amount);
        state.level = level::level_for(state.total_xp);
        run.outcome.xp_awarded += amount;

        tracing::debug!(amount, ?source, total_xp = state.total_xp, "XP credited");
        if state.level > previous_level {
            tracing::info!(level = state.level, total_xp = state.total_xp, "Level up");
            run.notify(ProgressNotification::LevelUp { level: state.level });
        }

        let transition =
            streak::advance(state.last_practice_date, state.daily_streak_days, run.today);
        state.daily_streak_days = transition.days;
        state.last_practice_date = Some(transition.last_practice_date);
        state.longest_streak_days = state.longest_streak_days.max(transition.days);
        match transition.change {
            StreakChange::Extended => {
                tracing::info!(days = transition.days, "Daily streak extended");
                run.notify(ProgressNotification::DailyStreakExtended {
                    days: transition.days,
                });
            }
            StreakChange::Restarted => {
                tracing::info!("Daily streak restarted");
            }
            StreakChange::Started | StreakChange::Unchanged => {}
        }

        self.advance_goals(run, GoalAction::XpEarned { amount });
    }

    pub fn award_xp(&mut self, amount: i64) -> EventOutcome {
        self.apply(ProgressEvent::AwardXp { amount })
    }

    pub fn handle_correct_answer(&mut self) -> EventOutcome {
        self.apply(ProgressEvent::CorrectAnswer)
    }

    pub fn handle_incorrect_answer(&mut self) -> EventOutcome {
        self.apply(ProgressEvent::IncorrectAnswer)
    }

    pub fn mark_lesson_completed(&mut self, lesson_id: impl Into<String>) -> EventOutcome {
        self.complete_lesson(lesson_id, false)
    }

    pub fn complete_lesson(&mut self, lesson_id: impl Into<String>, perfect: bool) -> EventOutcome {
        self.apply(ProgressEvent::LessonCompleted {
            lesson_id: lesson_id.into(),
            perfect,
        })
    }

    pub fn update_daily_goal_progress(&mut self, action: GoalAction) -> EventOutcome {
        self.apply(ProgressEvent::DailyGoalAction { action })
    }

    pub fn check_and_reset_daily_goals(&mut self) -> EventOutcome {
        self.apply(ProgressEvent::CheckDailyGoals)
    }

    pub fn reset_session(&mut self) -> EventOutcome {
        self.apply(ProgressEvent::ResetSession)
    }

    pub fn set_pro_status(&mut self, is_pro: bool, expiry: Option<NaiveDate>) -> EventOutcome {
        self.apply(ProgressEvent::SetProStatus { is_pro, expiry })
    }

    pub fn update_preferences(&mut self, preferences: DisplayPreferences) -> EventOutcome {
        self.apply(ProgressEvent::UpdatePreferences { preferences })
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn snapshot(&self) -> ProgressState {
        self.state.clone()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn daily_goals(&self) -> &[DailyGoal] {
        &self.state.active_daily_goals
    }

    pub fn level_progress(&self) -> LevelProgress {
        level::level_progress(self.state.total_xp)
    }

    pub fn streak_status(&self) -> StreakStatus {
        streak::status(self.state.last_practice_date, self.clock.today())
    }

    pub fn is_pro_active(&self) -> bool {
        self.state.is_pro_active(self.clock.today())
    }

    pub fn achievement_views(&self) -> Vec<AchievementView> {
        achievements::views(&self.state, self.catalog.as_ref())
    }

    pub fn saver(&self) -> &SaveQueue {
        &self.saver
    }

    /// Writes the latest snapshot synchronously.
    pub fn flush(&self) -> Result<bool, PersistenceError> {
        self.saver.flush()
    }
}
