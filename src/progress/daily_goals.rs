//! Daily goals: a static candidate pool per tier and the three active goals
//! drawn from it each calendar day.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::constants::ALL_DAILY_GOALS_BONUS_XP;
use crate::progress::types::{DailyGoal, GoalAction, GoalMetric, GoalTier, ProgressState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalTemplate {
    pub id: &'static str,
    pub tier: GoalTier,
    pub metric: GoalMetric,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub target: u32,
}

const SIMPLE_POOL: &[GoalTemplate] = &[
    GoalTemplate {
        id: "daily_check_in",
        tier: GoalTier::Simple,
        metric: GoalMetric::CheckIn,
        title: "Daily Check-in",
        description: "Open the app today",
        icon: "hand.wave",
        target: 1,
    },
    GoalTemplate {
        id: "one_lesson",
        tier: GoalTier::Simple,
        metric: GoalMetric::Lessons,
        title: "Quick Lesson",
        description: "Complete 1 lesson",
        icon: "book",
        target: 1,
    },
    GoalTemplate {
        id: "five_questions",
        tier: GoalTier::Simple,
        metric: GoalMetric::Questions,
        title: "Warm-up Questions",
        description: "Answer 5 questions correctly",
        icon: "checkmark.circle",
        target: 5,
    },
    GoalTemplate {
        id: "fifty_xp",
        tier: GoalTier::Simple,
        metric: GoalMetric::Xp,
        title: "Earn 50 XP",
        description: "Earn 50 XP from any activity",
        icon: "star",
        target: 50,
    },
];

const MODERATE_POOL: &[GoalTemplate] = &[
    GoalTemplate {
        id: "three_lessons",
        tier: GoalTier::Moderate,
        metric: GoalMetric::Lessons,
        title: "Lesson Trio",
        description: "Complete 3 lessons",
        icon: "books.vertical",
        target: 3,
    },
    GoalTemplate {
        id: "fifteen_questions",
        tier: GoalTier::Moderate,
        metric: GoalMetric::Questions,
        title: "Question Run",
        description: "Answer 15 questions correctly",
        icon: "list.bullet",
        target: 15,
    },
    GoalTemplate {
        id: "one_fifty_xp",
        tier: GoalTier::Moderate,
        metric: GoalMetric::Xp,
        title: "Earn 150 XP",
        description: "Earn 150 XP from any activity",
        icon: "star.leadinghalf.filled",
        target: 150,
    },
    GoalTemplate {
        id: "perfect_score",
        tier: GoalTier::Moderate,
        metric: GoalMetric::Perfect,
        title: "Perfect Score",
        description: "Finish a lesson without a mistake",
        icon: "rosette",
        target: 1,
    },
];

const ADVANCED_POOL: &[GoalTemplate] = &[
    GoalTemplate {
        id: "five_lessons",
        tier: GoalTier::Advanced,
        metric: GoalMetric::Lessons,
        title: "Lesson Marathon",
        description: "Complete 5 lessons",
        icon: "graduationcap",
        target: 5,
    },
    GoalTemplate {
        id: "thirty_questions",
        tier: GoalTier::Advanced,
        metric: GoalMetric::Questions,
        title: "Question Champion",
        description: "Answer 30 questions correctly",
        icon: "trophy",
        target: 30,
    },
    GoalTemplate {
        id: "four_hundred_xp",
        tier: GoalTier::Advanced,
        metric: GoalMetric::Xp,
        title: "Earn 400 XP",
        description: "Earn 400 XP from any activity",
        icon: "star.fill",
        target: 400,
    },
    GoalTemplate {
        id: "perfect_streak",
        tier: GoalTier::Advanced,
        metric: GoalMetric::Perfect,
        title: "Perfect Streak",
        description: "Finish 3 lessons without a mistake",
        icon: "crown",
        target: 3,
    },
];

pub fn candidates(tier: GoalTier) -> &'static [GoalTemplate] {
    match tier {
        GoalTier::Simple => SIMPLE_POOL,
        GoalTier::Moderate => MODERATE_POOL,
        GoalTier::Advanced => ADVANCED_POOL,
    }
}

pub fn find_template(template_id: &str) -> Option<&'static GoalTemplate> {
    GoalTier::ALL
        .iter()
        .flat_map(|tier| candidates(*tier).iter())
        .find(|t| t.id == template_id)
}

impl GoalTemplate {
    pub fn instantiate(&self, today: NaiveDate) -> DailyGoal {
        DailyGoal {
            id: uuid::Uuid::new_v4().to_string(),
            template_id: self.id.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            tier: self.tier,
            metric: self.metric,
            icon: self.icon.to_string(),
            target_value: self.target,
            current_progress: 0,
            is_completed: false,
            xp_reward: self.tier.xp_reward(),
            created_at: today,
        }
    }
}

/// One random goal per tier, in tier order.
pub fn generate_goals<R: Rng + ?Sized>(today: NaiveDate, rng: &mut R) -> Vec<DailyGoal> {
    GoalTier::ALL
        .iter()
        .filter_map(|tier| candidates(*tier).choose(&mut *rng))
        .map(|template| template.instantiate(today))
        .collect()
}

/// Exactly three goals, one per tier.
pub fn is_well_formed(goals: &[DailyGoal]) -> bool {
    goals.len() == GoalTier::ALL.len()
        && GoalTier::ALL
            .iter()
            .all(|tier| goals.iter().filter(|g| g.tier == *tier).count() == 1)
}

/// Replaces the active goals when `today` differs from the last reset day.
/// Returns whether a reset happened.
pub fn reset_if_new_day<R: Rng + ?Sized>(
    state: &mut ProgressState,
    today: NaiveDate,
    rng: &mut R,
) -> bool {
    if state.last_daily_goal_reset_date == Some(today) {
        return false;
    }

    state.active_daily_goals = generate_goals(today, rng);
    state.last_daily_goal_reset_date = Some(today);
    state.today_daily_goals_xp = 0;

    tracing::info!(
        %today,
        goals = ?state
            .active_daily_goals
            .iter()
            .map(|g| g.template_id.as_str())
            .collect::<Vec<_>>(),
        "Daily goals reset"
    );
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedGoal {
    pub goal_id: String,
    pub title: String,
    pub xp_reward: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalAdvance {
    pub completed: Vec<CompletedGoal>,
    /// Set when this advance completed the last open goal of the day.
    pub bonus_xp: Option<u64>,
}

impl GoalAdvance {
    pub fn reward_xp(&self) -> u64 {
        self.completed.iter().map(|c| c.xp_reward).sum::<u64>() + self.bonus_xp.unwrap_or(0)
    }
}

fn step_for(metric: GoalMetric, action: GoalAction) -> Option<Step> {
    match (metric, action) {
        (GoalMetric::Lessons, GoalAction::LessonCompleted) => Some(Step::Add(1)),
        (GoalMetric::Questions, GoalAction::QuestionCorrect) => Some(Step::Add(1)),
        (GoalMetric::Perfect, GoalAction::PerfectLesson) => Some(Step::Add(1)),
        (GoalMetric::Xp, GoalAction::XpEarned { amount }) if amount > 0 => {
            Some(Step::Add(u32::try_from(amount).unwrap_or(u32::MAX)))
        }
        (GoalMetric::CheckIn, GoalAction::AppOpened) => Some(Step::AtLeast(1)),
        _ => None,
    }
}

enum Step {
    Add(u32),
    AtLeast(u32),
}

/// Feeds one action to the open goals. Newly completed goals are marked,
/// their rewards booked into the daily counters, and returned so the caller
/// can credit the XP.
pub fn advance(state: &mut ProgressState, action: GoalAction, today: NaiveDate) -> GoalAdvance {
    let mut result = GoalAdvance::default();

    for goal in state.active_daily_goals.iter_mut() {
        if goal.is_completed {
            continue;
        }
        let Some(step) = step_for(goal.metric, action) else {
            continue;
        };

        let next = match step {
            Step::Add(n) => goal.current_progress.saturating_add(n),
            Step::AtLeast(n) => goal.current_progress.max(n),
        };
        goal.current_progress = next.min(goal.target_value);

        if goal.current_progress >= goal.target_value {
            goal.is_completed = true;
            result.completed.push(CompletedGoal {
                goal_id: goal.id.clone(),
                title: goal.title.clone(),
                xp_reward: goal.xp_reward,
            });
        }
    }

    for completed in &result.completed {
        state.today_daily_goals_xp += completed.xp_reward;
        state.total_daily_goals_completed += 1;
        tracing::info!(goal = %completed.title, xp = completed.xp_reward, "Daily goal completed");
    }

    let all_done = !state.active_daily_goals.is_empty()
        && state.active_daily_goals.iter().all(|g| g.is_completed);
    if !result.completed.is_empty() && all_done && state.daily_bonus_awarded_on != Some(today) {
        state.daily_bonus_awarded_on = Some(today);
        state.today_daily_goals_xp += ALL_DAILY_GOALS_BONUS_XP;
        result.bonus_xp = Some(ALL_DAILY_GOALS_BONUS_XP);
        tracing::info!(bonus = ALL_DAILY_GOALS_BONUS_XP, "All daily goals completed");
    }

    result
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()
    }

    fn state_with(templates: [&str; 3]) -> ProgressState {
        let mut state = ProgressState::default();
        state.active_daily_goals = templates
            .iter()
            .map(|id| find_template(id).unwrap().instantiate(today()))
            .collect();
        state.last_daily_goal_reset_date = Some(today());
        state
    }

    #[test]
    fn every_tier_has_four_candidates() {
        for tier in GoalTier::ALL {
            let pool = candidates(tier);
            assert_eq!(pool.len(), 4);
            assert!(pool.iter().all(|t| t.tier == tier && t.target > 0));
        }
    }

    #[test]
    fn reset_generates_one_goal_per_tier() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = ProgressState::default();
        assert!(reset_if_new_day(&mut state, today(), &mut rng));

        assert!(is_well_formed(&state.active_daily_goals));
        assert!(state
            .active_daily_goals
            .iter()
            .all(|g| g.current_progress == 0 && !g.is_completed && g.created_at == today()));
        assert_eq!(state.last_daily_goal_reset_date, Some(today()));
    }

    #[test]
    fn second_reset_same_day_is_noop() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = ProgressState::default();
        reset_if_new_day(&mut state, today(), &mut rng);
        let before = state.active_daily_goals.clone();

        assert!(!reset_if_new_day(&mut state, today(), &mut rng));
        assert_eq!(state.active_daily_goals, before);
    }

    #[test]
    fn same_seed_picks_same_templates() {
        let pick = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            generate_goals(today(), &mut rng)
                .into_iter()
                .map(|g| g.template_id)
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(42), pick(42));
    }

    #[test]
    fn reset_on_new_day_zeroes_daily_xp() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = state_with(["daily_check_in", "perfect_score", "perfect_streak"]);
        state.today_daily_goals_xp = 40;

        let tomorrow = today().succ_opt().unwrap();
        assert!(reset_if_new_day(&mut state, tomorrow, &mut rng));
        assert_eq!(state.today_daily_goals_xp, 0);
        assert_eq!(state.last_daily_goal_reset_date, Some(tomorrow));
    }

    #[test]
    fn actions_only_move_matching_goals() {
        let mut state = state_with(["one_lesson", "fifteen_questions", "four_hundred_xp"]);

        let adv = advance(&mut state, GoalAction::QuestionCorrect, today());
        assert!(adv.completed.is_empty());
        assert_eq!(state.active_daily_goals[0].current_progress, 0);
        assert_eq!(state.active_daily_goals[1].current_progress, 1);
        assert_eq!(state.active_daily_goals[2].current_progress, 0);

        advance(&mut state, GoalAction::XpEarned { amount: 37 }, today());
        assert_eq!(state.active_daily_goals[2].current_progress, 37);
    }

    #[test]
    fn check_in_sets_progress_to_one() {
        let mut state = state_with(["daily_check_in", "fifteen_questions", "perfect_streak"]);
        let adv = advance(&mut state, GoalAction::AppOpened, today());
        assert_eq!(adv.completed.len(), 1);
        assert_eq!(adv.completed[0].xp_reward, GoalTier::Simple.xp_reward());
        assert!(state.active_daily_goals[0].is_completed);

        let again = advance(&mut state, GoalAction::AppOpened, today());
        assert!(again.completed.is_empty());
        assert_eq!(state.total_daily_goals_completed, 1);
    }

    #[test]
    fn completion_is_write_once() {
        let mut state = state_with(["one_lesson", "three_lessons", "five_lessons"]);
        advance(&mut state, GoalAction::LessonCompleted, today());
        assert!(state.active_daily_goals[0].is_completed);

        for _ in 0..10 {
            advance(&mut state, GoalAction::LessonCompleted, today());
        }
        assert_eq!(state.active_daily_goals[0].current_progress, 1);
        assert_eq!(state.total_daily_goals_completed, 3);
    }

    #[test]
    fn all_goals_bonus_awarded_exactly_once() {
        let mut state = state_with(["one_lesson", "three_lessons", "five_lessons"]);
        let mut bonuses = 0;
        for _ in 0..8 {
            let adv = advance(&mut state, GoalAction::LessonCompleted, today());
            if adv.bonus_xp.is_some() {
                bonuses += 1;
            }
        }
        assert_eq!(bonuses, 1);
        let expected = GoalTier::Simple.xp_reward()
            + GoalTier::Moderate.xp_reward()
            + GoalTier::Advanced.xp_reward()
            + ALL_DAILY_GOALS_BONUS_XP;
        assert_eq!(state.today_daily_goals_xp, expected);
        assert_eq!(state.daily_bonus_awarded_on, Some(today()));
    }

    #[test]
    fn xp_goal_progress_is_capped_at_target() {
        let mut state = state_with(["fifty_xp", "one_fifty_xp", "four_hundred_xp"]);
        let adv = advance(&mut state, GoalAction::XpEarned { amount: 1_000 }, today());
        assert_eq!(adv.completed.len(), 3);
        assert_eq!(adv.bonus_xp, Some(ALL_DAILY_GOALS_BONUS_XP));
        assert!(state
            .active_daily_goals
            .iter()
            .all(|g| g.current_progress == g.target_value));
    }

    #[test]
    fn malformed_goal_lists_are_detected() {
        let state = state_with(["one_lesson", "three_lessons", "five_lessons"]);
        assert!(is_well_formed(&state.active_daily_goals));
        assert!(!is_well_formed(&state.active_daily_goals[..2]));

        let twice_simple = state_with(["one_lesson", "fifty_xp", "five_lessons"]);
        assert!(!is_well_formed(&twice_simple.active_daily_goals));
    }
}
