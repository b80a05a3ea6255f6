//! Achievement catalog and evaluator.
//!
//! Unlocks are monotonic: evaluation only ever inserts into
//! `unlocked_achievement_ids`, and an id already present is never looked at
//! again, so running the evaluator twice on the same state is a no-op.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::progress::catalog::LessonCatalog;
use crate::progress::types::ProgressState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    LessonsCompleted(u32),
    DailyStreak(u32),
    QuestionStreak(u32),
    TotalXp(u64),
    Level(u32),
    TotalPoints(u64),
    DailyGoalsCompleted(u32),
    PerfectLessons(u32),
    /// Every lesson of the category is completed (empty categories never count).
    CategoryComplete(&'static str),
}

impl Requirement {
    pub fn is_met(&self, state: &ProgressState, catalog: &dyn LessonCatalog) -> bool {
        match *self {
            Self::CategoryComplete(category) => catalog
                .category_progress(category, &state.completed_lesson_ids)
                .is_complete(),
            _ => self.progress(state, catalog) >= 1.0,
        }
    }

    /// Fraction towards the requirement, clamped to `[0, 1]`.
    pub fn progress(&self, state: &ProgressState, catalog: &dyn LessonCatalog) -> f64 {
        let ratio = |have: f64, need: f64| {
            if need <= 0.0 {
                1.0
            } else {
                (have / need).clamp(0.0, 1.0)
            }
        };

        match *self {
            Self::LessonsCompleted(n) => ratio(state.completed_lesson_ids.len() as f64, n as f64),
            Self::DailyStreak(n) => ratio(state.daily_streak_days as f64, n as f64),
            Self::QuestionStreak(n) => ratio(state.question_streak as f64, n as f64),
            Self::TotalXp(n) => ratio(state.total_xp as f64, n as f64),
            Self::Level(n) => ratio(state.level as f64, n as f64),
            Self::TotalPoints(n) => ratio(state.total_points as f64, n as f64),
            Self::DailyGoalsCompleted(n) => {
                ratio(state.total_daily_goals_completed as f64, n as f64)
            }
            Self::PerfectLessons(n) => ratio(state.perfect_lessons as f64, n as f64),
            Self::CategoryComplete(category) => catalog
                .category_progress(category, &state.completed_lesson_ids)
                .fraction(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub xp_reward: u64,
    pub requirement: Requirement,
}

const fn achievement(
    id: &'static str,
    title: &'static str,
    description: &'static str,
    rarity: Rarity,
    xp_reward: u64,
    requirement: Requirement,
) -> Achievement {
    Achievement {
        id,
        title,
        description,
        rarity,
        xp_reward,
        requirement,
    }
}

pub const ACHIEVEMENTS: &[Achievement] = &[
    achievement("first_lesson", "First Steps", "Complete your first lesson", Rarity::Common, 50, Requirement::LessonsCompleted(1)),
    achievement("lessons_10", "Dedicated Learner", "Complete 10 lessons", Rarity::Rare, 150, Requirement::LessonsCompleted(10)),
    achievement("lessons_50", "Scholar", "Complete 50 lessons", Rarity::Epic, 500, Requirement::LessonsCompleted(50)),
    achievement("streak_3", "Three in a Row", "Practice 3 days in a row", Rarity::Common, 50, Requirement::DailyStreak(3)),
    achievement("streak_7", "Week Warrior", "Practice 7 days in a row", Rarity::Rare, 200, Requirement::DailyStreak(7)),
    achievement("streak_30", "Monthly Devotion", "Practice 30 days in a row", Rarity::Legendary, 1_000, Requirement::DailyStreak(30)),
    achievement("question_streak_10", "Sharpshooter", "Answer 10 questions in a row correctly", Rarity::Common, 50, Requirement::QuestionStreak(10)),
    achievement("question_streak_25", "On Fire", "Answer 25 questions in a row correctly", Rarity::Rare, 150, Requirement::QuestionStreak(25)),
    achievement("question_streak_50", "Untouchable", "Answer 50 questions in a row correctly", Rarity::Epic, 400, Requirement::QuestionStreak(50)),
    achievement("xp_1000", "Rising Star", "Earn 1,000 XP", Rarity::Common, 100, Requirement::TotalXp(1_000)),
    achievement("xp_10000", "XP Hoarder", "Earn 10,000 XP", Rarity::Epic, 500, Requirement::TotalXp(10_000)),
    achievement("level_2", "Level Up", "Reach level 2", Rarity::Rare, 250, Requirement::Level(2)),
    achievement("points_5000", "Point Collector", "Score 5,000 points", Rarity::Rare, 200, Requirement::TotalPoints(5_000)),
    achievement("daily_goals_10", "Goal Getter", "Complete 10 daily goals", Rarity::Rare, 150, Requirement::DailyGoalsCompleted(10)),
    achievement("perfect_5", "Flawless", "Finish 5 lessons without a mistake", Rarity::Rare, 200, Requirement::PerfectLessons(5)),
    achievement("category_basics", "Basics Mastered", "Complete every lesson in Basics", Rarity::Epic, 300, Requirement::CategoryComplete("basics")),
    achievement("category_grammar", "Grammar Guru", "Complete every lesson in Grammar", Rarity::Epic, 300, Requirement::CategoryComplete("grammar")),
    achievement("category_vocabulary", "Word Wizard", "Complete every lesson in Vocabulary", Rarity::Epic, 300, Requirement::CategoryComplete("vocabulary")),
];

static BY_ID: Lazy<HashMap<&'static str, &'static Achievement>> =
    Lazy::new(|| ACHIEVEMENTS.iter().map(|a| (a.id, a)).collect());

pub fn find(id: &str) -> Option<&'static Achievement> {
    BY_ID.get(id).copied()
}

/// One pass over the catalog. Newly satisfied achievements are inserted into
/// the unlocked set and returned; crediting their XP is the caller's job, and
/// the caller re-runs evaluation afterwards because that XP can satisfy more.
pub fn evaluate(
    state: &mut ProgressState,
    catalog: &dyn LessonCatalog,
) -> Vec<&'static Achievement> {
    let mut unlocked = Vec::new();

    for achievement in ACHIEVEMENTS {
        if state.unlocked_achievement_ids.contains(achievement.id) {
            continue;
        }
        if achievement.requirement.is_met(state, catalog) {
            state
                .unlocked_achievement_ids
                .insert(achievement.id.to_string());
            tracing::info!(
                achievement = achievement.id,
                xp = achievement.xp_reward,
                "Achievement unlocked"
            );
            unlocked.push(achievement);
        }
    }

    unlocked
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub rarity: Rarity,
    pub xp_reward: u64,
    pub unlocked: bool,
    pub progress: f64,
}

pub fn views(state: &ProgressState, catalog: &dyn LessonCatalog) -> Vec<AchievementView> {
    ACHIEVEMENTS
        .iter()
        .map(|a| {
            let unlocked = state.unlocked_achievement_ids.contains(a.id);
            AchievementView {
                id: a.id.to_string(),
                title: a.title.to_string(),
                description: a.description.to_string(),
                rarity: a.rarity,
                xp_reward: a.xp_reward,
                unlocked,
                progress: if unlocked {
                    1.0
                } else {
                    a.requirement.progress(state, catalog)
                },
            }
        })
        .collect()
}
