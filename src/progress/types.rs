use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{ADVANCED_GOAL_XP, DEFAULT_THEME, MODERATE_GOAL_XP, SIMPLE_GOAL_XP};
use crate::progress::daily_goals::find_template;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressState {
    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    /// Always `level::level_for(total_xp)`; rebuilt on load.
    #[serde(skip, default = "default_level")]
    pub level: u32,
    pub daily_streak_days: u32,
    pub longest_streak_days: u32,
    pub last_practice_date: Option<NaiveDate>,
    #[serde(skip)]
    pub question_streak: u32,
    pub best_question_streak: u32,
    #[serde(skip)]
    pub session_points: u64,
    pub total_points: u64,
    #[serde(rename = "completedLessonIDs")]
    pub completed_lesson_ids: BTreeSet<String>,
    pub perfect_lessons: u32,
    #[serde(rename = "unlockedAchievementIDs")]
    pub unlocked_achievement_ids: BTreeSet<String>,
    #[serde(deserialize_with = "lenient_goals")]
    pub active_daily_goals: Vec<DailyGoal>,
    pub last_daily_goal_reset_date: Option<NaiveDate>,
    #[serde(rename = "todayDailyGoalsXP")]
    pub today_daily_goals_xp: u64,
    pub total_daily_goals_completed: u32,
    pub daily_bonus_awarded_on: Option<NaiveDate>,
    pub is_pro_user: bool,
    pub pro_expiry: Option<NaiveDate>,
    pub preferences: DisplayPreferences,
}

fn default_level() -> u32 {
    1
}

/// An unreadable goal list must not cost the rest of the blob. It comes back
/// empty and load-time normalisation regenerates today's goals.
fn lenient_goals<'de, D>(deserializer: D) -> Result<Vec<DailyGoal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    match serde_json::from_value::<Vec<DailyGoal>>(raw) {
        Ok(goals) => Ok(goals),
        Err(e) => {
            tracing::warn!(error = %e, "Stored daily goals unreadable, dropping them");
            Ok(Vec::new())
        }
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            total_xp: 0,
            level: 1,
            daily_streak_days: 0,
            longest_streak_days: 0,
            last_practice_date: None,
            question_streak: 0,
            best_question_streak: 0,
            session_points: 0,
            total_points: 0,
            completed_lesson_ids: BTreeSet::new(),
            perfect_lessons: 0,
            unlocked_achievement_ids: BTreeSet::new(),
            active_daily_goals: Vec::new(),
            last_daily_goal_reset_date: None,
            today_daily_goals_xp: 0,
            total_daily_goals_completed: 0,
            daily_bonus_awarded_on: None,
            is_pro_user: false,
            pro_expiry: None,
            preferences: DisplayPreferences::default(),
        }
    }
}

impl ProgressState {
    /// Pro is active when the flag is set and the expiry (if any) has not passed.
    pub fn is_pro_active(&self, today: NaiveDate) -> bool {
        self.is_pro_user && self.pro_expiry.map_or(true, |expiry| expiry >= today)
    }

    pub fn has_generated_goals(&self) -> bool {
        self.last_daily_goal_reset_date.is_some()
    }

    pub fn completed_goal_count(&self) -> usize {
        self.active_daily_goals
            .iter()
            .filter(|g| g.is_completed)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayPreferences {
    pub sound_enabled: bool,
    pub haptics_enabled: bool,
    pub theme: String,
    pub daily_reminder: bool,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            haptics_enabled: true,
            theme: DEFAULT_THEME.to_string(),
            daily_reminder: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalTier {
    Simple,
    Moderate,
    Advanced,
}

impl GoalTier {
    pub const ALL: [GoalTier; 3] = [GoalTier::Simple, GoalTier::Moderate, GoalTier::Advanced];

    pub fn xp_reward(self) -> u64 {
        match self {
            Self::Simple => SIMPLE_GOAL_XP,
            Self::Moderate => MODERATE_GOAL_XP,
            Self::Advanced => ADVANCED_GOAL_XP,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Advanced => "advanced",
        }
    }
}

/// What a daily goal counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalMetric {
    Lessons,
    Questions,
    Xp,
    CheckIn,
    Perfect,
}

impl GoalMetric {
    /// Keyword match for goals stored before they carried a metric tag.
    pub fn from_title(title: &str) -> Option<Self> {
        let title = title.to_ascii_lowercase();
        if title.contains("check-in") || title.contains("check in") {
            Some(Self::CheckIn)
        } else if title.contains("perfect") {
            Some(Self::Perfect)
        } else if title.contains("lesson") {
            Some(Self::Lessons)
        } else if title.contains("question") {
            Some(Self::Questions)
        } else if title.contains("xp") {
            Some(Self::Xp)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredGoal")]
pub struct DailyGoal {
    pub id: String,
    pub template_id: String,
    pub title: String,
    pub description: String,
    pub tier: GoalTier,
    pub metric: GoalMetric,
    pub icon: String,
    pub target_value: u32,
    pub current_progress: u32,
    pub is_completed: bool,
    /// Always the tier reward; a stored value is ignored.
    pub xp_reward: u64,
    pub created_at: NaiveDate,
}

impl DailyGoal {
    pub fn fraction(&self) -> f64 {
        if self.target_value == 0 {
            return 1.0;
        }
        (self.current_progress as f64 / self.target_value as f64).min(1.0)
    }
}

/// Wire shape accepted on load. Older blobs lack the template id, icon and
/// metric, and may use the short `target`/`progress`/`completed` names.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredGoal {
    id: String,
    #[serde(default)]
    template_id: String,
    title: String,
    #[serde(default)]
    description: String,
    tier: GoalTier,
    #[serde(default)]
    metric: Option<GoalMetric>,
    #[serde(default)]
    icon: String,
    #[serde(alias = "target")]
    target_value: u32,
    #[serde(default, alias = "progress")]
    current_progress: u32,
    #[serde(default, alias = "completed")]
    is_completed: bool,
    created_at: NaiveDate,
}

impl TryFrom<StoredGoal> for DailyGoal {
    type Error = String;

    fn try_from(stored: StoredGoal) -> Result<Self, Self::Error> {
        let template = find_template(&stored.template_id);
        let metric = stored
            .metric
            .or_else(|| template.map(|t| t.metric))
            .or_else(|| GoalMetric::from_title(&stored.title))
            .ok_or_else(|| format!("goal '{}' has no recognisable metric", stored.title))?;
        if stored.target_value == 0 {
            return Err(format!("goal '{}' has a zero target", stored.title));
        }

        Ok(Self {
            id: stored.id,
            template_id: stored.template_id,
            title: stored.title,
            description: stored.description,
            tier: stored.tier,
            metric,
            icon: if stored.icon.is_empty() {
                template.map(|t| t.icon.to_string()).unwrap_or_default()
            } else {
                stored.icon
            },
            target_value: stored.target_value,
            current_progress: stored.current_progress.min(stored.target_value),
            is_completed: stored.is_completed,
            xp_reward: stored.tier.xp_reward(),
            created_at: stored.created_at,
        })
    }
}

/// Semantic action fed to the daily goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum GoalAction {
    AppOpened,
    LessonCompleted,
    QuestionCorrect,
    XpEarned { amount: u64 },
    PerfectLesson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum XpSource {
    Direct,
    Answer,
    DailyGoal,
    DailyGoalBonus,
    Achievement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ProgressEvent {
    AwardXp {
        amount: i64,
    },
    CorrectAnswer,
    IncorrectAnswer,
    #[serde(rename_all = "camelCase")]
    LessonCompleted {
        lesson_id: String,
        #[serde(default)]
        perfect: bool,
    },
    DailyGoalAction {
        action: GoalAction,
    },
    CheckDailyGoals,
    ResetSession,
    #[serde(rename_all = "camelCase")]
    SetProStatus {
        is_pro: bool,
        #[serde(default)]
        expiry: Option<NaiveDate>,
    },
    UpdatePreferences {
        preferences: DisplayPreferences,
    },
}

impl ProgressEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AwardXp { .. } => "award_xp",
            Self::CorrectAnswer => "correct_answer",
            Self::IncorrectAnswer => "incorrect_answer",
            Self::LessonCompleted { .. } => "lesson_completed",
            Self::DailyGoalAction { .. } => "daily_goal_action",
            Self::CheckDailyGoals => "check_daily_goals",
            Self::ResetSession => "reset_session",
            Self::SetProStatus { .. } => "set_pro_status",
            Self::UpdatePreferences { .. } => "update_preferences",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ProgressNotification {
    LevelUp {
        level: u32,
    },
    QuestionStreakMilestone {
        streak: u32,
    },
    DailyStreakExtended {
        days: u32,
    },
    #[serde(rename_all = "camelCase")]
    DailyGoalCompleted {
        goal_id: String,
        title: String,
        xp_reward: u64,
    },
    #[serde(rename_all = "camelCase")]
    AllDailyGoalsCompleted {
        bonus_xp: u64,
    },
    #[serde(rename_all = "camelCase")]
    AchievementUnlocked {
        id: String,
        title: String,
        xp_reward: u64,
    },
}

/// Result of applying one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOutcome {
    pub points_awarded: u64,
    pub xp_awarded: u64,
    pub notifications: Vec<ProgressNotification>,
    /// False when the event left state untouched and nothing was saved.
    pub mutated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_on_decode() {
        let decoded: ProgressState = serde_json::from_str(r#"{"totalXP": 42}"#).unwrap();
        assert_eq!(decoded.total_xp, 42);
        assert_eq!(decoded.level, 1);
        assert!(decoded.active_daily_goals.is_empty());
        assert_eq!(decoded.preferences, DisplayPreferences::default());
    }

    #[test]
    fn goals_without_metric_tags_still_decode() {
        let decoded: ProgressState = serde_json::from_value(serde_json::json!({
            "totalXP": 5000,
            "dailyStreakDays": 4,
            "activeDailyGoals": [
                {"id": "g1", "title": "Quick Lesson", "description": "Finish a lesson",
                 "tier": "simple", "target": 1, "progress": 1, "completed": true,
                 "createdAt": "2026-03-10"},
                {"id": "g2", "title": "Question Run", "tier": "moderate",
                 "targetValue": 15, "currentProgress": 4, "isCompleted": false,
                 "createdAt": "2026-03-10"},
                {"id": "g3", "title": "Earn 400 XP", "tier": "advanced",
                 "targetValue": 400, "currentProgress": 0, "isCompleted": false,
                 "createdAt": "2026-03-10"}
            ]
        }))
        .unwrap();

        assert_eq!(decoded.total_xp, 5000);
        let metrics: Vec<GoalMetric> = decoded.active_daily_goals.iter().map(|g| g.metric).collect();
        assert_eq!(metrics, vec![GoalMetric::Lessons, GoalMetric::Questions, GoalMetric::Xp]);
        assert!(decoded.active_daily_goals[0].is_completed);
        assert_eq!(decoded.active_daily_goals[1].current_progress, 4);
        assert_eq!(decoded.active_daily_goals[2].xp_reward, ADVANCED_GOAL_XP);
    }

    #[test]
    fn unreadable_goal_list_keeps_the_rest() {
        let decoded: ProgressState = serde_json::from_value(serde_json::json!({
            "totalXP": 70,
            "completedLessonIDs": ["a"],
            "activeDailyGoals": [{"id": "g1", "title": "Mystery", "tier": "simple",
                                  "targetValue": 1, "createdAt": "2026-03-10"}]
        }))
        .unwrap();

        assert_eq!(decoded.total_xp, 70);
        assert_eq!(decoded.completed_lesson_ids.len(), 1);
        assert!(decoded.active_daily_goals.is_empty());
    }

    #[test]
    fn goal_reward_is_serialized() {
        let goal = find_template("one_lesson")
            .unwrap()
            .instantiate(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        let json = serde_json::to_value(&goal).unwrap();
        assert_eq!(json["xpReward"], SIMPLE_GOAL_XP);
        assert_eq!(json["metric"], "lessons");
    }

    #[test]
    fn session_counters_are_not_persisted() {
        let state = ProgressState {
            question_streak: 7,
            session_points: 99,
            ..ProgressState::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("questionStreak").is_none());
        assert!(json.get("sessionPoints").is_none());
        assert!(json.get("level").is_none());
    }

    #[test]
    fn pro_expiry_is_inclusive() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let mut state = ProgressState {
            is_pro_user: true,
            pro_expiry: Some(today),
            ..ProgressState::default()
        };
        assert!(state.is_pro_active(today));
        assert!(!state.is_pro_active(today.succ_opt().unwrap()));
        state.pro_expiry = None;
        assert!(state.is_pro_active(today));
    }

    #[test]
    fn event_wire_format_is_tagged() {
        let event: ProgressEvent =
            serde_json::from_str(r#"{"type":"lessonCompleted","lessonId":"l1"}"#).unwrap();
        assert_eq!(
            event,
            ProgressEvent::LessonCompleted {
                lesson_id: "l1".to_string(),
                perfect: false
            }
        );

        let action: GoalAction =
            serde_json::from_str(r#"{"type":"xpEarned","amount":30}"#).unwrap();
        assert_eq!(action, GoalAction::XpEarned { amount: 30 });
    }
}
