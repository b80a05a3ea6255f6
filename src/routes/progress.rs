use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::progress::achievements::AchievementView;
use crate::progress::level::LevelProgress;
use crate::progress::streak::StreakStatus;
use crate::progress::types::{DailyGoal, EventOutcome, GoalAction, ProgressEvent, ProgressState};
use crate::progress::ProgressStore;
use crate::response::{ok, AppError};
use crate::state::AppState;

const MAX_LESSON_ID_LEN: usize = 128;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_progress))
        .route("/events", post(apply_event))
        .route("/xp", post(award_xp))
        .route("/answers", post(answer))
        .route("/lessons/:lesson_id/complete", post(complete_lesson))
        .route("/session/reset", post(reset_session))
        .route("/daily-goals", get(get_daily_goals))
        .route("/daily-goals/check", post(check_daily_goals))
        .route("/daily-goals/actions", post(daily_goal_action))
        .route("/achievements", get(get_achievements))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    #[serde(flatten)]
    pub state: ProgressState,
    pub level: u32,
    pub question_streak: u32,
    pub session_points: u64,
    pub level_progress: LevelProgress,
    pub streak_status: StreakStatus,
    pub is_pro_active: bool,
}

impl ProgressView {
    fn from_engine(engine: &ProgressStore) -> Self {
        let state = engine.snapshot();
        Self {
            level: state.level,
            question_streak: state.question_streak,
            session_points: state.session_points,
            level_progress: engine.level_progress(),
            streak_status: engine.streak_status(),
            is_pro_active: engine.is_pro_active(),
            state,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    outcome: EventOutcome,
    progress: ProgressView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DailyGoalsView {
    goals: Vec<DailyGoal>,
    last_reset_date: Option<NaiveDate>,
    #[serde(rename = "todayDailyGoalsXP")]
    today_daily_goals_xp: u64,
    total_daily_goals_completed: u32,
    completed_today: usize,
}

#[derive(Debug, Deserialize)]
struct AwardXpRequest {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    correct: bool,
}

#[derive(Debug, Default, Deserialize)]
struct CompleteLessonRequest {
    #[serde(default)]
    perfect: bool,
}

fn dispatch(state: &AppState, event: ProgressEvent) -> EventResponse {
    let (outcome, progress) = state
        .progress()
        .apply_and_read(event, ProgressView::from_engine);
    EventResponse { outcome, progress }
}

async fn get_progress(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.progress().read(ProgressView::from_engine))
}

async fn apply_event(
    State(state): State<AppState>,
    Json(event): Json<ProgressEvent>,
) -> impl IntoResponse {
    ok(dispatch(&state, event))
}

async fn award_xp(
    State(state): State<AppState>,
    Json(req): Json<AwardXpRequest>,
) -> impl IntoResponse {
    ok(dispatch(&state, ProgressEvent::AwardXp { amount: req.amount }))
}

async fn answer(
    State(state): State<AppState>,
    Json(req): Json<AnswerRequest>,
) -> impl IntoResponse {
    let event = if req.correct {
        ProgressEvent::CorrectAnswer
    } else {
        ProgressEvent::IncorrectAnswer
    };
    ok(dispatch(&state, event))
}

async fn complete_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<String>,
    body: Option<Json<CompleteLessonRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let lesson_id = lesson_id.trim();
    if lesson_id.is_empty() || lesson_id.len() > MAX_LESSON_ID_LEN {
        return Err(AppError::bad_request(
            "INVALID_LESSON_ID",
            "lesson id must be 1-128 characters",
        ));
    }

    let perfect = body.map(|Json(req)| req.perfect).unwrap_or_default();
    Ok(ok(dispatch(
        &state,
        ProgressEvent::LessonCompleted {
            lesson_id: lesson_id.to_string(),
            perfect,
        },
    )))
}

async fn reset_session(State(state): State<AppState>) -> impl IntoResponse {
    ok(dispatch(&state, ProgressEvent::ResetSession))
}

async fn get_daily_goals(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.progress().read(|engine| {
        let s = engine.state();
        DailyGoalsView {
            goals: s.active_daily_goals.clone(),
            last_reset_date: s.last_daily_goal_reset_date,
            today_daily_goals_xp: s.today_daily_goals_xp,
            total_daily_goals_completed: s.total_daily_goals_completed,
            completed_today: s.completed_goal_count(),
        }
    });
    ok(view)
}

async fn check_daily_goals(State(state): State<AppState>) -> impl IntoResponse {
    ok(dispatch(&state, ProgressEvent::CheckDailyGoals))
}

async fn daily_goal_action(
    State(state): State<AppState>,
    Json(action): Json<GoalAction>,
) -> impl IntoResponse {
    ok(dispatch(&state, ProgressEvent::DailyGoalAction { action }))
}

async fn get_achievements(State(state): State<AppState>) -> impl IntoResponse {
    let views: Vec<AchievementView> = state.progress().read(|engine| engine.achievement_views());
    ok(views)
}
