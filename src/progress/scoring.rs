use crate::constants::{
    BASE_POINTS_PER_ANSWER, MAX_STREAK_EXPONENTIAL, STREAK_GROWTH_RATE, STREAK_MILESTONES,
};

/// Milestone multiplier for an exact streak length, if it is a milestone.
pub fn milestone_multiplier(question_streak: u32) -> Option<f64> {
    STREAK_MILESTONES
        .iter()
        .find(|(streak, _)| *streak == question_streak)
        .map(|(_, multiplier)| *multiplier)
}

pub fn is_streak_milestone(question_streak: u32) -> bool {
    milestone_multiplier(question_streak).is_some()
}

fn exponential_factor(question_streak: u32) -> f64 {
    let exponent = question_streak.saturating_sub(1).min(i32::MAX as u32) as i32;
    STREAK_GROWTH_RATE.powi(exponent).min(MAX_STREAK_EXPONENTIAL)
}

/// Points for one correct answer. `question_streak` is the streak *after*
/// counting this answer, so it is at least 1.
///
/// Off-milestone answers truncate the fractional part; milestone answers
/// stack the milestone multiplier on top of the exponential factor and round
/// to nearest.
pub fn points_for_answer(question_streak: u32) -> u64 {
    let streak = question_streak.max(1);
    let raw = BASE_POINTS_PER_ANSWER * exponential_factor(streak);

    match milestone_multiplier(streak) {
        Some(multiplier) => (raw * multiplier).round() as u64,
        None => raw.trunc() as u64,
    }
}
