//! Daily practice streak.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    Started,
    Unchanged,
    Extended,
    Restarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakTransition {
    pub days: u32,
    pub last_practice_date: NaiveDate,
    pub change: StreakChange,
}

impl StreakTransition {
    pub fn changed_value(&self, previous_days: u32) -> bool {
        self.days != previous_days
    }
}

/// Applies one XP-awarding event on `today` to the stored streak.
///
/// A `last_practice_date` later than `today` (clock moved backwards) is
/// treated like a same-day repeat.
pub fn advance(
    last_practice_date: Option<NaiveDate>,
    current_days: u32,
    today: NaiveDate,
) -> StreakTransition {
    let Some(last) = last_practice_date else {
        return StreakTransition {
            days: 1,
            last_practice_date: today,
            change: StreakChange::Started,
        };
    };

    match (today - last).num_days() {
        gap if gap <= 0 => StreakTransition {
            days: current_days.max(1),
            last_practice_date: last,
            change: StreakChange::Unchanged,
        },
        1 => StreakTransition {
            days: current_days.saturating_add(1),
            last_practice_date: today,
            change: StreakChange::Extended,
        },
        _ => StreakTransition {
            days: 1,
            last_practice_date: today,
            change: StreakChange::Restarted,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreakStatus {
    /// Never practiced.
    None,
    /// Practiced today.
    Active,
    /// Practiced yesterday; practicing today extends the streak.
    AtRisk,
    /// Last practice was two or more days ago; the next practice restarts at 1.
    Broken,
}

pub fn status(last_practice_date: Option<NaiveDate>, today: NaiveDate) -> StreakStatus {
    match last_practice_date {
        None => StreakStatus::None,
        Some(last) => match (today - last).num_days() {
            gap if gap <= 0 => StreakStatus::Active,
            1 => StreakStatus::AtRisk,
            _ => StreakStatus::Broken,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn first_practice_starts_at_one() {
        let t = advance(None, 0, day(10));
        assert_eq!(t.days, 1);
        assert_eq!(t.last_practice_date, day(10));
        assert_eq!(t.change, StreakChange::Started);
    }

    #[test]
    fn same_day_is_idempotent() {
        let t = advance(Some(day(10)), 4, day(10));
        assert_eq!(t.days, 4);
        assert_eq!(t.change, StreakChange::Unchanged);
        assert!(!t.changed_value(4));
    }

    #[test]
    fn consecutive_day_extends() {
        let t = advance(Some(day(9)), 4, day(10));
        assert_eq!(t.days, 5);
        assert_eq!(t.last_practice_date, day(10));
        assert_eq!(t.change, StreakChange::Extended);
    }

    #[test]
    fn gap_restarts_at_one() {
        let t = advance(Some(day(7)), 4, day(10));
        assert_eq!(t.days, 1);
        assert_eq!(t.change, StreakChange::Restarted);
    }

    #[test]
    fn extends_across_month_boundary() {
        let last = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        let t = advance(Some(last), 2, day(1));
        assert_eq!(t.days, 3);
    }

    #[test]
    fn clock_going_backwards_keeps_streak() {
        let t = advance(Some(day(10)), 3, day(8));
        assert_eq!(t.days, 3);
        assert_eq!(t.last_practice_date, day(10));
    }

    #[test]
    fn status_reflects_gap() {
        assert_eq!(status(None, day(10)), StreakStatus::None);
        assert_eq!(status(Some(day(10)), day(10)), StreakStatus::Active);
        assert_eq!(status(Some(day(9)), day(10)), StreakStatus::AtRisk);
        assert_eq!(status(Some(day(5)), day(10)), StreakStatus::Broken);
    }
}
