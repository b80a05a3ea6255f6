//! Level curve: total XP to level and back.
//!
//! The curve is super-linear: level `n` sits at `1_000_000 * (n - 1)^2` XP,
//! and `level_for` rounds to the nearest level root, so the jump to a level
//! happens half a root below its threshold. At very high levels adjacent
//! thresholds stay exact in `f64`, but callers should not rely on
//! `level_for(xp_threshold_for(n)) == n` beyond the tested range.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_LEVEL, XP_PER_LEVEL_SCALE};

pub fn level_for(xp: u64) -> u32 {
    let root = (xp as f64 / XP_PER_LEVEL_SCALE).sqrt();
    let level = (root + 0.5).floor() + 1.0;
    level.clamp(1.0, MAX_LEVEL as f64) as u32
}

pub fn xp_threshold_for(level: u32) -> u64 {
    let steps = level.saturating_sub(1) as f64;
    (XP_PER_LEVEL_SCALE * steps * steps).round().max(0.0) as u64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: u32,
    pub xp_into_level: u64,
    pub xp_for_next_level: u64,
    pub fraction: f64,
}

/// Position inside the current level, for progress bars.
pub fn level_progress(xp: u64) -> LevelProgress {
    let level = level_for(xp);
    if level >= MAX_LEVEL {
        return LevelProgress {
            level,
            xp_into_level: 0,
            xp_for_next_level: 0,
            fraction: 1.0,
        };
    }

    let floor = xp_threshold_for(level);
    let ceiling = xp_threshold_for(level + 1);
    let span = ceiling.saturating_sub(floor).max(1);
    let xp_into_level = xp.saturating_sub(floor);

    LevelProgress {
        level,
        xp_into_level,
        xp_for_next_level: ceiling.saturating_sub(xp),
        fraction: (xp_into_level as f64 / span as f64).clamp(0.0, 1.0),
    }
}
