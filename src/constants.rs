/// 每道答对题目的基础分
pub const BASE_POINTS_PER_ANSWER: f64 = 10.0;

/// 连对指数系数的底数
pub const STREAK_GROWTH_RATE: f64 = 1.25;

/// 连对指数系数上限
pub const MAX_STREAK_EXPONENTIAL: f64 = 5.0;

/// 连对里程碑及其倍率 (streak, multiplier)
pub const STREAK_MILESTONES: &[(u32, f64)] = &[(5, 1.5), (10, 2.0), (20, 2.5), (50, 3.0)];

/// 每级经验曲线的缩放系数
pub const XP_PER_LEVEL_SCALE: f64 = 1_000_000.0;

/// 最高等级
pub const MAX_LEVEL: u32 = 999;

/// 每日目标：简单档奖励
pub const SIMPLE_GOAL_XP: u64 = 15;

/// 每日目标：中等档奖励
pub const MODERATE_GOAL_XP: u64 = 30;

/// 每日目标：进阶档奖励
pub const ADVANCED_GOAL_XP: u64 = 50;

/// 当日三个目标全部完成的额外奖励
pub const ALL_DAILY_GOALS_BONUS_XP: u64 = 25;

/// 默认档案 ID（单用户本地引擎）
pub const DEFAULT_PROFILE_ID: &str = "default";

/// 默认持久化防抖时长（毫秒）
pub const DEFAULT_PERSIST_DEBOUNCE_MS: u64 = 250;

/// 通知广播通道容量
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

/// 默认界面主题
pub const DEFAULT_THEME: &str = "system";
