pub mod achievements;
pub mod catalog;
pub mod clock;
pub mod daily_goals;
pub mod engine;
pub mod level;
pub mod persistence;
pub mod scoring;
pub mod service;
pub mod streak;
pub mod types;

pub use engine::ProgressStore;
pub use service::{ProgressChange, ProgressService};
pub use types::{EventOutcome, GoalAction, ProgressEvent, ProgressNotification, ProgressState};
