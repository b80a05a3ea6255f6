pub const PROGRESS: &str = "progress";
pub const META: &str = "meta";
