pub mod grades;
pub mod normalize;
pub mod stage;

pub use grades::{GradeEntry, GradeSet, RunningTotal};
pub use normalize::normalize_number;
pub use stage::{compute_stage_config, percentage, Criterion, StageConfig};
