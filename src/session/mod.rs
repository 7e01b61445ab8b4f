pub mod lifecycle;
pub mod navigation;

pub use lifecycle::{finalize, reset, Finalization};
pub use navigation::{EvaluationSession, SessionState};
