use thiserror::Error;

use crate::contestant::ContestantId;
use crate::store::StoreError;

/// Failures surfaced by navigation and lifecycle operations.
///
/// Malformed numeric input is never an error; it is normalized to 0.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("contestant {0} not found")]
    ContestantNotFound(ContestantId),

    #[error("question {0} is not part of the current stage")]
    QuestionNotFound(u32),

    #[error("no contestant is selected")]
    NoContestantSelected,

    #[error("contestant {0} has already been finalized")]
    AlreadyFinalized(ContestantId),

    #[error("store failure: {0}")]
    Collaborator(#[from] StoreError),
}
