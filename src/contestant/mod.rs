pub mod filter;
pub mod types;

pub use filter::{committee_roster, filter_results, grading_committees, StatusFilter};
pub use types::{
    Committee, CommitteeId, Contestant, ContestantField, ContestantId, EvaluationStatus,
    NewContestant, MAX_PARTS_COUNT,
};
