//! Persistence boundary for contestants, committees and grades.
//!
//! The evaluation engine only talks to a [`GradeStore`]. [`RemoteStore`] speaks
//! to the competition's spreadsheet web app; [`LocalStore`] keeps everything
//! in process, optionally mirrored to a JSON file.

pub mod local;
pub mod remote;

pub use local::LocalStore;
pub use remote::RemoteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::contestant::{Committee, Contestant, ContestantField, ContestantId, NewContestant};
use crate::scoring::GradeEntry;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("store rejected the request: {0}")]
    Rejected(String),

    #[error("invalid response from store: {0}")]
    InvalidResponse(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("unknown contestant {0}")]
    UnknownContestant(ContestantId),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Request/response operations offered by the persistence collaborator.
///
/// Every call may fail or be slow; callers must not change local state until
/// a call has returned successfully.
#[async_trait]
pub trait GradeStore: Send + Sync {
    async fn fetch_committees(&self) -> StoreResult<Vec<Committee>>;

    async fn fetch_contestants(&self) -> StoreResult<Vec<Contestant>>;

    async fn fetch_grades(&self, contestant_id: &ContestantId) -> StoreResult<Vec<GradeEntry>>;

    /// Upsert keyed by (contestant, question number).
    async fn submit_grade(&self, contestant_id: &ContestantId, entry: &GradeEntry) -> StoreResult<()>;

    /// Persist the stage total and mark the contestant submitted.
    async fn finalize_contestant(&self, contestant_id: &ContestantId, total: f64) -> StoreResult<()>;

    /// Delete every grade of the contestant and clear its submission.
    /// Returns how many grade rows were removed.
    async fn reset_contestant_grades(&self, contestant_id: &ContestantId) -> StoreResult<usize>;

    async fn add_contestant(&self, fields: NewContestant) -> StoreResult<ContestantId>;

    async fn update_contestant(
        &self,
        contestant_id: &ContestantId,
        field: ContestantField,
        value: &str,
    ) -> StoreResult<()>;
}
