use tracing::{info, warn};

use crate::contestant::ContestantId;
use crate::error::EngineError;
use crate::scoring::{GradeSet, RunningTotal};
use crate::store::GradeStore;

/// Outcome of locking a contestant's grades.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalization {
    pub contestant_id: ContestantId,
    pub total: RunningTotal,
}

/// Lock a contestant's grades and persist the stage total.
///
/// The total is computed from the grades currently held by the store. Fails
/// with [`EngineError::AlreadyFinalized`] for a submitted contestant, leaving
/// its recorded total untouched.
pub async fn finalize<S>(store: &S, contestant_id: &ContestantId) -> Result<Finalization, EngineError>
where
    S: GradeStore + ?Sized,
{
    let (contestants, entries) = tokio::try_join!(
        store.fetch_contestants(),
        store.fetch_grades(contestant_id)
    )?;

    let contestant = contestants
        .iter()
        .find(|c| &c.id == contestant_id)
        .ok_or_else(|| EngineError::ContestantNotFound(contestant_id.clone()))?;

    if contestant.submitted {
        warn!(contestant = %contestant_id, "finalize refused: already finalized");
        return Err(EngineError::AlreadyFinalized(contestant_id.clone()));
    }

    let config = contestant.stage_config();
    let grades = GradeSet::load(contestant_id.clone(), entries, &config);
    let total = grades.running_total(&config);

    store.finalize_contestant(contestant_id, total.total).await?;
    info!(contestant = %contestant_id, total = total.total, max = total.max, "contestant finalized");

    Ok(Finalization {
        contestant_id: contestant_id.clone(),
        total,
    })
}

/// Discard every grade of a contestant and reopen it for grading.
///
/// Resetting a contestant that is still in progress is harmless. Returns the
/// number of grade rows removed.
pub async fn reset<S>(store: &S, contestant_id: &ContestantId) -> Result<usize, EngineError>
where
    S: GradeStore + ?Sized,
{
    let contestants = store.fetch_contestants().await?;
    if !contestants.iter().any(|c| &c.id == contestant_id) {
        return Err(EngineError::ContestantNotFound(contestant_id.clone()));
    }

    let removed = store.reset_contestant_grades(contestant_id).await?;
    info!(contestant = %contestant_id, removed, "contestant grades reset");
    Ok(removed)
}
