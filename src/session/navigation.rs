use tracing::{debug, info};

use super::lifecycle::{self, Finalization};
use crate::contestant::{committee_roster, CommitteeId, Contestant, ContestantId};
use crate::error::EngineError;
use crate::scoring::{normalize_number, GradeEntry, GradeSet, RunningTotal, StageConfig};
use crate::store::GradeStore;

/// Where a committee session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No roster loaded yet.
    Idle,
    /// Roster loaded (possibly empty), no contestant selected.
    Browsing,
    /// A contestant and one of its questions are selected.
    Grading,
}

#[derive(Debug, Clone)]
struct Grading {
    index: usize,
    config: StageConfig,
    grades: GradeSet,
    question: u32,
}

/// One committee's grading session: its roster of contestants still to grade,
/// the selected contestant and the selected question.
///
/// Build one per committee login and drop it on logout. Every operation that
/// talks to the store finishes its fetches before touching the session, so a
/// failed call leaves the session exactly as it was.
#[derive(Debug, Clone)]
pub struct EvaluationSession {
    committee_id: CommitteeId,
    contestants: Vec<Contestant>,
    roster: Option<Vec<Contestant>>,
    grading: Option<Grading>,
}

impl EvaluationSession {
    pub fn new(committee_id: CommitteeId) -> Self {
        Self {
            committee_id,
            contestants: Vec::new(),
            roster: None,
            grading: None,
        }
    }

    pub fn committee_id(&self) -> &CommitteeId {
        &self.committee_id
    }

    pub fn state(&self) -> SessionState {
        match (&self.roster, &self.grading) {
            (None, _) => SessionState::Idle,
            (Some(_), None) => SessionState::Browsing,
            (Some(_), Some(_)) => SessionState::Grading,
        }
    }

    /// Contestants this committee can still grade, in store order.
    pub fn roster(&self) -> &[Contestant] {
        self.roster.as_deref().unwrap_or_default()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.grading.as_ref().map(|g| g.index)
    }

    pub fn current_contestant(&self) -> Option<&Contestant> {
        let index = self.current_index()?;
        self.roster().get(index)
    }

    pub fn current_question(&self) -> Option<u32> {
        self.grading.as_ref().map(|g| g.question)
    }

    pub fn stage_config(&self) -> Option<&StageConfig> {
        self.grading.as_ref().map(|g| &g.config)
    }

    pub fn grades(&self) -> Option<&GradeSet> {
        self.grading.as_ref().map(|g| &g.grades)
    }

    pub fn current_entry(&self) -> Option<GradeEntry> {
        let grading = self.grading.as_ref()?;
        grading.grades.entry(grading.question)
    }

    pub fn running_total(&self) -> Option<RunningTotal> {
        self.grading
            .as_ref()
            .map(|g| g.grades.running_total(&g.config))
    }

    /// Fetch all contestants and keep this committee's unsubmitted ones.
    /// Any previous selection is cleared. Returns the roster size.
    pub async fn load_roster<S>(&mut self, store: &S) -> Result<usize, EngineError>
    where
        S: GradeStore + ?Sized,
    {
        let contestants = store.fetch_contestants().await?;
        Ok(self.load_roster_from(contestants))
    }

    /// Same as [`EvaluationSession::load_roster`] over already fetched contestants.
    pub fn load_roster_from(&mut self, contestants: Vec<Contestant>) -> usize {
        let roster = committee_roster(&contestants, &self.committee_id);
        info!(
            committee = %self.committee_id,
            roster = roster.len(),
            "roster loaded"
        );

        self.contestants = contestants;
        self.roster = Some(roster);
        self.grading = None;
        self.roster().len()
    }

    /// Select a roster contestant, rebuild its stage and grades, and go to question 1.
    pub async fn select_contestant<S>(&mut self, store: &S, contestant_id: &ContestantId) -> Result<(), EngineError>
    where
        S: GradeStore + ?Sized,
    {
        let index = self
            .roster()
            .iter()
            .position(|c| &c.id == contestant_id)
            .ok_or_else(|| EngineError::ContestantNotFound(contestant_id.clone()))?;
        self.select_index(store, index).await
    }

    /// Move to the next roster contestant. Returns `false` at the end of the roster.
    pub async fn next_contestant<S>(&mut self, store: &S) -> Result<bool, EngineError>
    where
        S: GradeStore + ?Sized,
    {
        let index = self.current_index().ok_or(EngineError::NoContestantSelected)?;
        if index + 1 >= self.roster().len() {
            return Ok(false);
        }
        self.select_index(store, index + 1).await?;
        Ok(true)
    }

    /// Move to the previous roster contestant. Returns `false` at the start of the roster.
    pub async fn previous_contestant<S>(&mut self, store: &S) -> Result<bool, EngineError>
    where
        S: GradeStore + ?Sized,
    {
        let index = self.current_index().ok_or(EngineError::NoContestantSelected)?;
        if index == 0 {
            return Ok(false);
        }
        self.select_index(store, index - 1).await?;
        Ok(true)
    }

    /// Advance one question. Returns `false` on the last question or without a selection.
    pub fn next_question(&mut self) -> bool {
        match self.grading.as_mut() {
            Some(g) if g.question < g.config.question_count => {
                g.question += 1;
                true
            }
            _ => false,
        }
    }

    /// Go back one question. Returns `false` on question 1 or without a selection.
    pub fn previous_question(&mut self) -> bool {
        match self.grading.as_mut() {
            Some(g) if g.question > 1 => {
                g.question -= 1;
                true
            }
            _ => false,
        }
    }

    /// Jump straight to a question of the stage. Returns `false` when it is out
    /// of range or nothing is selected.
    pub fn go_to_question(&mut self, question: u32) -> bool {
        match self.grading.as_mut() {
            Some(g) if (1..=g.config.question_count).contains(&question) => {
                g.question = question;
                true
            }
            _ => false,
        }
    }

    /// Re-fetch contestants and re-filter the roster.
    ///
    /// A selected contestant that left the roster (finalized, moved to another
    /// committee) is deselected. One whose parts or age changed gets its stage
    /// and grades rebuilt from question 1.
    pub async fn refresh_roster<S>(&mut self, store: &S) -> Result<usize, EngineError>
    where
        S: GradeStore + ?Sized,
    {
        let contestants = store.fetch_contestants().await?;
        let roster = committee_roster(&contestants, &self.committee_id);

        let retained = self.grading.as_ref().and_then(|g| {
            roster
                .iter()
                .position(|c| c.id == *g.grades.contestant_id())
                .map(|index| (g, index))
        });

        let grading = match retained {
            None => None,
            Some((g, index)) if roster[index].stage_config() == g.config => Some(Grading {
                index,
                ..g.clone()
            }),
            Some((_, index)) => Some(load_grading(store, &roster[index], index).await?),
        };

        debug!(
            committee = %self.committee_id,
            roster = roster.len(),
            selected = grading.is_some(),
            "roster refreshed"
        );
        self.contestants = contestants;
        self.roster = Some(roster);
        self.grading = grading;
        Ok(self.roster().len())
    }

    /// Persist marks for the current question, then apply them to the grade set.
    pub async fn record_grade<S>(
        &mut self,
        store: &S,
        memorization: f64,
        performance: f64,
        tajweed: f64,
    ) -> Result<GradeEntry, EngineError>
    where
        S: GradeStore + ?Sized,
    {
        let grading = self.grading.as_ref().ok_or(EngineError::NoContestantSelected)?;
        let entry = GradeEntry::new(grading.question, memorization, performance, tajweed);
        store.submit_grade(grading.grades.contestant_id(), &entry).await?;

        let grading = self.grading.as_mut().ok_or(EngineError::NoContestantSelected)?;
        let entry = grading.grades.set_entry(
            entry.question_number,
            entry.memorization,
            entry.performance,
            entry.tajweed,
        )?;
        debug!(
            contestant = %grading.grades.contestant_id(),
            question = entry.question_number,
            "grade recorded"
        );
        Ok(entry)
    }

    /// [`EvaluationSession::record_grade`] for raw text input; anything that is
    /// not a number counts as 0.
    pub async fn record_grade_from_text<S>(
        &mut self,
        store: &S,
        memorization: &str,
        performance: &str,
        tajweed: &str,
    ) -> Result<GradeEntry, EngineError>
    where
        S: GradeStore + ?Sized,
    {
        self.record_grade(
            store,
            normalize_number(memorization),
            normalize_number(performance),
            normalize_number(tajweed),
        )
        .await
    }

    /// Finalize the selected contestant. On success it leaves the roster and
    /// the session returns to browsing.
    pub async fn finalize_current<S>(&mut self, store: &S) -> Result<Finalization, EngineError>
    where
        S: GradeStore + ?Sized,
    {
        let contestant_id = self
            .grading
            .as_ref()
            .map(|g| g.grades.contestant_id().clone())
            .ok_or(EngineError::NoContestantSelected)?;

        let outcome = lifecycle::finalize(store, &contestant_id).await?;

        if let Some(c) = self.contestants.iter_mut().find(|c| c.id == contestant_id) {
            c.submitted = true;
            c.total_score = Some(outcome.total.total);
        }
        self.roster = Some(committee_roster(&self.contestants, &self.committee_id));
        self.grading = None;
        Ok(outcome)
    }

    async fn select_index<S>(&mut self, store: &S, index: usize) -> Result<(), EngineError>
    where
        S: GradeStore + ?Sized,
    {
        let contestant = self
            .roster()
            .get(index)
            .cloned()
            .ok_or(EngineError::NoContestantSelected)?;
        let grading = load_grading(store, &contestant, index).await?;

        debug!(
            contestant = %contestant.id,
            questions = grading.config.question_count,
            "contestant selected"
        );
        self.grading = Some(grading);
        Ok(())
    }
}

async fn load_grading<S>(store: &S, contestant: &Contestant, index: usize) -> Result<Grading, EngineError>
where
    S: GradeStore + ?Sized,
{
    let config = contestant.stage_config();
    let entries = store.fetch_grades(&contestant.id).await?;
    Ok(Grading {
        index,
        config,
        grades: GradeSet::load(contestant.id.clone(), entries, &config),
        question: 1,
    })
}
