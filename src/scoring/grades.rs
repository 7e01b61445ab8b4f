use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::normalize::{lenient_number, normalize_number, normalize_value};
use super::stage::{percentage, Criterion, StageConfig};
use crate::contestant::ContestantId;
use crate::error::EngineError;

/// Marks awarded for one question of one contestant's stage.
///
/// Field values may exceed the criterion maximum; only aggregation clamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeEntry {
    #[serde(default, deserialize_with = "lenient_question_number")]
    pub question_number: u32,
    #[serde(rename = "حفظ", alias = "memorization", default, deserialize_with = "lenient_number")]
    pub memorization: f64,
    #[serde(rename = "أداء", alias = "performance", default, deserialize_with = "lenient_number")]
    pub performance: f64,
    #[serde(rename = "تجويد", alias = "tajweed", default, deserialize_with = "lenient_number")]
    pub tajweed: f64,
}

fn lenient_question_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = normalize_value(&serde_json::Value::deserialize(deserializer)?);
    // 0 is never a valid question, so malformed rows fall out on load.
    Ok(if n >= 1.0 && n <= f64::from(u32::MAX) {
        n.round() as u32
    } else {
        0
    })
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

impl GradeEntry {
    pub fn new(question_number: u32, memorization: f64, performance: f64, tajweed: f64) -> Self {
        Self {
            question_number,
            memorization: finite_or_zero(memorization),
            performance: finite_or_zero(performance),
            tajweed: finite_or_zero(tajweed),
        }
    }

    pub fn zero(question_number: u32) -> Self {
        Self::new(question_number, 0.0, 0.0, 0.0)
    }

    pub fn score(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Memorization => self.memorization,
            Criterion::Performance => self.performance,
            Criterion::Tajweed => self.tajweed,
        }
    }
}

/// Aggregated stage score against its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunningTotal {
    pub total: f64,
    pub max: f64,
}

impl RunningTotal {
    pub fn percentage(&self) -> f64 {
        percentage(self.total, self.max)
    }
}

impl fmt::Display for RunningTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.total, self.max)
    }
}

/// All grade entries of one contestant, ordered by question number.
///
/// The set always covers exactly `1..=question_count`. Only recorded rows are
/// stored; questions nobody graded yet read back as zero entries.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeSet {
    contestant_id: ContestantId,
    question_count: u32,
    rows: BTreeMap<u32, GradeEntry>,
}

impl GradeSet {
    /// Build the grade set for a stage from whatever entries the store returned.
    ///
    /// Missing questions read as zero entries. For duplicated question
    /// numbers the first entry wins, and entries outside the stage are dropped.
    pub fn load<I>(contestant_id: ContestantId, existing: I, config: &StageConfig) -> Self
    where
        I: IntoIterator<Item = GradeEntry>,
    {
        let mut rows = BTreeMap::new();
        for entry in existing {
            if config.contains_question(entry.question_number) {
                rows.entry(entry.question_number).or_insert(entry);
            }
        }

        Self {
            contestant_id,
            question_count: config.question_count,
            rows,
        }
    }

    pub fn contestant_id(&self) -> &ContestantId {
        &self.contestant_id
    }

    /// Every question of the stage in order, zero-filled.
    pub fn entries(&self) -> impl Iterator<Item = GradeEntry> + '_ {
        (1..=self.question_count).map(move |q| self.entry_or_zero(q))
    }

    /// Rows actually recorded, in question order.
    pub fn recorded(&self) -> impl Iterator<Item = &GradeEntry> {
        self.rows.values()
    }

    pub fn entry(&self, question_number: u32) -> Option<GradeEntry> {
        self.contains(question_number)
            .then(|| self.entry_or_zero(question_number))
    }

    pub fn len(&self) -> usize {
        self.question_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.question_count == 0
    }

    fn contains(&self, question_number: u32) -> bool {
        (1..=self.question_count).contains(&question_number)
    }

    fn entry_or_zero(&self, question_number: u32) -> GradeEntry {
        self.rows
            .get(&question_number)
            .copied()
            .unwrap_or_else(|| GradeEntry::zero(question_number))
    }

    /// Overwrite the three marks of an existing question.
    pub fn set_entry(
        &mut self,
        question_number: u32,
        memorization: f64,
        performance: f64,
        tajweed: f64,
    ) -> Result<GradeEntry, EngineError> {
        if !self.contains(question_number) {
            return Err(EngineError::QuestionNotFound(question_number));
        }
        let entry = GradeEntry::new(question_number, memorization, performance, tajweed);
        self.rows.insert(question_number, entry);
        Ok(entry)
    }

    /// Like [`GradeSet::set_entry`], taking the marks as typed by a committee member.
    pub fn set_entry_from_text(
        &mut self,
        question_number: u32,
        memorization: &str,
        performance: &str,
        tajweed: &str,
    ) -> Result<GradeEntry, EngineError> {
        self.set_entry(
            question_number,
            normalize_number(memorization),
            normalize_number(performance),
            normalize_number(tajweed),
        )
    }

    /// Ungraded questions add nothing, so only recorded rows are summed.
    pub fn criterion_sum(&self, criterion: Criterion) -> f64 {
        self.rows.values().map(|e| e.score(criterion)).sum()
    }

    /// Stage score with every criterion clamped to its own stage ceiling, so
    /// over-scoring one criterion never borrows headroom from another.
    pub fn running_total(&self, config: &StageConfig) -> RunningTotal {
        let total = Criterion::ALL
            .iter()
            .filter(|c| config.is_scored(**c))
            .map(|c| self.criterion_sum(*c).min(config.stage_cap(*c)))
            .sum();

        RunningTotal {
            total,
            max: config.stage_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::compute_stage_config;

    fn id() -> ContestantId {
        ContestantId::from("P1")
    }

    #[test]
    fn test_load_fills_gaps_in_order() {
        let config = compute_stage_config(2.0, 10.0); // 4 questions
        let existing = vec![GradeEntry::new(3, 7.0, 1.0, 0.0), GradeEntry::new(1, 9.0, 0.5, 0.0)];
        let set = GradeSet::load(id(), existing, &config);

        let numbers: Vec<u32> = set.entries().map(|e| e.question_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(set.entry(2), Some(GradeEntry::zero(2)));
        assert_eq!(set.entry(3).map(|e| e.memorization), Some(7.0));
    }

    #[test]
    fn test_load_keeps_first_duplicate_and_drops_out_of_range() {
        let config = compute_stage_config(0.0, 10.0); // 2 questions
        let existing = vec![
            GradeEntry::new(1, 5.0, 1.0, 0.0),
            GradeEntry::new(1, 10.0, 1.0, 0.0),
            GradeEntry::new(7, 10.0, 1.0, 0.0),
            GradeEntry::new(0, 10.0, 1.0, 0.0),
        ];
        let set = GradeSet::load(id(), existing, &config);

        assert_eq!(set.len(), 2);
        assert_eq!(set.entry(1).map(|e| e.memorization), Some(5.0));
        assert!(set.entry(7).is_none());
    }

    #[test]
    fn test_load_is_idempotent() {
        let config = compute_stage_config(3.0, 14.0);
        let existing = vec![GradeEntry::new(2, 8.0, 1.0, 2.0), GradeEntry::new(5, 6.0, 0.0, 1.0)];
        let first = GradeSet::load(id(), existing.clone(), &config);
        let second = GradeSet::load(id(), existing, &config);

        assert_eq!(first, second);
        assert_eq!(first.running_total(&config), second.running_total(&config));
    }

    #[test]
    fn test_set_entry_overwrites_without_capping() {
        let config = compute_stage_config(0.0, 14.0);
        let mut set = GradeSet::load(id(), Vec::new(), &config);

        let entry = set.set_entry(2, 15.0, 1.0, 2.0).unwrap();
        assert_eq!(entry.memorization, 15.0);
        assert_eq!(set.entry(2).map(|e| e.memorization), Some(15.0));
    }

    #[test]
    fn test_set_entry_unknown_question() {
        let config = compute_stage_config(0.0, 14.0);
        let mut set = GradeSet::load(id(), Vec::new(), &config);

        let err = set.set_entry(3, 1.0, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, EngineError::QuestionNotFound(3)));
    }

    #[test]
    fn test_set_entry_from_text_normalizes() {
        let config = compute_stage_config(0.0, 14.0);
        let mut set = GradeSet::load(id(), Vec::new(), &config);

        let entry = set.set_entry_from_text(1, "9.5 ", "", "two").unwrap();
        assert_eq!(entry, GradeEntry::new(1, 9.5, 0.0, 0.0));
    }

    #[test]
    fn test_running_total_sums_criteria() {
        let config = compute_stage_config(0.0, 14.0); // 2 questions, max 26
        let existing = vec![GradeEntry::new(1, 9.0, 1.0, 2.0), GradeEntry::new(2, 7.0, 0.5, 1.0)];
        let set = GradeSet::load(id(), existing, &config);

        let total = set.running_total(&config);
        assert_eq!(total.total, 20.5);
        assert_eq!(total.max, 26.0);
        assert_eq!(total.to_string(), "20.5 / 26");
    }

    #[test]
    fn test_running_total_ignores_tajweed_when_ineligible() {
        let config = compute_stage_config(0.0, 10.0);
        let existing = vec![GradeEntry::new(1, 10.0, 1.0, 2.0), GradeEntry::new(2, 10.0, 1.0, 2.0)];
        let set = GradeSet::load(id(), existing, &config);

        assert_eq!(set.running_total(&config).total, 22.0);
    }

    #[test]
    fn test_running_total_clamps_each_criterion_independently() {
        let config = compute_stage_config(5.0, 13.0); // 10 questions, stage total 130
        let existing: Vec<GradeEntry> = (1..=10).map(|q| GradeEntry::new(q, 999.0, 0.0, 0.0)).collect();
        let set = GradeSet::load(id(), existing, &config);

        let total = set.running_total(&config);
        assert_eq!(total.total, 100.0);
        assert!(total.total <= config.stage_total);
    }

    #[test]
    fn test_running_total_never_exceeds_stage_total() {
        let config = compute_stage_config(12.0, 20.0);
        let existing: Vec<GradeEntry> = (1..=12).map(|q| GradeEntry::new(q, 999.0, 999.0, 999.0)).collect();
        let set = GradeSet::load(id(), existing, &config);

        let total = set.running_total(&config);
        assert_eq!(total.total, config.stage_total);
        assert_eq!(total.percentage(), 100.0);
    }

    #[test]
    fn test_huge_stage_is_not_materialized() {
        let config = compute_stage_config(1e9, 20.0);
        assert_eq!(config.question_count, 1_000_000_000);

        let existing = vec![
            GradeEntry::new(1, 10.0, 1.0, 2.0),
            GradeEntry::new(999_999_999, 4.0, 0.0, 1.0),
        ];
        let mut set = GradeSet::load(id(), existing, &config);

        assert_eq!(set.len(), 1_000_000_000);
        assert_eq!(set.recorded().count(), 2);
        assert_eq!(set.entry(500_000_000), Some(GradeEntry::zero(500_000_000)));
        assert_eq!(set.entry(1_000_000_001), None);
        assert_eq!(set.running_total(&config).total, 18.0);

        set.set_entry(1_000_000_000, 1.0, 0.0, 0.0).unwrap();
        assert_eq!(set.recorded().count(), 3);
        assert_eq!(set.entries().take(2).count(), 2);
    }

    #[test]
    fn test_grade_entry_deserializes_sheet_row() {
        let row = serde_json::json!({
            "participant_id": "P1",
            "question_number": "2",
            "حفظ": "8",
            "أداء": 1,
            "تجويد": ""
        });
        let entry: GradeEntry = serde_json::from_value(row).unwrap();
        assert_eq!(entry, GradeEntry::new(2, 8.0, 1.0, 0.0));
    }

    #[test]
    fn test_grade_entry_deserializes_english_aliases() {
        let row = serde_json::json!({
            "question_number": 1,
            "memorization": 4.5,
            "performance": 1
        });
        let entry: GradeEntry = serde_json::from_value(row).unwrap();
        assert_eq!(entry, GradeEntry::new(1, 4.5, 1.0, 0.0));
    }
}
