use serde::Serialize;
use std::fmt;

/// Age above which the tajweed criterion is scored.
pub const TAJWEED_MIN_AGE_EXCLUSIVE: f64 = 12.0;

pub const MEMORIZATION_WEIGHT: f64 = 10.0;
pub const PERFORMANCE_WEIGHT: f64 = 1.0;
pub const TAJWEED_WEIGHT: f64 = 2.0;

/// One of the three scored dimensions of a recitation answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Memorization,
    Performance,
    Tajweed,
}

impl Criterion {
    pub const ALL: [Criterion; 3] = [
        Criterion::Memorization,
        Criterion::Performance,
        Criterion::Tajweed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Criterion::Memorization => "Memorization",
            Criterion::Performance => "Performance",
            Criterion::Tajweed => "Tajweed",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scoring shape of one contestant's stage.
///
/// Derived from the contestant's memorized parts and age, never persisted.
/// Recompute it whenever either input may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageConfig {
    pub question_count: u32,
    pub max_memorization: f64,
    pub max_performance: f64,
    pub max_tajweed: f64,
    pub max_per_question: f64,
    pub stage_total: f64,
    pub tajweed_enabled: bool,
}

impl StageConfig {
    /// Maximum mark a single question can award for `criterion`.
    pub fn max_for(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Memorization => self.max_memorization,
            Criterion::Performance => self.max_performance,
            Criterion::Tajweed => self.max_tajweed,
        }
    }

    /// Whether `criterion` contributes to the stage total.
    pub fn is_scored(&self, criterion: Criterion) -> bool {
        criterion != Criterion::Tajweed || self.tajweed_enabled
    }

    /// Ceiling for `criterion` summed over the whole stage.
    pub fn stage_cap(&self, criterion: Criterion) -> f64 {
        self.max_for(criterion) * f64::from(self.question_count)
    }

    pub fn contains_question(&self, question_number: u32) -> bool {
        (1..=self.question_count).contains(&question_number)
    }
}

/// Derive the scoring configuration for a contestant.
///
/// Small loads (up to one part) get a two-question exam, up to ten parts get
/// two questions per part, beyond that one question per part.
pub fn compute_stage_config(parts_count: f64, age: f64) -> StageConfig {
    let parts = if parts_count.is_finite() { parts_count } else { 0.0 };
    let age = if age.is_finite() { age } else { 0.0 };
    let tajweed_enabled = age > TAJWEED_MIN_AGE_EXCLUSIVE;

    let question_count = if parts <= 1.0 {
        2
    } else if parts <= 10.0 {
        (parts * 2.0).round() as u32
    } else {
        parts.round() as u32
    };

    let max_tajweed = if tajweed_enabled { TAJWEED_WEIGHT } else { 0.0 };
    let max_per_question = MEMORIZATION_WEIGHT + PERFORMANCE_WEIGHT + max_tajweed;

    StageConfig {
        question_count,
        max_memorization: MEMORIZATION_WEIGHT,
        max_performance: PERFORMANCE_WEIGHT,
        max_tajweed,
        max_per_question,
        stage_total: max_per_question * f64::from(question_count),
        tajweed_enabled,
    }
}

/// Share of the stage total, rounded to two decimals. Zero when the stage has no total.
pub fn percentage(total: f64, stage_total: f64) -> f64 {
    if stage_total == 0.0 {
        return 0.0;
    }
    (total / stage_total * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_stage_without_tajweed() {
        let config = compute_stage_config(0.0, 10.0);
        assert_eq!(
            config,
            StageConfig {
                question_count: 2,
                max_memorization: 10.0,
                max_performance: 1.0,
                max_tajweed: 0.0,
                max_per_question: 11.0,
                stage_total: 22.0,
                tajweed_enabled: false,
            }
        );
    }

    #[test]
    fn test_moderate_load_two_questions_per_part() {
        let config = compute_stage_config(5.0, 13.0);
        assert_eq!(config.question_count, 10);
        assert!(config.tajweed_enabled);
        assert_eq!(config.max_per_question, 13.0);
        assert_eq!(config.stage_total, 130.0);
    }

    #[test]
    fn test_large_load_one_question_per_part() {
        let config = compute_stage_config(15.0, 13.0);
        assert_eq!(config.question_count, 15);
        assert_eq!(config.stage_total, 195.0);
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(compute_stage_config(1.0, 0.0).question_count, 2);
        assert_eq!(compute_stage_config(1.5, 0.0).question_count, 3);
        assert_eq!(compute_stage_config(10.0, 0.0).question_count, 20);
        assert_eq!(compute_stage_config(10.5, 0.0).question_count, 11);
        assert_eq!(compute_stage_config(30.0, 0.0).question_count, 30);
    }

    #[test]
    fn test_age_threshold_is_exclusive() {
        assert!(!compute_stage_config(2.0, 12.0).tajweed_enabled);
        assert!(compute_stage_config(2.0, 12.5).tajweed_enabled);
    }

    #[test]
    fn test_negative_and_non_finite_inputs() {
        assert_eq!(compute_stage_config(-4.0, -1.0).question_count, 2);
        let config = compute_stage_config(f64::NAN, f64::INFINITY);
        assert_eq!(config.question_count, 2);
        assert!(!config.tajweed_enabled);
    }

    #[test]
    fn test_stage_total_invariant_holds_across_inputs() {
        let mut parts = -2.0;
        while parts <= 40.0 {
            for age in [0.0, 12.0, 13.0, 40.0] {
                let config = compute_stage_config(parts, age);
                assert!(config.question_count >= 2, "parts={parts}");
                assert_eq!(
                    config.stage_total,
                    config.max_per_question * f64::from(config.question_count)
                );
            }
            parts += 0.25;
        }
    }

    #[test]
    fn test_criterion_lookup() {
        let config = compute_stage_config(3.0, 14.0);
        assert_eq!(config.max_for(Criterion::Memorization), 10.0);
        assert_eq!(config.max_for(Criterion::Performance), 1.0);
        assert_eq!(config.max_for(Criterion::Tajweed), 2.0);
        assert_eq!(config.stage_cap(Criterion::Memorization), 60.0);
        assert!(config.is_scored(Criterion::Tajweed));
        assert!(!compute_stage_config(3.0, 9.0).is_scored(Criterion::Tajweed));
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(11.0, 22.0), 50.0);
        assert_eq!(percentage(1.0, 3.0), 33.33);
        assert_eq!(percentage(5.0, 0.0), 0.0);
    }
}
