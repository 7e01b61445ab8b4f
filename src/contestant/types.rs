use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::scoring::normalize::{
    lenient_flag, lenient_number, lenient_optional_number, lenient_optional_text, lenient_text,
    normalize_number,
};
use crate::scoring::{compute_stage_config, percentage, StageConfig};

/// Store-assigned contestant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContestantId(String);

/// Committee identifier as written in the contestant sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CommitteeId(String);

macro_rules! text_id {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.trim().to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from(s.as_str())
            }
        }

        // Sheet cells may hold ids as numbers.
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                lenient_text(deserializer).map(Self)
            }
        }
    };
}

text_id!(ContestantId);
text_id!(CommitteeId);

/// Whether a contestant's grades are still open for editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStatus {
    InProgress,
    Finalized,
}

/// A competitor as stored in the contestant sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contestant {
    pub id: ContestantId,
    #[serde(rename = "الاسم الثلاثي", alias = "name", default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(rename = "العمر", alias = "age", default, deserialize_with = "lenient_number")]
    pub age: f64,
    #[serde(rename = "عدد الأجزاء", alias = "parts_count", default, deserialize_with = "lenient_number")]
    pub parts_count: f64,
    #[serde(rename = "أرقام الأجزاء", alias = "part_indices", default, deserialize_with = "lenient_text")]
    pub part_indices: String,
    #[serde(rename = "القسم التربوي", alias = "department", default, deserialize_with = "lenient_text")]
    pub department: String,
    #[serde(rename = "اللجنة", alias = "committee_id", default)]
    pub committee_id: CommitteeId,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub submitted: bool,
    #[serde(
        rename = "المجموع",
        alias = "total_score",
        default,
        deserialize_with = "lenient_optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_score: Option<f64>,
    #[serde(
        rename = "تقدير",
        alias = "grade",
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub grade: Option<String>,
    #[serde(
        rename = "الجائزة المالية",
        alias = "award",
        default,
        deserialize_with = "lenient_optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub award: Option<f64>,
    #[serde(
        rename = "timestamp",
        alias = "finalized_at",
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub finalized_at: Option<String>,
}

impl Contestant {
    /// Scoring shape for the contestant's current parts and age.
    pub fn stage_config(&self) -> StageConfig {
        compute_stage_config(self.parts_count, self.age)
    }

    pub fn status(&self) -> EvaluationStatus {
        if self.submitted {
            EvaluationStatus::Finalized
        } else {
            EvaluationStatus::InProgress
        }
    }

    /// Final score as a share of the stage total (0 before finalization).
    pub fn percentage(&self) -> f64 {
        percentage(self.total_score.unwrap_or(0.0), self.stage_config().stage_total)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "(unnamed)"
        } else {
            &self.name
        }
    }
}

/// A grading committee. The admin pseudo-committee holds the admin password.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Committee {
    #[serde(rename = "Committee", alias = "committee_id")]
    pub id: CommitteeId,
    #[serde(rename = "Password", alias = "password_hash", default, deserialize_with = "lenient_text")]
    pub password_hash: String,
}

impl Committee {
    pub fn is_admin(&self) -> bool {
        self.id.as_str().eq_ignore_ascii_case("admin")
    }
}

impl fmt::Debug for Committee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Committee")
            .field("id", &self.id)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// The Quran has 30 parts; larger counts are data-entry mistakes.
pub const MAX_PARTS_COUNT: f64 = 30.0;

fn check_parts_count(parts: f64) -> Result<(), String> {
    if (0.0..=MAX_PARTS_COUNT).contains(&parts) {
        Ok(())
    } else {
        Err(format!(
            "parts count must be between 0 and {}, got {}",
            MAX_PARTS_COUNT, parts
        ))
    }
}

/// Fields an administrator supplies when registering a contestant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewContestant {
    #[serde(rename = "الاسم الثلاثي")]
    pub name: String,
    #[serde(rename = "العمر")]
    pub age: f64,
    #[serde(rename = "القسم التربوي")]
    pub department: String,
    #[serde(rename = "عدد الأجزاء")]
    pub parts_count: f64,
    #[serde(rename = "أرقام الأجزاء")]
    pub part_indices: String,
    #[serde(rename = "اللجنة")]
    pub committee_id: CommitteeId,
}

impl NewContestant {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("contestant name is required".to_string());
        }
        check_parts_count(self.parts_count)
    }

    pub fn into_contestant(self, id: ContestantId) -> Contestant {
        Contestant {
            id,
            name: self.name,
            age: self.age,
            parts_count: self.parts_count,
            part_indices: self.part_indices,
            department: self.department,
            committee_id: self.committee_id,
            submitted: false,
            total_score: None,
            grade: None,
            award: None,
            finalized_at: None,
        }
    }
}

/// Contestant fields an administrator may edit after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContestantField {
    Committee,
    Name,
    Age,
    PartsCount,
    Department,
    PartIndices,
}

impl ContestantField {
    /// Column header used by the contestant sheet.
    pub fn sheet_key(&self) -> &'static str {
        match self {
            ContestantField::Committee => "اللجنة",
            ContestantField::Name => "الاسم الثلاثي",
            ContestantField::Age => "العمر",
            ContestantField::PartsCount => "عدد الأجزاء",
            ContestantField::Department => "القسم التربوي",
            ContestantField::PartIndices => "أرقام الأجزاء",
        }
    }

    /// Reject values the field can never hold.
    pub fn validate(&self, value: &str) -> Result<(), String> {
        match self {
            ContestantField::PartsCount => check_parts_count(normalize_number(value)),
            ContestantField::Name if value.trim().is_empty() => {
                Err("contestant name is required".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Write `value` into the matching field, normalizing numeric fields.
    pub fn apply(&self, contestant: &mut Contestant, value: &str) -> Result<(), String> {
        self.validate(value)?;
        let value = value.trim();
        match self {
            ContestantField::Committee => contestant.committee_id = CommitteeId::from(value),
            ContestantField::Name => contestant.name = value.to_string(),
            ContestantField::Age => contestant.age = normalize_number(value),
            ContestantField::PartsCount => contestant.parts_count = normalize_number(value),
            ContestantField::Department => contestant.department = value.to_string(),
            ContestantField::PartIndices => contestant.part_indices = value.to_string(),
        }
        Ok(())
    }
}

impl FromStr for ContestantField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "committee" => Ok(ContestantField::Committee),
            "name" => Ok(ContestantField::Name),
            "age" => Ok(ContestantField::Age),
            "parts" | "parts-count" => Ok(ContestantField::PartsCount),
            "department" => Ok(ContestantField::Department),
            "part-indices" => Ok(ContestantField::PartIndices),
            other => Err(format!(
                "unknown field '{}' (expected committee, name, age, parts, department, part-indices)",
                other
            )),
        }
    }
}
