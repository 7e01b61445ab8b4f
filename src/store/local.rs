use anyhow::{Context, Result};
use async_trait::async_trait;
use atomic_write_file::AtomicWriteFile;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::{GradeStore, StoreError, StoreResult};
use crate::contestant::{Committee, Contestant, ContestantField, ContestantId, NewContestant};
use crate::scoring::GradeEntry;

const STORE_VERSION: u32 = 1;

/// Everything a [`LocalStore`] holds, in its on-disk shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreData {
    pub version: u32,
    #[serde(default)]
    pub committees: Vec<Committee>,
    #[serde(default)]
    pub contestants: Vec<Contestant>,
    /// Grade rows keyed by contestant id.
    #[serde(default)]
    pub grades: BTreeMap<String, Vec<GradeEntry>>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreData {
    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            committees: Vec::new(),
            contestants: Vec::new(),
            grades: BTreeMap::new(),
        }
    }

    fn contestant_mut(&mut self, id: &ContestantId) -> StoreResult<&mut Contestant> {
        self.contestants
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::UnknownContestant(id.clone()))
    }

    fn next_contestant_id(&self) -> ContestantId {
        let mut n = self.contestants.len() + 1;
        loop {
            let candidate = ContestantId::from(format!("P{:04}", n));
            if !self.contestants.iter().any(|c| c.id == candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Load store data from a JSON file.
///
/// A missing file yields an empty store; an unsupported version is an error.
pub fn load_store_data(path: &Path) -> Result<StoreData> {
    if !path.exists() {
        return Ok(StoreData::new());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open store file at {}", path.display()))?;

    let data: StoreData = serde_json::from_reader(file).context("Failed to load store data")?;

    if data.version != STORE_VERSION {
        anyhow::bail!("Unsupported store file version: {}", data.version);
    }

    Ok(data)
}

/// Save store data to a JSON file atomically, creating parent directories.
pub fn save_store_data(path: &Path, data: &StoreData) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, data).context("Failed to serialize store data")?;

    file.commit().context("Failed to save store data")?;

    Ok(())
}

/// In-process store, optionally mirrored to a JSON file.
///
/// Each write is applied to a copy, persisted, and only then made visible, so
/// a failed save leaves the store unchanged.
pub struct LocalStore {
    data: Mutex<StoreData>,
    path: Option<PathBuf>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self::with_data(StoreData::new())
    }

    pub fn with_data(data: StoreData) -> Self {
        Self {
            data: Mutex::new(data),
            path: None,
        }
    }

    /// Open a file-backed store, starting empty if the file does not exist yet.
    pub fn open(path: PathBuf) -> Result<Self> {
        let data = load_store_data(&path)?;
        debug!(
            path = %path.display(),
            contestants = data.contestants.len(),
            "opened local store"
        );
        Ok(Self {
            data: Mutex::new(data),
            path: Some(path),
        })
    }

    fn read<T>(&self, f: impl FnOnce(&StoreData) -> T) -> StoreResult<T> {
        let guard = self
            .data
            .lock()
            .map_err(|_| StoreError::Storage("store lock poisoned".to_string()))?;
        Ok(f(&guard))
    }

    fn transact<T>(&self, f: impl FnOnce(&mut StoreData) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| StoreError::Storage("store lock poisoned".to_string()))?;

        let mut working = guard.clone();
        let result = f(&mut working)?;

        if let Some(path) = &self.path {
            save_store_data(path, &working).map_err(|e| StoreError::Storage(format!("{:#}", e)))?;
        }

        *guard = working;
        Ok(result)
    }
}

#[async_trait]
impl GradeStore for LocalStore {
    async fn fetch_committees(&self) -> StoreResult<Vec<Committee>> {
        self.read(|data| data.committees.clone())
    }

    async fn fetch_contestants(&self) -> StoreResult<Vec<Contestant>> {
        self.read(|data| data.contestants.clone())
    }

    async fn fetch_grades(&self, contestant_id: &ContestantId) -> StoreResult<Vec<GradeEntry>> {
        self.read(|data| {
            data.grades
                .get(contestant_id.as_str())
                .cloned()
                .unwrap_or_default()
        })
    }

    async fn submit_grade(&self, contestant_id: &ContestantId, entry: &GradeEntry) -> StoreResult<()> {
        self.transact(|data| {
            data.contestant_mut(contestant_id)?;
            let rows = data.grades.entry(contestant_id.to_string()).or_default();
            match rows
                .iter_mut()
                .find(|row| row.question_number == entry.question_number)
            {
                Some(row) => *row = *entry,
                None => rows.push(*entry),
            }
            Ok(())
        })
    }

    async fn finalize_contestant(&self, contestant_id: &ContestantId, total: f64) -> StoreResult<()> {
        self.transact(|data| {
            let contestant = data.contestant_mut(contestant_id)?;
            if contestant.submitted {
                return Err(StoreError::Rejected(format!(
                    "contestant {} is already submitted",
                    contestant_id
                )));
            }
            contestant.submitted = true;
            contestant.total_score = Some(total);
            contestant.finalized_at = Some(Utc::now().to_rfc3339());
            Ok(())
        })
    }

    async fn reset_contestant_grades(&self, contestant_id: &ContestantId) -> StoreResult<usize> {
        self.transact(|data| {
            let contestant = data.contestant_mut(contestant_id)?;
            contestant.submitted = false;
            contestant.total_score = None;
            contestant.grade = None;
            contestant.award = None;
            contestant.finalized_at = None;

            Ok(data
                .grades
                .remove(contestant_id.as_str())
                .map_or(0, |rows| rows.len()))
        })
    }

    async fn add_contestant(&self, fields: NewContestant) -> StoreResult<ContestantId> {
        fields.validate().map_err(StoreError::Rejected)?;
        self.transact(|data| {
            let id = data.next_contestant_id();
            data.contestants.push(fields.into_contestant(id.clone()));
            Ok(id)
        })
    }

    async fn update_contestant(
        &self,
        contestant_id: &ContestantId,
        field: ContestantField,
        value: &str,
    ) -> StoreResult<()> {
        self.transact(|data| {
            field
                .apply(data.contestant_mut(contestant_id)?, value)
                .map_err(StoreError::Rejected)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contestant::CommitteeId;
    use std::env;

    fn new_contestant(name: &str, committee: &str) -> NewContestant {
        NewContestant {
            name: name.to_string(),
            age: 14.0,
            department: String::new(),
            parts_count: 2.0,
            part_indices: "29,30".to_string(),
            committee_id: CommitteeId::from(committee),
        }
    }

    #[tokio::test]
    async fn test_add_assigns_sequential_ids() {
        let store = LocalStore::in_memory();
        let first = store.add_contestant(new_contestant("A", "1")).await.unwrap();
        let second = store.add_contestant(new_contestant("B", "1")).await.unwrap();

        assert_eq!(first.as_str(), "P0001");
        assert_eq!(second.as_str(), "P0002");
        assert_eq!(store.fetch_contestants().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_requires_name() {
        let store = LocalStore::in_memory();
        let err = store.add_contestant(new_contestant("  ", "1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_parts_count_above_thirty_rejected() {
        let store = LocalStore::in_memory();
        let mut fields = new_contestant("A", "1");
        fields.parts_count = 1e9;
        let err = store.add_contestant(fields).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));

        let id = store.add_contestant(new_contestant("B", "1")).await.unwrap();
        let err = store
            .update_contestant(&id, ContestantField::PartsCount, "1000000000")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert_eq!(store.fetch_contestants().await.unwrap()[0].parts_count, 2.0);
    }

    #[tokio::test]
    async fn test_submit_grade_upserts_by_question() {
        let store = LocalStore::in_memory();
        let id = store.add_contestant(new_contestant("A", "1")).await.unwrap();

        store.submit_grade(&id, &GradeEntry::new(1, 5.0, 1.0, 0.0)).await.unwrap();
        store.submit_grade(&id, &GradeEntry::new(1, 8.0, 1.0, 2.0)).await.unwrap();
        store.submit_grade(&id, &GradeEntry::new(2, 3.0, 0.0, 0.0)).await.unwrap();

        let grades = store.fetch_grades(&id).await.unwrap();
        assert_eq!(grades.len(), 2);
        assert_eq!(grades[0], GradeEntry::new(1, 8.0, 1.0, 2.0));
    }

    #[tokio::test]
    async fn test_submit_grade_unknown_contestant() {
        let store = LocalStore::in_memory();
        let err = store
            .submit_grade(&ContestantId::from("nope"), &GradeEntry::zero(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownContestant(_)));
    }

    #[tokio::test]
    async fn test_finalize_then_reset() {
        let store = LocalStore::in_memory();
        let id = store.add_contestant(new_contestant("A", "1")).await.unwrap();
        store.submit_grade(&id, &GradeEntry::new(1, 5.0, 1.0, 0.0)).await.unwrap();

        store.finalize_contestant(&id, 6.0).await.unwrap();
        let contestant = store.fetch_contestants().await.unwrap().remove(0);
        assert!(contestant.submitted);
        assert_eq!(contestant.total_score, Some(6.0));
        assert!(contestant.finalized_at.is_some());

        assert!(store.finalize_contestant(&id, 7.0).await.is_err());

        assert_eq!(store.reset_contestant_grades(&id).await.unwrap(), 1);
        let contestant = store.fetch_contestants().await.unwrap().remove(0);
        assert!(!contestant.submitted);
        assert_eq!(contestant.total_score, None);
        assert!(store.fetch_grades(&id).await.unwrap().is_empty());

        assert_eq!(store.reset_contestant_grades(&id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_contestant_field() {
        let store = LocalStore::in_memory();
        let id = store.add_contestant(new_contestant("A", "1")).await.unwrap();

        store
            .update_contestant(&id, ContestantField::Committee, "2")
            .await
            .unwrap();
        store
            .update_contestant(&id, ContestantField::Age, "eleven 11")
            .await
            .unwrap();

        let contestant = store.fetch_contestants().await.unwrap().remove(0);
        assert_eq!(contestant.committee_id, CommitteeId::from("2"));
        assert_eq!(contestant.age, 11.0);
    }

    #[tokio::test]
    async fn test_seeded_committees() {
        let mut data = StoreData::new();
        data.committees = serde_json::from_value(serde_json::json!([
            { "Committee": "admin", "Password": "x" },
            { "Committee": 1, "Password": "y" }
        ]))
        .unwrap();
        let store = LocalStore::with_data(data);

        let committees = store.fetch_committees().await.unwrap();
        assert_eq!(committees.len(), 2);
        assert!(committees[0].is_admin());
    }

    #[test]
    fn test_load_missing_file_returns_empty() {
        let temp_path = env::temp_dir().join("recitation_judge_test_missing.json");
        let _ = std::fs::remove_file(&temp_path);

        let data = load_store_data(&temp_path).unwrap();
        assert_eq!(data.version, 1);
        assert!(data.contestants.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persists_writes() {
        let temp_path = env::temp_dir().join("recitation_judge_test_persist.json");
        let _ = std::fs::remove_file(&temp_path);

        let store = LocalStore::open(temp_path.clone()).unwrap();
        let id = store.add_contestant(new_contestant("A", "1")).await.unwrap();
        store.submit_grade(&id, &GradeEntry::new(2, 9.0, 1.0, 1.0)).await.unwrap();

        let reopened = LocalStore::open(temp_path.clone()).unwrap();
        assert_eq!(reopened.fetch_contestants().await.unwrap().len(), 1);
        assert_eq!(
            reopened.fetch_grades(&id).await.unwrap(),
            vec![GradeEntry::new(2, 9.0, 1.0, 1.0)]
        );

        let _ = std::fs::remove_file(&temp_path);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let temp_path = env::temp_dir().join("recitation_judge_test_version.json");
        std::fs::write(&temp_path, r#"{"version": 7}"#).unwrap();

        let result = load_store_data(&temp_path);
        assert!(result.is_err());

        let _ = std::fs::remove_file(&temp_path);
    }
}
