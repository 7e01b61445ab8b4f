use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, RetryIf};
use tracing::{debug, warn};

use super::{GradeStore, StoreError, StoreResult};
use crate::contestant::{Committee, Contestant, ContestantField, ContestantId, NewContestant};
use crate::scoring::normalize::{normalize_value, value_to_text};
use crate::scoring::GradeEntry;

const USER_AGENT_VALUE: &str = concat!("recitation-judge/", env!("CARGO_PKG_VERSION"));

/// Client for the competition's spreadsheet web app.
///
/// Reads are `GET ?action=...` and retried with exponential backoff while the
/// store is unreachable; writes are `POST` JSON bodies carrying an `action`
/// field and are sent once. Every response is an envelope
/// `{ "ok": bool, "error"?: string, ... }`.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: reqwest::Url,
    retries: usize,
}

impl RemoteStore {
    pub fn new(base_url: &str, timeout: Duration, retries: usize) -> StoreResult<Self> {
        let base_url = reqwest::Url::parse(base_url.trim())
            .map_err(|e| StoreError::Unreachable(format!("invalid store URL '{}': {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT_VALUE)
            .build()
            .map_err(|e| StoreError::Unreachable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            retries,
        })
    }

    fn read_url(&self, action: &str, params: &[(&str, &str)]) -> reqwest::Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("action", action);
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    async fn get(&self, action: &str, params: &[(&str, &str)]) -> StoreResult<Value> {
        let url = self.read_url(action, params);
        debug!(action, "store read");

        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .take(self.retries);

        RetryIf::spawn(
            retry_strategy,
            || async {
                let response = self.client.get(url.clone()).send().await.map_err(|e| {
                    warn!(action, error = %e, "store read failed");
                    StoreError::Unreachable(e.to_string())
                })?;
                read_envelope(response).await
            },
            is_transient,
        )
        .await
    }

    async fn post(&self, body: Value) -> StoreResult<Value> {
        let action = body
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        debug!(action = %action, "store write");

        let response = self
            .client
            .post(self.base_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(action = %action, error = %e, "store write failed");
                StoreError::Unreachable(e.to_string())
            })?;
        read_envelope(response).await
    }
}

/// Only transport failures and 5xx answers are worth another attempt; a
/// rejection or a malformed body will not change on retry.
fn is_transient(err: &StoreError) -> bool {
    matches!(err, StoreError::Unreachable(_))
}

async fn read_envelope(response: reqwest::Response) -> StoreResult<Value> {
    let status = response.status();
    if status.is_server_error() {
        return Err(StoreError::Unreachable(format!("HTTP {}", status)));
    }
    if !status.is_success() {
        return Err(StoreError::Rejected(format!("HTTP {}", status)));
    }

    let text = response
        .text()
        .await
        .map_err(|e| StoreError::Unreachable(e.to_string()))?;
    parse_envelope(&text)
}

/// Parse a response body and unwrap its `ok` flag.
fn parse_envelope(text: &str) -> StoreResult<Value> {
    let body: Value = serde_json::from_str(text)
        .map_err(|e| StoreError::InvalidResponse(format!("response is not JSON: {}", e)))?;

    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        Ok(body)
    } else {
        let reason = body
            .get("error")
            .map(value_to_text)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "request failed".to_string());
        Err(StoreError::Rejected(reason))
    }
}

/// Rows of a collection response, found under `key` or the generic `data` key.
fn rows_from<T: DeserializeOwned>(body: &Value, key: &str) -> StoreResult<Vec<T>> {
    match body.get(key).or_else(|| body.get("data")) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(rows) => serde_json::from_value(rows.clone())
            .map_err(|e| StoreError::InvalidResponse(format!("malformed {}: {}", key, e))),
    }
}

fn grade_body(contestant_id: &ContestantId, entry: &GradeEntry) -> Value {
    json!({
        "action": "add_grade",
        "participant_id": contestant_id,
        "question_number": entry.question_number,
        "حفظ": entry.memorization,
        "أداء": entry.performance,
        "تجويد": entry.tajweed,
    })
}

fn update_body(contestant_id: &ContestantId, field: ContestantField, value: &str) -> Value {
    let mut body = Map::new();
    body.insert("action".to_string(), json!("update_participant"));
    body.insert("id".to_string(), json!(contestant_id));
    body.insert(field.sheet_key().to_string(), json!(value));
    Value::Object(body)
}

#[async_trait]
impl GradeStore for RemoteStore {
    async fn fetch_committees(&self) -> StoreResult<Vec<Committee>> {
        let body = self.get("committees", &[]).await?;
        rows_from(&body, "committees")
    }

    async fn fetch_contestants(&self) -> StoreResult<Vec<Contestant>> {
        let body = self.get("participants", &[]).await?;
        rows_from(&body, "participants")
    }

    async fn fetch_grades(&self, contestant_id: &ContestantId) -> StoreResult<Vec<GradeEntry>> {
        let body = self
            .get("grades", &[("participant_id", contestant_id.as_str())])
            .await?;
        rows_from(&body, "grades")
    }

    async fn submit_grade(&self, contestant_id: &ContestantId, entry: &GradeEntry) -> StoreResult<()> {
        self.post(grade_body(contestant_id, entry)).await.map(|_| ())
    }

    async fn finalize_contestant(&self, contestant_id: &ContestantId, total: f64) -> StoreResult<()> {
        self.post(json!({
            "action": "finalize_participant",
            "participant_id": contestant_id,
            "total": total,
        }))
        .await
        .map(|_| ())
    }

    async fn reset_contestant_grades(&self, contestant_id: &ContestantId) -> StoreResult<usize> {
        let body = self
            .post(json!({
                "action": "reset_participant_grades",
                "participant_id": contestant_id,
            }))
            .await?;
        let removed = body.get("removed").map(normalize_value).unwrap_or(0.0);
        Ok(removed.max(0.0) as usize)
    }

    async fn add_contestant(&self, fields: NewContestant) -> StoreResult<ContestantId> {
        fields.validate().map_err(StoreError::Rejected)?;
        let mut body = serde_json::to_value(&fields)
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("action".to_string(), json!("add_participant"));
        }

        let response = self.post(body).await?;
        let id = response.get("id").map(value_to_text).unwrap_or_default();
        if id.is_empty() {
            return Err(StoreError::InvalidResponse(
                "store did not return the new contestant id".to_string(),
            ));
        }
        Ok(ContestantId::from(id))
    }

    async fn update_contestant(
        &self,
        contestant_id: &ContestantId,
        field: ContestantField,
        value: &str,
    ) -> StoreResult<()> {
        field.validate(value).map_err(StoreError::Rejected)?;
        self.post(update_body(contestant_id, field, value))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope_ok() {
        let body = parse_envelope(r#"{"ok": true, "participants": []}"#).unwrap();
        assert!(body.get("participants").is_some());
    }

    #[test]
    fn test_parse_envelope_failure_carries_reason() {
        let err = parse_envelope(r#"{"ok": false, "error": "sheet locked"}"#).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(ref reason) if reason == "sheet locked"));

        let err = parse_envelope(r#"{"status": "?"}"#).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[test]
    fn test_only_unreachable_is_retried() {
        assert!(is_transient(&StoreError::Unreachable("HTTP 503".to_string())));
        assert!(!is_transient(&StoreError::Rejected("sheet locked".to_string())));
        assert!(!is_transient(&StoreError::InvalidResponse("not JSON".to_string())));
        assert!(!is_transient(&StoreError::UnknownContestant(ContestantId::from("P1"))));

        let err = parse_envelope(r#"{"ok": false, "error": "bad committee"}"#).unwrap_err();
        assert!(!is_transient(&err));
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let attempts = AtomicUsize::new(0);
        let strategy = ExponentialBackoff::from_millis(1).take(3);
        let result: StoreResult<()> = RetryIf::spawn(
            strategy,
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Rejected("sheet locked".to_string()))
            },
            is_transient,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        attempts.store(0, Ordering::SeqCst);
        let strategy = ExponentialBackoff::from_millis(1).take(3);
        let result: StoreResult<()> = RetryIf::spawn(
            strategy,
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Unreachable("HTTP 502".to_string()))
            },
            is_transient,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_parse_envelope_rejects_html() {
        let err = parse_envelope("<html>moved</html>").unwrap_err();
        assert!(matches!(err, StoreError::InvalidResponse(_)));
    }

    #[test]
    fn test_rows_prefer_named_key_then_data() {
        let named = json!({ "ok": true, "grades": [{ "question_number": 1, "حفظ": 3 }] });
        let rows: Vec<GradeEntry> = rows_from(&named, "grades").unwrap();
        assert_eq!(rows, vec![GradeEntry::new(1, 3.0, 0.0, 0.0)]);

        let generic = json!({ "ok": true, "data": [{ "question_number": "2" }] });
        let rows: Vec<GradeEntry> = rows_from(&generic, "grades").unwrap();
        assert_eq!(rows, vec![GradeEntry::zero(2)]);

        let missing = json!({ "ok": true });
        let rows: Vec<GradeEntry> = rows_from(&missing, "grades").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_rows_malformed() {
        let body = json!({ "ok": true, "grades": "nope" });
        let result: StoreResult<Vec<GradeEntry>> = rows_from(&body, "grades");
        assert!(matches!(result, Err(StoreError::InvalidResponse(_))));
    }

    #[test]
    fn test_read_url_carries_action_and_params() {
        let store = RemoteStore::new("https://example.org/exec", Duration::from_secs(5), 3).unwrap();
        let url = store.read_url("grades", &[("participant_id", "P 1")]);
        assert_eq!(
            url.as_str(),
            "https://example.org/exec?action=grades&participant_id=P+1"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(RemoteStore::new("not a url", Duration::from_secs(5), 3).is_err());
    }

    #[test]
    fn test_write_bodies_use_sheet_keys() {
        let id = ContestantId::from("P7");
        let grade = grade_body(&id, &GradeEntry::new(3, 9.0, 1.0, 2.0));
        assert_eq!(grade["action"], "add_grade");
        assert_eq!(grade["participant_id"], "P7");
        assert_eq!(grade["حفظ"], 9.0);

        let update = update_body(&id, ContestantField::PartsCount, "4");
        assert_eq!(update["id"], "P7");
        assert_eq!(update["عدد الأجزاء"], "4");
    }
}
