use crate::{Provider, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Session id used for events that have no session, e.g. unauthenticated
/// model listing.
pub const PUBLIC_SESSION: &str = "public";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Classification,
    Clarification,
    PromptUpdate,
    MatrixUpdate,
    AdminReview,
    Reclassification,
    ModelListSuccess,
    ModelListError,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One append-only record. `model_prompt` holds the exact serialized
/// messages sent to the provider and `model_response` the raw text that came
/// back, unparsed, so every decision can be replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub user_id: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub model_prompt: String,
    #[serde(default)]
    pub model_response: String,
    #[serde(default)]
    pub pii_scrubbed: bool,
    #[serde(default)]
    pub metadata: AuditMetadata,
}

impl AuditEntry {
    pub fn new(session_id: impl Into<String>, event_type: AuditEventType, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event_type,
            user_id: user_id.into(),
            data: Value::Null,
            model_prompt: String::new(),
            model_response: String::new(),
            pii_scrubbed: true,
            metadata: AuditMetadata::default(),
        }
    }

    pub fn for_session(session_id: Uuid, event_type: AuditEventType, user_id: impl Into<String>) -> Self {
        Self::new(session_id.to_string(), event_type, user_id)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_exchange(mut self, model_prompt: impl Into<String>, model_response: impl Into<String>) -> Self {
        self.model_prompt = model_prompt.into();
        self.model_response = model_response.into();
        self
    }

    pub fn with_metadata(mut self, metadata: AuditMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Questions recorded on a clarification entry, if any.
    pub fn question_count(&self) -> usize {
        self.data
            .get("questions")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Append-only audit log, one JSONL file per UTC date. Records are never
/// updated; readers tolerate unparsable lines.
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    pub fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let path = self.file_for(entry.timestamp.date_naive());
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        // One write per record keeps concurrent appenders line-atomic.
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    pub fn query_by_date(&self, date: NaiveDate) -> Result<Vec<AuditEntry>, StoreError> {
        let path = self.file_for(date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(read_entries(&path))
    }

    /// All entries for a session, oldest first, across every date (or only
    /// the most recent `last_days` files when given).
    pub fn session_entries(&self, session_id: Uuid, last_days: Option<usize>) -> Result<Vec<AuditEntry>, StoreError> {
        let wanted = session_id.to_string();
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        files.sort();
        if let Some(n) = last_days
            && files.len() > n
        {
            files.drain(..files.len() - n);
        }

        let mut entries = Vec::new();
        for file in files {
            entries.extend(read_entries(&file).into_iter().filter(|e| e.session_id == wanted));
        }
        Ok(entries)
    }

    /// The most recent `window` clarification events for a session, oldest
    /// first. This is the loop-detection view.
    pub fn recent_clarifications(&self, session_id: Uuid, window: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let mut entries: Vec<AuditEntry> = self
            .session_entries(session_id, None)?
            .into_iter()
            .filter(|e| e.event_type == AuditEventType::Clarification)
            .collect();
        if entries.len() > window {
            entries.drain(..entries.len() - window);
        }
        Ok(entries)
    }
}

fn read_entries(path: &Path) -> Vec<AuditEntry> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<AuditEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unparsable audit line");
                None
            }
        })
        .collect()
}
