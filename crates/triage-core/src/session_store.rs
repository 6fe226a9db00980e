use crate::audit::{AuditEntry, AuditEventType, AuditLog, AuditMetadata};
use crate::{Session, SessionStatus, StoreError};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-session documents, one JSON file each, replaced whole on every save.
///
/// Concurrent requests for the same session are serialized by a per-session
/// async mutex: the orchestrator takes the lock for the entire
/// submit/clarify/reclassify call, so at most one classification runs per
/// session at a time.
pub struct SessionStore {
    dir: PathBuf,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Handle for the session's mutex. Hold the guard across the whole
    /// operation, LLM round-trips included.
    pub fn lock_handle(&self, session_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(locks.entry(session_id).or_default())
    }

    fn path(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    pub fn exists(&self, session_id: Uuid) -> bool {
        self.path(session_id).exists()
    }

    pub fn load(&self, session_id: Uuid) -> Result<Session, StoreError> {
        let path = self.path(session_id);
        let data = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(format!("session {session_id}"))
            } else {
                e.into()
            }
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        write_atomic(
            &self.path(session.session_id),
            serde_json::to_string_pretty(session)?.as_bytes(),
        )
    }

    /// All sessions, unordered. Unparsable documents are skipped with a
    /// warning rather than failing the listing.
    pub fn list(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match std::fs::read_to_string(&path).map_err(StoreError::from).and_then(|data| {
                serde_json::from_str::<Session>(&data).map_err(StoreError::from)
            }) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable session document"),
            }
        }
        Ok(sessions)
    }

    /// Close sessions idle beyond `timeout`. A session that already has a
    /// classification completes with a system rationale; one that never got
    /// that far is failed. Sessions whose mutex is currently held are left
    /// for the next sweep.
    pub fn sweep_idle(&self, timeout: Duration, audit: &AuditLog) -> Result<Vec<Uuid>, StoreError> {
        let cutoff = chrono::Utc::now()
            - chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::hours(2));
        let mut swept = Vec::new();

        for candidate in self.list()? {
            if !candidate.status.is_active() || candidate.last_activity_at > cutoff {
                continue;
            }
            let handle = self.lock_handle(candidate.session_id);
            let Ok(_guard) = handle.try_lock() else {
                continue;
            };
            // Re-read under the lock; the listing snapshot may be stale.
            let mut session = self.load(candidate.session_id)?;
            if !session.status.is_active() || session.last_activity_at > cutoff {
                continue;
            }

            let new_status = match session.classification.as_mut() {
                Some(classification) => {
                    classification.rationale.push_str(
                        "\nSession closed automatically after exceeding the inactivity timeout.",
                    );
                    SessionStatus::Completed
                }
                None => SessionStatus::Failed,
            };
            session.status = new_status;
            session.updated_at = chrono::Utc::now();

            audit.append(
                &AuditEntry::for_session(session.session_id, AuditEventType::Classification, &session.user_id)
                    .with_data(json!({ "status": session.status }))
                    .with_metadata(AuditMetadata {
                        action: Some("session_timeout".into()),
                        reason: Some("idle beyond session timeout".into()),
                        ..AuditMetadata::default()
                    }),
            )?;
            self.save(&session)?;
            info!(session_id = %session.session_id, status = %session.status, "swept idle session");
            swept.push(session.session_id);
        }

        Ok(swept)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Classification, Provider};
    use chrono::Utc;

    fn store() -> (tempfile::TempDir, SessionStore, AuditLog) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions")).unwrap();
        let audit = AuditLog::new(dir.path().join("audit-logs")).unwrap();
        (dir, store, audit)
    }

    fn classification() -> Classification {
        Classification {
            category: Category::Digitise,
            confidence: 0.9,
            rationale: "manual data entry".into(),
            category_progression: String::new(),
            future_opportunities: String::new(),
            timestamp: Utc::now(),
            model_used: "test-model".into(),
            llm_provider: Provider::OpenAi,
            decision_matrix_evaluation: None,
        }
    }

    #[test]
    fn save_load_round_trip() {
        let (_dir, store, _audit) = store();
        let mut session = Session::new("u1", "a process description");
        session.subject = Some("finance".into());
        session.push_turn(&["q1".into()]);
        store.save(&session).unwrap();

        let loaded = store.load(session.session_id).unwrap();
        assert_eq!(loaded.session_id, session.session_id);
        assert_eq!(loaded.subject.as_deref(), Some("finance"));
        assert_eq!(loaded.conversations.len(), 1);
    }

    #[test]
    fn load_missing_session_is_not_found() {
        let (_dir, store, _audit) = store();
        assert!(store.load(Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn sweep_ignores_recent_sessions() {
        let (_dir, store, audit) = store();
        let session = Session::new("u1", "desc");
        store.save(&session).unwrap();

        let swept = store.sweep_idle(Duration::from_secs(3600), &audit).unwrap();
        assert!(swept.is_empty());
    }

    #[test]
    fn sweep_completes_classified_and_fails_unclassified() {
        let (_dir, store, audit) = store();
        let stale = Utc::now() - chrono::Duration::hours(3);

        let mut with_class = Session::new("u1", "desc");
        with_class.status = SessionStatus::Clarifying;
        with_class.classification = Some(classification());
        with_class.last_activity_at = stale;
        store.save(&with_class).unwrap();

        let mut without = Session::new("u2", "desc");
        without.last_activity_at = stale;
        store.save(&without).unwrap();

        let swept = store.sweep_idle(Duration::from_secs(7200), &audit).unwrap();
        assert_eq!(swept.len(), 2);

        let first = store.load(with_class.session_id).unwrap();
        assert_eq!(first.status, SessionStatus::Completed);
        assert!(first.classification.unwrap().rationale.contains("inactivity"));

        let second = store.load(without.session_id).unwrap();
        assert_eq!(second.status, SessionStatus::Failed);
    }

    #[test]
    fn sweep_skips_locked_sessions() {
        let (_dir, store, audit) = store();
        let mut session = Session::new("u1", "desc");
        session.last_activity_at = Utc::now() - chrono::Duration::hours(3);
        store.save(&session).unwrap();

        let handle = store.lock_handle(session.session_id);
        let guard = handle.try_lock().unwrap();
        let swept = store.sweep_idle(Duration::from_secs(7200), &audit).unwrap();
        assert!(swept.is_empty());
        drop(guard);

        let swept = store.sweep_idle(Duration::from_secs(7200), &audit).unwrap();
        assert_eq!(swept.len(), 1);
    }
}
