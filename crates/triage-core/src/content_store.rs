use crate::audit::{AuditEntry, AuditEventType, AuditLog};
use crate::{DecisionMatrix, StoreError, sanitize_matrix};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Semver-like artifact version: `major.minor[.patch]`, patch defaulting
/// to 0. Ordering is the derived tuple ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// First version of any new artifact.
    pub const INITIAL: Version = Version { major: 1, minor: 0, patch: 0 };

    pub fn bump_patch(self) -> Self {
        Self { patch: self.patch + 1, ..self }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<Option<u32>, StoreError> {
            match parts.next() {
                Some(p) => p
                    .parse::<u32>()
                    .map(Some)
                    .map_err(|_| StoreError::InvalidVersion(s.to_string())),
                None if required => Err(StoreError::InvalidVersion(s.to_string())),
                None => Ok(None),
            }
        };
        let major = next(true)?.expect("required");
        let minor = next(true)?.expect("required");
        let patch = next(false)?.unwrap_or(0);
        if parts.next().is_some() {
            return Err(StoreError::InvalidVersion(s.to_string()));
        }
        Ok(Self { major, minor, patch })
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

impl std::str::FromStr for Version {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

#[derive(Debug, Clone)]
pub struct SaveReceipt {
    pub old_version: Option<Version>,
    pub version: Version,
}

/// Versioned store for prompt texts and decision matrices.
///
/// Layout:
/// ```text
/// <data_dir>/prompts/<prompt_id>-v<version>.txt
/// <data_dir>/decision-matrix/<version>.json
/// ```
/// Every version is an immutable file: saves allocate a new version (or use
/// an explicit, non-colliding one), write to a temp file and rename. Prior
/// versions are never touched, which is what makes rollback and A/B study
/// possible. Reads go through a process-wide cache keyed by resolved
/// version — versions are immutable, so cached entries never go stale and
/// "latest" is re-resolved from the directory on every load, which is what
/// makes a fresh save visible immediately. Every write emits a
/// `prompt_update` or `matrix_update` audit entry.
pub struct ContentStore {
    prompts_dir: PathBuf,
    matrix_dir: PathBuf,
    audit: Arc<AuditLog>,
    prompt_cache: RwLock<HashMap<String, Arc<String>>>,
    matrix_cache: RwLock<HashMap<String, Arc<DecisionMatrix>>>,
}

impl ContentStore {
    pub fn new(data_dir: &Path, audit: Arc<AuditLog>) -> Result<Self, StoreError> {
        let prompts_dir = data_dir.join("prompts");
        let matrix_dir = data_dir.join("decision-matrix");
        std::fs::create_dir_all(&prompts_dir)?;
        std::fs::create_dir_all(&matrix_dir)?;
        Ok(Self {
            prompts_dir,
            matrix_dir,
            audit,
            prompt_cache: RwLock::new(HashMap::new()),
            matrix_cache: RwLock::new(HashMap::new()),
        })
    }

    // ── Prompts ─────────────────────────────────────────────────

    pub fn list_prompt_versions(&self, prompt_id: &str) -> Result<Vec<Version>, StoreError> {
        check_id(prompt_id)?;
        let prefix = format!("{prompt_id}-v");
        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.prompts_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(rest) = name.strip_prefix(&prefix)
                && let Some(ver) = rest.strip_suffix(".txt")
                && let Ok(version) = Version::parse(ver)
            {
                versions.push(version);
            }
        }
        versions.sort();
        versions.reverse();
        Ok(versions)
    }

    pub fn latest_prompt_version(&self, prompt_id: &str) -> Result<Option<Version>, StoreError> {
        Ok(self.list_prompt_versions(prompt_id)?.into_iter().next())
    }

    /// Load a prompt text, latest version when none is given. Returns the
    /// text together with the version it came from.
    pub fn load_prompt(&self, prompt_id: &str, version: Option<Version>) -> Result<(Arc<String>, Version), StoreError> {
        check_id(prompt_id)?;
        let resolved = match version {
            Some(v) => v,
            None => self
                .latest_prompt_version(prompt_id)?
                .ok_or_else(|| StoreError::NotFound(format!("prompt {prompt_id:?}")))?,
        };

        let key = format!("{prompt_id}@{resolved}");
        if let Some(text) = self.prompt_cache.read().unwrap().get(&key) {
            return Ok((Arc::clone(text), resolved));
        }

        let path = self.prompt_path(prompt_id, resolved);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(format!("prompt {prompt_id:?} v{resolved}"))
            } else {
                e.into()
            }
        })?;
        let text = Arc::new(text);
        self.prompt_cache.write().unwrap().insert(key, Arc::clone(&text));
        Ok((text, resolved))
    }

    /// Save a prompt. Without an explicit version, allocates the next patch
    /// above the current maximum; the first save of a new prompt id is 1.0.
    pub fn save_prompt(
        &self,
        prompt_id: &str,
        content: &str,
        user_id: &str,
        explicit: Option<Version>,
    ) -> Result<SaveReceipt, StoreError> {
        check_id(prompt_id)?;
        let old_version = self.latest_prompt_version(prompt_id)?;
        let version = self.allocate(old_version, explicit, |v| {
            self.prompt_path(prompt_id, v).exists()
        })?;

        write_atomic(&self.prompt_path(prompt_id, version), content.as_bytes())?;

        info!(prompt_id, %version, "saved prompt version");
        self.audit.append(
            &AuditEntry::new(crate::audit::PUBLIC_SESSION, AuditEventType::PromptUpdate, user_id).with_data(json!({
                "promptId": prompt_id,
                "oldVersion": old_version.map(|v| v.to_string()),
                "newVersion": version.to_string(),
            })),
        )?;

        Ok(SaveReceipt { old_version, version })
    }

    fn prompt_path(&self, prompt_id: &str, version: Version) -> PathBuf {
        self.prompts_dir.join(format!("{prompt_id}-v{version}.txt"))
    }

    // ── Decision matrices ───────────────────────────────────────

    pub fn list_matrix_versions(&self) -> Result<Vec<Version>, StoreError> {
        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.matrix_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(ver) = name.strip_suffix(".json")
                && let Ok(version) = Version::parse(ver)
            {
                versions.push(version);
            }
        }
        versions.sort();
        versions.reverse();
        Ok(versions)
    }

    pub fn latest_matrix_version(&self) -> Result<Option<Version>, StoreError> {
        Ok(self.list_matrix_versions()?.into_iter().next())
    }

    /// Load and sanitize a matrix, latest version when none is given.
    /// Sanitization runs on every load: a hand-edited file gets the same
    /// filter-and-warn treatment as a save.
    pub fn load_matrix(&self, version: Option<Version>) -> Result<Arc<DecisionMatrix>, StoreError> {
        let resolved = match version {
            Some(v) => v,
            None => self
                .latest_matrix_version()?
                .ok_or_else(|| StoreError::NotFound("decision matrix".into()))?,
        };

        let key = resolved.to_string();
        if let Some(matrix) = self.matrix_cache.read().unwrap().get(&key) {
            return Ok(Arc::clone(matrix));
        }

        let path = self.matrix_path(resolved);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(format!("decision matrix v{resolved}"))
            } else {
                e.into()
            }
        })?;
        let value: Value = serde_json::from_str(&raw)?;
        let sanitized = sanitize_matrix(&value)?;
        if !sanitized.warnings.is_empty() {
            warn!(version = %resolved, count = sanitized.warnings.len(), "matrix load produced sanitization warnings");
        }
        let mut matrix = sanitized.matrix;
        matrix.version = resolved.to_string();
        let matrix = Arc::new(matrix);
        self.matrix_cache.write().unwrap().insert(key, Arc::clone(&matrix));
        Ok(matrix)
    }

    /// Sanitize and save a matrix document. Returns the allocated version
    /// and the sanitization warnings, which are surfaced to the caller but
    /// do not block the save as long as the matrix stayed usable.
    pub fn save_matrix(
        &self,
        raw: &Value,
        user_id: &str,
        explicit: Option<Version>,
    ) -> Result<(SaveReceipt, Vec<String>), StoreError> {
        let sanitized = sanitize_matrix(raw)?;

        let old_version = self.latest_matrix_version()?;
        let version = self.allocate(old_version, explicit, |v| self.matrix_path(v).exists())?;

        let mut matrix = sanitized.matrix;
        matrix.version = version.to_string();
        let body = serde_json::to_string_pretty(&matrix)?;
        write_atomic(&self.matrix_path(version), body.as_bytes())?;

        info!(%version, rules = matrix.rules.len(), warnings = sanitized.warnings.len(), "saved decision matrix");
        self.audit.append(
            &AuditEntry::new(crate::audit::PUBLIC_SESSION, AuditEventType::MatrixUpdate, user_id).with_data(json!({
                "oldVersion": old_version.map(|v| v.to_string()),
                "newVersion": version.to_string(),
                "warnings": sanitized.warnings,
            })),
        )?;

        Ok((SaveReceipt { old_version, version }, sanitized.warnings))
    }

    fn matrix_path(&self, version: Version) -> PathBuf {
        self.matrix_dir.join(format!("{version}.json"))
    }

    // ── Shared ──────────────────────────────────────────────────

    fn allocate(
        &self,
        current_max: Option<Version>,
        explicit: Option<Version>,
        exists: impl Fn(Version) -> bool,
    ) -> Result<Version, StoreError> {
        match explicit {
            Some(version) => {
                if exists(version) {
                    return Err(StoreError::VersionExists(version.to_string()));
                }
                Ok(version)
            }
            None => {
                let version = current_max.map(Version::bump_patch).unwrap_or(Version::INITIAL);
                debug!(%version, "allocated artifact version");
                Ok(version)
            }
        }
    }
}

fn check_id(id: &str) -> Result<(), StoreError> {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok { Ok(()) } else { Err(StoreError::InvalidId(id.to_string())) }
}

/// Write-to-temp then rename: readers never observe a partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, ContentStore) {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path().join("audit-logs")).unwrap());
        let store = ContentStore::new(dir.path(), audit).unwrap();
        (dir, store)
    }

    fn minimal_matrix() -> Value {
        json!({
            "attributes": [
                {"name": "frequency", "type": "categorical", "possibleValues": ["daily", "weekly"], "weight": 0.5}
            ],
            "rules": []
        })
    }

    #[test]
    fn version_parse_and_display() {
        assert_eq!(Version::parse("1.0").unwrap(), Version { major: 1, minor: 0, patch: 0 });
        assert_eq!(Version::parse("2.1.3").unwrap().to_string(), "2.1.3");
        assert_eq!(Version::parse("1.0").unwrap().to_string(), "1.0");
        assert!(Version::parse("one.two").is_err());
        assert!(Version::parse("1").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
    }

    #[test]
    fn version_ordering_is_numeric() {
        assert!(Version::parse("1.10").unwrap() > Version::parse("1.9").unwrap());
        assert!(Version::parse("2.0").unwrap() > Version::parse("1.9.9").unwrap());
    }

    #[test]
    fn first_prompt_save_is_one_dot_zero() {
        let (_dir, store) = store();
        let receipt = store.save_prompt("classification", "text", "admin", None).unwrap();
        assert_eq!(receipt.version.to_string(), "1.0");
        assert!(receipt.old_version.is_none());
    }

    #[test]
    fn prompt_versions_allocate_monotonically() {
        let (_dir, store) = store();
        let mut seen = Vec::new();
        for i in 0..4 {
            let receipt = store
                .save_prompt("classification", &format!("text {i}"), "admin", None)
                .unwrap();
            seen.push(receipt.version);
        }
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted, "versions must be strictly increasing");
        assert_eq!(seen.last().unwrap().to_string(), "1.0.3");
    }

    #[test]
    fn explicit_version_collision_is_rejected() {
        let (_dir, store) = store();
        let v2 = Version::parse("2.0").unwrap();
        store.save_prompt("classification", "a", "admin", Some(v2)).unwrap();
        let err = store.save_prompt("classification", "b", "admin", Some(v2)).unwrap_err();
        assert!(matches!(err, StoreError::VersionExists(_)));
    }

    #[test]
    fn latest_prompt_wins_by_semver_not_write_order() {
        let (_dir, store) = store();
        store
            .save_prompt("clarification", "new", "admin", Some(Version::parse("2.0").unwrap()))
            .unwrap();
        store
            .save_prompt("clarification", "old", "admin", Some(Version::parse("1.5").unwrap()))
            .unwrap();
        let (text, version) = store.load_prompt("clarification", None).unwrap();
        assert_eq!(version.to_string(), "2.0");
        assert_eq!(*text, "new");
    }

    #[test]
    fn load_missing_prompt_is_not_found() {
        let (_dir, store) = store();
        let err = store.load_prompt("nope", None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn invalid_prompt_id_is_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            store.save_prompt("../escape", "x", "admin", None),
            Err(StoreError::InvalidId(_))
        ));
    }

    #[test]
    fn matrix_round_trip_preserves_content() {
        let (_dir, store) = store();
        let (receipt, warnings) = store.save_matrix(&minimal_matrix(), "admin", None).unwrap();
        assert!(warnings.is_empty());
        let loaded = store.load_matrix(Some(receipt.version)).unwrap();
        assert_eq!(loaded.version, "1.0");
        assert_eq!(loaded.attributes.len(), 1);
    }

    #[test]
    fn matrix_save_emits_audit_entry() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path().join("audit-logs")).unwrap());
        let store = ContentStore::new(dir.path(), Arc::clone(&audit)).unwrap();
        store.save_matrix(&minimal_matrix(), "admin", None).unwrap();

        let entries = audit.query_by_date(chrono::Utc::now().date_naive()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, AuditEventType::MatrixUpdate);
        assert_eq!(entries[0].data["newVersion"], "1.0");
        assert_eq!(entries[0].user_id, "admin");
    }

    #[test]
    fn latest_matrix_reflects_newer_save() {
        let (_dir, store) = store();
        store.save_matrix(&minimal_matrix(), "admin", None).unwrap();
        let first = store.load_matrix(None).unwrap();
        assert_eq!(first.version, "1.0");

        store
            .save_matrix(&minimal_matrix(), "admin", Some(Version::parse("2.0").unwrap()))
            .unwrap();
        let second = store.load_matrix(None).unwrap();
        assert_eq!(second.version, "2.0");
    }
}
