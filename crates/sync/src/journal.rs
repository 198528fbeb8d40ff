//! Work journal: remembers a scheduled run across process restarts
//!
//! The scheduler marks a run pending before invoking its task and complete
//! afterwards. A run still pending when the next process starts was
//! interrupted (or failed transiently) and is run again at once.

use chrono::{DateTime, Utc};
use larder_core::error::{Error, Result, ResultExt};
use larder_core::state::RefreshState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persisted record of the most recent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub run_id: Uuid,
    pub pending: bool,
    pub enqueued_at: DateTime<Utc>,
    /// Attempts made so far, across restarts
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<RefreshState>,
}

/// JSON file holding one [`JournalEntry`]
#[derive(Debug, Clone)]
pub struct WorkJournal {
    path: PathBuf,
}

impl WorkJournal {
    /// Use the journal at `path`, creating its directory if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(Error::from)
                .context(format!("Creating {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    /// Journal file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last entry, if the file exists
    pub fn load(&self) -> Result<Option<JournalEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::from(e).with_context(self.path.display().to_string())),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::journal_corrupted(&self.path).with_source(e))
    }

    /// Whether a previous run never completed
    pub fn has_pending(&self) -> Result<bool> {
        Ok(self.load()?.is_some_and(|e| e.pending))
    }

    /// Record that a run is about to start
    ///
    /// Continues a pending entry (keeping its id and attempt count) or
    /// starts a new one.
    pub fn mark_pending(&self) -> Result<JournalEntry> {
        let entry = match self.load()? {
            Some(entry) if entry.pending => entry,
            _ => JournalEntry {
                run_id: Uuid::new_v4(),
                pending: true,
                enqueued_at: Utc::now(),
                attempts: 0,
                completed_at: None,
                last_outcome: None,
            },
        };
        self.write(&entry)?;
        Ok(entry)
    }

    /// Record the outcome of a run
    ///
    /// A run that ended in a retryable failure stays pending.
    pub fn record_outcome(&self, attempts: u32, outcome: &RefreshState) -> Result<JournalEntry> {
        let mut entry = self.mark_pending()?;
        entry.attempts += attempts;
        entry.last_outcome = Some(outcome.clone());

        let retryable = outcome.failure().is_some_and(|f| f.kind.is_retryable());
        if !retryable {
            entry.pending = false;
            entry.completed_at = Some(Utc::now());
        }
        self.write(&entry)?;
        Ok(entry)
    }

    fn write(&self, entry: &JournalEntry) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entry)?)
            .map_err(Error::from)
            .context(format!("Writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .map_err(Error::from)
            .context(format!("Replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::state::RefreshFailure;
    use larder_core::ErrorCode;

    fn journal() -> (tempfile::TempDir, WorkJournal) {
        let dir = tempfile::tempdir().unwrap();
        let journal = WorkJournal::open(dir.path().join("state").join("journal.json")).unwrap();
        (dir, journal)
    }

    #[test]
    fn test_missing_file_has_nothing_pending() {
        let (_dir, journal) = journal();
        assert!(journal.load().unwrap().is_none());
        assert!(!journal.has_pending().unwrap());
    }

    #[test]
    fn test_pending_until_success() {
        let (_dir, journal) = journal();
        let pending = journal.mark_pending().unwrap();
        assert!(journal.has_pending().unwrap());

        let done = journal.record_outcome(1, &RefreshState::Idle).unwrap();
        assert_eq!(done.run_id, pending.run_id);
        assert!(!done.pending);
        assert!(done.completed_at.is_some());
        assert!(!journal.has_pending().unwrap());
    }

    #[test]
    fn test_network_failure_stays_pending() {
        let (_dir, journal) = journal();
        journal.mark_pending().unwrap();
        let entry = journal
            .record_outcome(3, &RefreshState::Failed(RefreshFailure::network("down")))
            .unwrap();
        assert!(entry.pending);
        assert_eq!(entry.attempts, 3);

        // The next run continues the same entry
        let again = journal.mark_pending().unwrap();
        assert_eq!(again.run_id, entry.run_id);
        assert_eq!(again.attempts, 3);
    }

    #[test]
    fn test_parse_failure_completes() {
        let (_dir, journal) = journal();
        journal.mark_pending().unwrap();
        let entry = journal
            .record_outcome(1, &RefreshState::Failed(RefreshFailure::parse("bad body")))
            .unwrap();
        assert!(!entry.pending);
    }

    #[test]
    fn test_completed_entry_starts_new_run() {
        let (_dir, journal) = journal();
        let first = journal.record_outcome(1, &RefreshState::Idle).unwrap();
        let second = journal.mark_pending().unwrap();
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(second.attempts, 0);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let (_dir, journal) = journal();
        fs::write(journal.path(), "{ not json").unwrap();
        let err = journal.load().unwrap_err();
        assert_eq!(err.code, ErrorCode::JournalCorrupted);
    }
}
