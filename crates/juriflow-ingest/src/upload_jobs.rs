//! In-process table of upload jobs.
//!
//! The HTTP layer admits a job and polls it; only the background worker
//! mutates it. All writes go through one mutex, and the store enforces the
//! job invariants: progress never regresses, percent stays in `[0, 100]`,
//! and terminal states are frozen.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use juriflow::documents::DocumentMetadata;
use juriflow::error::{Error, Result};

/// Lifecycle of an upload job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadState {
    Initiated,
    Saving,
    Processing,
    Completed,
    Error,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One upload job, as observed by the polling endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: Uuid,
    pub file_name: String,
    pub size_bytes: u64,
    pub state: UploadState,
    pub current_stage: String,
    pub progress_percent: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DocumentMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_tag: Option<String>,
}

/// Aggregate counts across the table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UploadStats {
    pub total: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Mutex-guarded `upload_id -> UploadJob` table.
#[derive(Debug, Default)]
pub struct UploadJobStore {
    jobs: Mutex<HashMap<Uuid, UploadJob>>,
}

impl UploadJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new job. Duplicate ids are rejected.
    pub fn create(&self, id: Uuid, file_name: &str, size_bytes: u64) -> Result<()> {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&id) {
            return Err(Error::validation(format!("upload job {id} already exists")));
        }
        let now = Utc::now();
        jobs.insert(
            id,
            UploadJob {
                id,
                file_name: file_name.to_string(),
                size_bytes,
                state: UploadState::Initiated,
                current_stage: "Initiated".to_string(),
                progress_percent: 0,
                created_at: now,
                updated_at: now,
                result: None,
                error_message: None,
                error_tag: None,
            },
        );
        Ok(())
    }

    /// Move a non-terminal job to an explicit non-terminal state.
    pub fn set_state(&self, id: Uuid, state: UploadState) -> Result<()> {
        self.mutate(id, |job| {
            if !state.is_terminal() {
                job.state = state;
            }
        })
    }

    /// Publish a stage label and progress percent.
    ///
    /// Percent is clamped to 100 and never regresses; a non-zero percent
    /// upgrades `INITIATED`/`SAVING` to `PROCESSING`.
    pub fn update_stage(&self, id: Uuid, stage: &str, percent: u8) -> Result<()> {
        self.mutate(id, |job| {
            let percent = percent.min(100);
            if percent < job.progress_percent {
                warn!(
                    upload_id = %id,
                    current = job.progress_percent,
                    requested = percent,
                    "ignoring progress regression"
                );
            } else {
                job.progress_percent = percent;
            }
            job.current_stage = stage.to_string();
            if job.progress_percent > 0
                && matches!(job.state, UploadState::Initiated | UploadState::Saving)
            {
                job.state = UploadState::Processing;
            }
        })
    }

    /// Record the terminal success payload.
    pub fn record_result(&self, id: Uuid, result: DocumentMetadata) -> Result<()> {
        self.mutate(id, |job| {
            job.state = UploadState::Completed;
            job.current_stage = "Completed".to_string();
            job.progress_percent = 100;
            job.result = Some(result);
        })
    }

    /// Record the terminal failure. Prior progress is preserved for
    /// debugging.
    pub fn record_error(&self, id: Uuid, message: &str, tag: &str) -> Result<()> {
        self.mutate(id, |job| {
            job.state = UploadState::Error;
            job.error_message = Some(message.to_string());
            job.error_tag = Some(tag.to_string());
        })
    }

    pub fn get(&self, id: Uuid) -> Option<UploadJob> {
        self.jobs.lock().get(&id).cloned()
    }

    pub fn list(&self) -> Vec<UploadJob> {
        let mut jobs: Vec<UploadJob> = self.jobs.lock().values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.jobs
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("upload job {id}")))
    }

    pub fn stats(&self) -> UploadStats {
        let jobs = self.jobs.lock();
        let mut stats = UploadStats {
            total: jobs.len(),
            ..UploadStats::default()
        };
        for job in jobs.values() {
            match job.state {
                UploadState::Completed => stats.completed += 1,
                UploadState::Error => stats.failed += 1,
                _ => stats.in_flight += 1,
            }
        }
        stats
    }

    /// Apply `f` under the lock. Terminal jobs are never mutated.
    fn mutate(&self, id: Uuid, f: impl FnOnce(&mut UploadJob)) -> Result<()> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("upload job {id}")))?;
        if job.state.is_terminal() {
            warn!(upload_id = %id, state = ?job.state, "ignoring update to terminal job");
            return Ok(());
        }
        f(job);
        job.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juriflow::documents::{DocumentType, ExtractionMethod};

    fn metadata(id: Uuid) -> DocumentMetadata {
        DocumentMetadata {
            id,
            name: "contract.pdf".into(),
            size_bytes: 2048,
            doc_type: DocumentType::PdfText,
            page_count: 5,
            method: ExtractionMethod::Text,
            ocr_avg_confidence: None,
            low_confidence_pages: Vec::new(),
            chunk_count: 3,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_get() {
        let store = UploadJobStore::new();
        let id = Uuid::new_v4();
        store.create(id, "contract.pdf", 2048).unwrap();

        let job = store.get(id).unwrap();
        assert_eq!(job.state, UploadState::Initiated);
        assert_eq!(job.progress_percent, 0);
        assert_eq!(job.file_name, "contract.pdf");
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let store = UploadJobStore::new();
        let id = Uuid::new_v4();
        store.create(id, "a.pdf", 1).unwrap();
        let err = store.create(id, "b.pdf", 2).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn progress_is_monotone() {
        let store = UploadJobStore::new();
        let id = Uuid::new_v4();
        store.create(id, "a.pdf", 1).unwrap();

        store.update_stage(id, "Extracting text", 35).unwrap();
        store.update_stage(id, "late update", 20).unwrap();
        let job = store.get(id).unwrap();
        assert_eq!(job.progress_percent, 35);
        // Stage label still advances even when percent is held.
        assert_eq!(job.current_stage, "late update");
    }

    #[test]
    fn percent_is_clamped() {
        let store = UploadJobStore::new();
        let id = Uuid::new_v4();
        store.create(id, "a.pdf", 1).unwrap();
        store.update_stage(id, "overshoot", 150).unwrap();
        assert_eq!(store.get(id).unwrap().progress_percent, 100);
    }

    #[test]
    fn nonzero_percent_upgrades_to_processing() {
        let store = UploadJobStore::new();
        let id = Uuid::new_v4();
        store.create(id, "a.pdf", 1).unwrap();
        store.set_state(id, UploadState::Saving).unwrap();
        store.update_stage(id, "Saving file on server", 10).unwrap();
        assert_eq!(store.get(id).unwrap().state, UploadState::Processing);
    }

    #[test]
    fn completed_jobs_are_frozen() {
        let store = UploadJobStore::new();
        let id = Uuid::new_v4();
        store.create(id, "a.pdf", 1).unwrap();
        store.record_result(id, metadata(Uuid::new_v4())).unwrap();

        store.update_stage(id, "late stage", 10).unwrap();
        store.record_error(id, "late failure", "upstream").unwrap();

        let job = store.get(id).unwrap();
        assert_eq!(job.state, UploadState::Completed);
        assert_eq!(job.progress_percent, 100);
        assert!(job.error_message.is_none());
        assert!(job.result.is_some());
    }

    #[test]
    fn error_preserves_prior_progress() {
        let store = UploadJobStore::new();
        let id = Uuid::new_v4();
        store.create(id, "a.pdf", 1).unwrap();
        store.update_stage(id, "Embedding 40 chunks", 70).unwrap();
        store.record_error(id, "rate limited", "rate_limit").unwrap();

        let job = store.get(id).unwrap();
        assert_eq!(job.state, UploadState::Error);
        assert_eq!(job.progress_percent, 70);
        assert_eq!(job.error_tag.as_deref(), Some("rate_limit"));
    }

    #[test]
    fn unknown_job_is_not_found() {
        let store = UploadJobStore::new();
        let err = store.update_stage(Uuid::new_v4(), "x", 1).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn delete_removes_job() {
        let store = UploadJobStore::new();
        let id = Uuid::new_v4();
        store.create(id, "a.pdf", 1).unwrap();
        store.delete(id).unwrap();
        assert!(store.get(id).is_none());
        assert!(store.delete(id).is_err());
    }

    #[test]
    fn stats_bucket_by_state() {
        let store = UploadJobStore::new();
        let done = Uuid::new_v4();
        let failed = Uuid::new_v4();
        let running = Uuid::new_v4();
        store.create(done, "a.pdf", 1).unwrap();
        store.create(failed, "b.pdf", 1).unwrap();
        store.create(running, "c.pdf", 1).unwrap();
        store.record_result(done, metadata(Uuid::new_v4())).unwrap();
        store.record_error(failed, "boom", "upstream").unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.in_flight, 1);
    }

    #[test]
    fn list_is_sorted_by_creation() {
        let store = UploadJobStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store.create(first, "a.pdf", 1).unwrap();
        store.create(second, "b.pdf", 1).unwrap();
        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first);
    }
}
