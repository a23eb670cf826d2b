//! Employee submission workflow.
//!
//! Sequences the four side effects of one enrollment: photo upload,
//! signature upload, directory insert, roster append. The photo upload is
//! memoized by content hash so a client retry after a downstream failure
//! does not re-upload; the directory insert's compensation deletes the row
//! before the photo's compensation deletes the asset (LIFO), so no row is
//! ever left referencing a deleted asset.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};

use workpass_types::enrollment::{EmployeeRecord, EmployeeSubmission, EnrollmentReceipt};

use crate::cache::{DurableCacheStore, ResultCache};
use crate::transaction::{StepRequest, Transaction, TransactionError};

use super::{AssetStorage, EmployeeDirectory, RosterSheet, WorkflowFailure, content_hash};

const WORKFLOW: &str = "employee_submission";

/// Drives the employee submission workflow against the collaborator ports.
pub struct EnrollmentService<S, A, D, R>
where
    S: DurableCacheStore,
    A: AssetStorage,
    D: EmployeeDirectory,
    R: RosterSheet,
{
    cache: Arc<ResultCache<S>>,
    storage: Arc<A>,
    directory: Arc<D>,
    roster: Arc<R>,
}

impl<S, A, D, R> EnrollmentService<S, A, D, R>
where
    S: DurableCacheStore,
    A: AssetStorage + 'static,
    D: EmployeeDirectory + 'static,
    R: RosterSheet + 'static,
{
    pub fn new(
        cache: Arc<ResultCache<S>>,
        storage: Arc<A>,
        directory: Arc<D>,
        roster: Arc<R>,
    ) -> Self {
        Self {
            cache,
            storage,
            directory,
            roster,
        }
    }

    /// Submit one enrollment.
    ///
    /// Critical steps: `upload_photo`, `insert_employee`. Non-critical:
    /// `upload_signature`, `append_roster` -- their failure degrades the
    /// receipt (`None` fields) without blocking the enrollment. On a
    /// critical failure the completed steps are rolled back and the
    /// failure carries the transaction summary.
    pub async fn submit(
        &self,
        submission: EmployeeSubmission,
    ) -> Result<EnrollmentReceipt, WorkflowFailure> {
        let context = HashMap::from([
            ("applicant".to_string(), json!(submission.full_name)),
            ("branch".to_string(), json!(submission.branch)),
        ]);

        let storage = Arc::clone(&self.storage);
        let directory = Arc::clone(&self.directory);
        let roster = Arc::clone(&self.roster);

        let run = Transaction::run(
            WORKFLOW,
            context,
            Arc::clone(&self.cache),
            move |txn: &mut Transaction<S>| {
                Box::pin(submit_steps(txn, storage, directory, roster, submission))
            },
        )
        .await;

        match run {
            Ok((committed, summary)) => Ok(EnrollmentReceipt {
                employee_id: committed.employee_id,
                photo_url: committed.photo_url,
                signature_url: committed.signature_url,
                roster_ref: committed.roster_ref,
                transaction: summary,
            }),
            Err(failure) => Err(WorkflowFailure {
                workflow: WORKFLOW.to_string(),
                source: failure.error,
                summary: failure.summary,
                rollback: failure.rollback,
            }),
        }
    }
}

/// What the step sequence produced, before the summary is attached.
struct CommittedSubmission {
    employee_id: i64,
    photo_url: String,
    signature_url: Option<String>,
    roster_ref: Option<String>,
}

async fn submit_steps<S, A, D, R>(
    txn: &mut Transaction<S>,
    storage: Arc<A>,
    directory: Arc<D>,
    roster: Arc<R>,
    submission: EmployeeSubmission,
) -> Result<CommittedSubmission, TransactionError>
where
    S: DurableCacheStore,
    A: AssetStorage + 'static,
    D: EmployeeDirectory + 'static,
    R: RosterSheet + 'static,
{
    let photo_hash = content_hash(&submission.photo);

    // 1. Photo upload: cached by content hash, compensated by deleting the
    //    uploaded asset.
    let photo_bytes = submission.photo.clone();
    let photo_name = format!("photos/{photo_hash}.jpg");
    let upload_storage = Arc::clone(&storage);
    let delete_storage = Arc::clone(&storage);
    let photo_url = txn
        .execute_step(
            StepRequest::new("upload_photo", move || async move {
                let url = upload_storage.upload(&photo_name, &photo_bytes).await?;
                Ok(json!(url))
            })
            .rollback(move |result| async move {
                if let Some(url) = result.as_str() {
                    delete_storage.delete(url).await?;
                }
                Ok(())
            })
            .cache_key(format!("photo:{photo_hash}"))
            .error_message("photo upload failed"),
        )
        .await?;
    let photo_url = as_string(&photo_url);

    // 2. Signature upload: tolerated failure, no compensation (an orphaned
    //    signature image is harmless).
    let signature_url = match submission.signature.clone() {
        None => None,
        Some(signature) => {
            let sig_name = format!("signatures/{photo_hash}.png");
            let sig_storage = Arc::clone(&storage);
            txn.execute_step(
                StepRequest::new("upload_signature", move || async move {
                    let url = sig_storage.upload(&sig_name, &signature).await?;
                    Ok(json!(url))
                })
                .non_critical(),
            )
            .await?
            .as_ref()
            .and_then(Value::as_str)
            .map(str::to_string)
        }
    };

    // 3. Directory insert: compensated by deleting the row. Runs after the
    //    uploads so its rollback runs before theirs.
    let record = EmployeeRecord {
        full_name: submission.full_name.clone(),
        email: submission.email.clone(),
        department: submission.department.clone(),
        branch: submission.branch.clone(),
        photo_url: photo_url.clone(),
        signature_url: signature_url.clone(),
    };
    let insert_record = record.clone();
    let insert_directory = Arc::clone(&directory);
    let delete_directory = Arc::clone(&directory);
    let employee_id = txn
        .execute_step(
            StepRequest::new("insert_employee", move || async move {
                let id = insert_directory.insert(&insert_record).await?;
                Ok(json!(id))
            })
            .rollback(move |result| async move {
                if let Some(id) = result.as_i64() {
                    delete_directory.delete(id).await?;
                }
                Ok(())
            })
            .error_message("employee record could not be saved"),
        )
        .await?;
    let employee_id = employee_id
        .as_ref()
        .and_then(Value::as_i64)
        .unwrap_or_default();

    // 4. Roster append: tolerated failure, the row can be backfilled from
    //    the directory later.
    let roster_record = record;
    let roster_ref = txn
        .execute_step(
            StepRequest::new("append_roster", move || async move {
                let row = roster.append(employee_id, &roster_record).await?;
                Ok(json!(row))
            })
            .non_critical(),
        )
        .await?
        .as_ref()
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(CommittedSubmission {
        employee_id,
        photo_url,
        signature_url,
        roster_ref,
    })
}

fn as_string(value: &Option<Value>) -> String {
    value
        .as_ref()
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use anyhow::anyhow;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use workpass_types::transaction::{StepStatus, TransactionStatus};

    // -----------------------------------------------------------------------
    // In-memory collaborator fakes
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct FakeStorage {
        uploads: AtomicUsize,
        deleted: Mutex<Vec<String>>,
        fail_signature: AtomicBool,
    }

    impl AssetStorage for FakeStorage {
        async fn upload(&self, name: &str, _bytes: &[u8]) -> anyhow::Result<String> {
            if name.starts_with("signatures/") && self.fail_signature.load(Ordering::SeqCst) {
                return Err(anyhow!("bucket unavailable"));
            }
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://cdn.example/{name}"))
        }

        async fn delete(&self, url: &str) -> anyhow::Result<()> {
            self.deleted.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDirectory {
        fail: AtomicBool,
        deleted: Mutex<Vec<i64>>,
    }

    impl EmployeeDirectory for FakeDirectory {
        async fn insert(&self, _record: &EmployeeRecord) -> anyhow::Result<i64> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("DB full"));
            }
            Ok(42)
        }

        async fn delete(&self, employee_id: i64) -> anyhow::Result<()> {
            self.deleted.lock().unwrap().push(employee_id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRoster {
        fail: AtomicBool,
    }

    impl RosterSheet for FakeRoster {
        async fn append(
            &self,
            employee_id: i64,
            _record: &EmployeeRecord,
        ) -> anyhow::Result<String> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("sheet quota exceeded"));
            }
            Ok(format!("row:{employee_id}"))
        }
    }

    fn submission() -> EmployeeSubmission {
        EmployeeSubmission {
            full_name: "Mei Tanaka".to_string(),
            email: "mei@example.com".to_string(),
            department: "Facilities".to_string(),
            branch: "Osaka".to_string(),
            photo: vec![0xff, 0xd8, 0xff, 0xe0],
            signature: Some(vec![0x89, 0x50]),
        }
    }

    fn service(
        storage: Arc<FakeStorage>,
        directory: Arc<FakeDirectory>,
        roster: Arc<FakeRoster>,
    ) -> EnrollmentService<MemoryCacheStore, FakeStorage, FakeDirectory, FakeRoster> {
        EnrollmentService::new(
            Arc::new(ResultCache::new(MemoryCacheStore::new())),
            storage,
            directory,
            roster,
        )
    }

    #[tokio::test]
    async fn test_submit_commits_full_receipt() {
        let storage = Arc::new(FakeStorage::default());
        let svc = service(
            Arc::clone(&storage),
            Arc::new(FakeDirectory::default()),
            Arc::new(FakeRoster::default()),
        );

        let receipt = svc.submit(submission()).await.unwrap();

        assert_eq!(receipt.employee_id, 42);
        assert!(receipt.photo_url.starts_with("https://cdn.example/photos/"));
        assert!(receipt.signature_url.is_some());
        assert_eq!(receipt.roster_ref.as_deref(), Some("row:42"));
        assert_eq!(receipt.transaction.status, TransactionStatus::Committed);
        assert_eq!(receipt.transaction.total_steps, 4);
    }

    #[tokio::test]
    async fn test_failed_signature_upload_degrades_but_commits() {
        let storage = Arc::new(FakeStorage::default());
        storage.fail_signature.store(true, Ordering::SeqCst);
        let svc = service(
            Arc::clone(&storage),
            Arc::new(FakeDirectory::default()),
            Arc::new(FakeRoster::default()),
        );

        let receipt = svc.submit(submission()).await.unwrap();

        assert_eq!(receipt.employee_id, 42);
        assert!(receipt.signature_url.is_none());
        assert_eq!(receipt.transaction.status, TransactionStatus::Committed);
        let sig_step = receipt
            .transaction
            .steps
            .iter()
            .find(|s| s.name == "upload_signature")
            .unwrap();
        assert_eq!(sig_step.status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_directory_failure_rolls_back_photo_upload() {
        let storage = Arc::new(FakeStorage::default());
        let directory = Arc::new(FakeDirectory::default());
        directory.fail.store(true, Ordering::SeqCst);
        let svc = service(
            Arc::clone(&storage),
            Arc::clone(&directory),
            Arc::new(FakeRoster::default()),
        );

        let failure = svc.submit(submission()).await.unwrap_err();

        assert_eq!(failure.source.step(), Some("insert_employee"));
        assert_eq!(
            failure.source.to_string(),
            "employee record could not be saved"
        );
        assert_eq!(failure.summary.status, TransactionStatus::RolledBack);
        // The uploaded photo was deleted with the URL the upload returned.
        let deleted = storage.deleted.lock().unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].starts_with("https://cdn.example/photos/"));
        // No directory row was created, so none was deleted.
        assert!(directory.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_after_failure_reuses_cached_photo_upload() {
        let cache = Arc::new(ResultCache::new(MemoryCacheStore::new()));
        let storage = Arc::new(FakeStorage::default());
        let directory = Arc::new(FakeDirectory::default());
        let svc = EnrollmentService::new(
            Arc::clone(&cache),
            Arc::clone(&storage),
            Arc::clone(&directory),
            Arc::new(FakeRoster::default()),
        );

        // First attempt fails at the directory insert and rolls back, but
        // the photo result stays cached for the retry.
        directory.fail.store(true, Ordering::SeqCst);
        svc.submit(submission()).await.unwrap_err();
        // Photo + signature happened once each.
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 2);

        directory.fail.store(false, Ordering::SeqCst);
        let receipt = svc.submit(submission()).await.unwrap();

        assert_eq!(receipt.employee_id, 42);
        // Only the signature re-uploaded; the photo came from the cache.
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 3);
        let photo_step = receipt
            .transaction
            .steps
            .iter()
            .find(|s| s.name == "upload_photo")
            .unwrap();
        assert_eq!(photo_step.status, StepStatus::Cached);
        assert!(photo_step.from_cache);
        assert_eq!(receipt.transaction.cached_steps, 1);
    }

    #[tokio::test]
    async fn test_roster_failure_degrades_but_commits() {
        let roster = Arc::new(FakeRoster::default());
        roster.fail.store(true, Ordering::SeqCst);
        let svc = service(
            Arc::new(FakeStorage::default()),
            Arc::new(FakeDirectory::default()),
            Arc::clone(&roster),
        );

        let receipt = svc.submit(submission()).await.unwrap();

        assert_eq!(receipt.employee_id, 42);
        assert!(receipt.roster_ref.is_none());
        assert_eq!(receipt.transaction.status, TransactionStatus::Committed);
    }
}
