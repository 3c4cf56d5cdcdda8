use crate::db::Database;
use chrono::{DateTime, Utc};
use relayer_core::error::StoreError;
use relayer_core::model::{Job, JobPatch, JobStatus, NewJob, ProofData};
use rusqlite::{params, OptionalExtension, Row};

/// The durable store backing the job state machine. All mutation goes through `create`,
/// `update_status`, and `increment_retry`; nothing else writes to the `jobs` table.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> JobStore {
        JobStore { db }
    }

    /// Inserts a new job in `pending` status. Returns `StoreError::Duplicate` if `unique_id`
    /// already exists; callers treat that as an idempotent no-op, not a fatal error.
    pub fn create(&self, job: NewJob) -> Result<i64, StoreError> {
        let conn = self.db.connection();
        let conn = conn.lock().expect("job store mutex poisoned");
        let event_data_json = serde_json::to_string(&job.event_data)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let result = conn.execute(
            "INSERT INTO jobs (
                unique_id, source_chain, source_tx_hash, source_block_number,
                dest_chain, dest_address, dest_method, dest_method_signature,
                mapping_name, event_data, proof_required, status, retry_count, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13)",
            params![
                job.unique_id,
                job.source_chain,
                job.source_tx_hash,
                job.source_block_number as i64,
                job.dest_chain,
                job.dest_address,
                job.dest_method,
                job.dest_method_signature,
                job.mapping_name,
                event_data_json,
                job.proof_required as i64,
                JobStatus::Pending.as_str(),
                now,
            ],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate(job.unique_id))
            }
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    /// Atomically transitions `id` to `new_status`, applying `patch` in the same statement.
    /// Setting `new_status = Completed` also stamps `completed_at`; every call stamps
    /// `last_retry_at` so the retry-cooldown query has a consistent clock to compare against.
    pub fn update_status(
        &self,
        id: i64,
        new_status: JobStatus,
        patch: JobPatch,
    ) -> Result<(), StoreError> {
        let conn = self.db.connection();
        let conn = conn.lock().expect("job store mutex poisoned");
        let now = Utc::now().to_rfc3339();
        let completed_at = if new_status == JobStatus::Completed {
            Some(now.clone())
        } else {
            None
        };
        let proof_json = patch
            .proof_data
            .map(|p| serde_json::to_string(&p))
            .transpose()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let changed = conn
            .execute(
                "UPDATE jobs SET
                    status = ?1,
                    proof_data = COALESCE(?2, proof_data),
                    dest_tx_hash = COALESCE(?3, dest_tx_hash),
                    error_message = COALESCE(?4, error_message),
                    completed_at = COALESCE(?5, completed_at),
                    last_retry_at = ?6
                 WHERE id = ?7",
                params![
                    new_status.as_str(),
                    proof_json,
                    patch.dest_tx_hash,
                    patch.error_message,
                    completed_at,
                    now,
                    id,
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    pub fn increment_retry(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.db.connection();
        let conn = conn.lock().expect("job store mutex poisoned");
        let now = Utc::now().to_rfc3339();
        let changed = conn
            .execute(
                "UPDATE jobs SET retry_count = retry_count + 1, last_retry_at = ?1 WHERE id = ?2",
                params![now, id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    pub fn find_by_unique_id(&self, unique_id: &str) -> Result<Option<Job>, StoreError> {
        let conn = self.db.connection();
        let conn = conn.lock().expect("job store mutex poisoned");
        conn.query_row(
            &format!("{} WHERE unique_id = ?1", SELECT_JOB),
            [unique_id],
            row_to_job,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))?
        .transpose()
    }

    pub fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let conn = self.db.connection();
        let conn = conn.lock().expect("job store mutex poisoned");
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE status = ?1 ORDER BY created_at ASC",
                SELECT_JOB
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([status.as_str()], row_to_job)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        collect_jobs(rows)
    }

    /// `status IN (pending, proof_requested, proof_ready)`, oldest first.
    pub fn find_pending(&self) -> Result<Vec<Job>, StoreError> {
        let conn = self.db.connection();
        let conn = conn.lock().expect("job store mutex poisoned");
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE status IN ('pending', 'proof_requested', 'proof_ready')
                 ORDER BY created_at ASC",
                SELECT_JOB
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt.query_map([], row_to_job).map_err(|e| StoreError::Database(e.to_string()))?;
        collect_jobs(rows)
    }

    /// `status = failed AND retry_count < max_retries`, ordered by `last_retry_at` ascending.
    pub fn find_retryable(&self, max_retries: u32) -> Result<Vec<Job>, StoreError> {
        let conn = self.db.connection();
        let conn = conn.lock().expect("job store mutex poisoned");
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE status = 'failed' AND retry_count < ?1
                 ORDER BY last_retry_at ASC",
                SELECT_JOB
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([max_retries], row_to_job)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        collect_jobs(rows)
    }
}

const SELECT_JOB: &str = "SELECT
    id, unique_id, source_chain, source_tx_hash, source_block_number,
    dest_chain, dest_address, dest_method, dest_method_signature,
    mapping_name, event_data, proof_required, proof_data, status,
    dest_tx_hash, retry_count, error_message, created_at, completed_at, last_retry_at
FROM jobs";

fn collect_jobs(
    rows: impl Iterator<Item = rusqlite::Result<Result<Job, StoreError>>>,
) -> Result<Vec<Job>, StoreError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StoreError::Database(e.to_string()))??);
    }
    Ok(out)
}

fn row_to_job(row: &Row) -> rusqlite::Result<Result<Job, StoreError>> {
    Ok((|| -> Result<Job, StoreError> {
        let event_data_json: String = row.get(10)?;
        let proof_data_json: Option<String> = row.get(12)?;
        let status_str: String = row.get(13)?;
        let created_at: String = row.get(17)?;
        let completed_at: Option<String> = row.get(18)?;
        let last_retry_at: Option<String> = row.get(19)?;

        Ok(Job {
            id: row.get(0)?,
            unique_id: row.get(1)?,
            source_chain: row.get(2)?,
            source_tx_hash: row.get(3)?,
            source_block_number: row.get::<_, i64>(4)? as u64,
            dest_chain: row.get(5)?,
            dest_address: row.get(6)?,
            dest_method: row.get(7)?,
            dest_method_signature: row.get(8)?,
            mapping_name: row.get(9)?,
            event_data: serde_json::from_str(&event_data_json)
                .map_err(|e| StoreError::Database(e.to_string()))?,
            proof_required: row.get::<_, i64>(11)? != 0,
            proof_data: proof_data_json
                .map(|s| serde_json::from_str::<ProofData>(&s))
                .transpose()
                .map_err(|e| StoreError::Database(e.to_string()))?,
            status: JobStatus::from_str(&status_str)
                .ok_or_else(|| StoreError::Database(format!("unknown status '{status_str}'")))?,
            dest_tx_hash: row.get(14)?,
            retry_count: row.get::<_, i64>(15)? as u32,
            error_message: row.get(16)?,
            created_at: parse_timestamp(&created_at)?,
            completed_at: completed_at.map(|s| parse_timestamp(&s)).transpose()?,
            last_retry_at: last_retry_at.map(|s| parse_timestamp(&s)).transpose()?,
        })
    })())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayer_core::abi_value::DecodedEvent;
    use std::collections::BTreeMap;

    fn sample_job(unique_id: &str) -> NewJob {
        NewJob {
            unique_id: unique_id.to_string(),
            source_chain: "base".to_string(),
            source_tx_hash: "0xaa".to_string(),
            source_block_number: 1000,
            dest_chain: "arbitrum".to_string(),
            dest_address: "0xbb".to_string(),
            dest_method: "relayValue".to_string(),
            dest_method_signature: "relayValue(bytes proof, string key)".to_string(),
            mapping_name: "ValueRelay".to_string(),
            event_data: DecodedEvent {
                name: "ValueSet".to_string(),
                args: BTreeMap::new(),
                block_number: 1000,
                transaction_index: 0,
                log_index: 2,
            },
            proof_required: true,
        }
    }

    #[test]
    fn create_then_find_by_unique_id() {
        let store = JobStore::new(Database::open_in_memory().unwrap());
        let id = store.create(sample_job("base:0xaa:2:arbitrum")).unwrap();
        let found = store.find_by_unique_id("base:0xaa:2:arbitrum").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.status, JobStatus::Pending);
        assert_eq!(found.retry_count, 0);
    }

    #[test]
    fn duplicate_unique_id_is_rejected() {
        let store = JobStore::new(Database::open_in_memory().unwrap());
        store.create(sample_job("base:0xaa:2:arbitrum")).unwrap();
        let err = store.create(sample_job("base:0xaa:2:arbitrum")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn update_status_sets_completed_at_only_on_completion() {
        let store = JobStore::new(Database::open_in_memory().unwrap());
        let id = store.create(sample_job("base:0xaa:2:arbitrum")).unwrap();
        store
            .update_status(id, JobStatus::ProofRequested, JobPatch::default())
            .unwrap();
        let job = store.find_by_unique_id("base:0xaa:2:arbitrum").unwrap().unwrap();
        assert!(job.completed_at.is_none());

        store
            .update_status(
                id,
                JobStatus::Completed,
                JobPatch {
                    dest_tx_hash: Some("0xdd".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let job = store.find_by_unique_id("base:0xaa:2:arbitrum").unwrap().unwrap();
        assert!(job.completed_at.is_some());
        assert_eq!(job.dest_tx_hash.as_deref(), Some("0xdd"));
    }

    #[test]
    fn find_retryable_respects_max_retries_boundary() {
        let store = JobStore::new(Database::open_in_memory().unwrap());
        let id = store.create(sample_job("base:0xaa:2:arbitrum")).unwrap();
        store.update_status(id, JobStatus::Failed, JobPatch::default()).unwrap();
        store.increment_retry(id).unwrap();
        store.increment_retry(id).unwrap();
        store.increment_retry(id).unwrap();

        let retryable = store.find_retryable(3).unwrap();
        assert!(retryable.is_empty(), "retry_count == max_retries must be excluded");

        let retryable = store.find_retryable(4).unwrap();
        assert_eq!(retryable.len(), 1);
    }

    #[test]
    fn find_pending_includes_only_pre_execution_statuses() {
        let store = JobStore::new(Database::open_in_memory().unwrap());
        let pending_id = store.create(sample_job("base:0xaa:2:arbitrum")).unwrap();
        let other_id = store.create(sample_job("base:0xaa:3:arbitrum")).unwrap();
        store
            .update_status(other_id, JobStatus::Completed, JobPatch::default())
            .unwrap();

        let pending = store.find_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, pending_id);
    }
}
