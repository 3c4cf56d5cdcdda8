use crate::executor::Executor;
use chrono::Utc;
use relayer_core::error::JobError;
use relayer_core::model::{
    Job, JobPatch, JobStatus, ProofData, MAX_RETRIES, RETRY_COOLDOWN_SECS, SCHEDULER_CONCURRENCY,
};
use relayer_proof_client::ProofApi;
use relayer_store::JobStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Drives every job through its state machine. Owns no long-term data itself; reads from and
/// writes back to the `JobStore` on a 1-second tick.
pub struct Queue {
    pub job_store: JobStore,
    pub proof_client: Arc<dyn ProofApi>,
    /// Executors keyed by destination chain name.
    pub executors: HashMap<String, Arc<Executor>>,
    /// Numeric chain ids keyed by source chain name, passed through to the proof API.
    pub source_chain_ids: HashMap<String, u64>,
    /// Chain RPC handles keyed by source chain name, used to translate a job's filter-local log
    /// index into the transaction receipt's global log index before requesting a proof.
    pub source_rpcs: HashMap<String, Arc<dyn relayer_chain_rpc::ChainRpc>>,
}

impl Queue {
    pub async fn run(&self, cancellation: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    tracing::info!("queue stopping");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "scheduler tick failed to read from the job store");
                    }
                }
            }
        }
    }

    async fn tick(&self) -> Result<(), JobError> {
        let mut work = self.job_store.find_pending()?;
        let retryable = self
            .job_store
            .find_retryable(MAX_RETRIES)?
            .into_iter()
            .filter(|j| self.cooldown_elapsed(j));
        work.extend(retryable);

        let batch: Vec<Job> = work.into_iter().take(SCHEDULER_CONCURRENCY).collect();
        let handlers = batch.into_iter().map(|job| self.dispatch(job));
        futures::future::join_all(handlers).await;
        Ok(())
    }

    fn cooldown_elapsed(&self, job: &Job) -> bool {
        match job.last_retry_at {
            Some(last) => Utc::now().signed_duration_since(last).num_seconds() >= RETRY_COOLDOWN_SECS,
            None => true,
        }
    }

    async fn dispatch(&self, job: Job) {
        let job_id = job.id;
        let result = match job.status {
            JobStatus::Pending => self.handle_pending(&job).await,
            JobStatus::ProofRequested => self.handle_pending(&job).await,
            JobStatus::ProofReady => self.handle_execute(&job).await,
            JobStatus::Failed => self.handle_retry(&job).await,
            JobStatus::Executing | JobStatus::Completed => Ok(()),
        };

        if let Err(e) = result {
            tracing::warn!(job_id, error = %e, "job handler failed, moving job to failed");
            if let Err(store_err) = self.job_store.update_status(
                job_id,
                JobStatus::Failed,
                JobPatch {
                    error_message: Some(e.to_string()),
                    ..Default::default()
                },
            ) {
                tracing::error!(job_id, error = %store_err, "failed to record job failure in the store");
            }
        }
    }

    async fn handle_pending(&self, job: &Job) -> Result<(), JobError> {
        if !job.proof_required {
            self.job_store
                .update_status(job.id, JobStatus::ProofReady, JobPatch::default())?;
            return Ok(());
        }

        self.job_store
            .update_status(job.id, JobStatus::ProofRequested, JobPatch::default())?;

        let global_log_index = self.resolve_global_log_index(job).await;
        let chain_id = *self
            .source_chain_ids
            .get(&job.source_chain)
            .ok_or_else(|| relayer_core::error::RpcError::Call {
                method: "resolve_chain_id".to_string(),
                reason: format!("unknown source chain '{}'", job.source_chain),
            })?;

        let proof_bytes = self
            .proof_client
            .request_proof(chain_id, job.source_block_number, global_log_index)
            .await?;

        self.job_store.update_status(
            job.id,
            JobStatus::ProofReady,
            JobPatch {
                proof_data: Some(ProofData { proof: proof_bytes }),
                ..Default::default()
            },
        )?;
        Ok(())
    }

    /// Translates the job's stored filter-local log index into the transaction receipt's
    /// absolute log index. Falls back to the stored index (with a warning) if the receipt
    /// cannot be fetched; this fallback is a known, accepted weakness against the proof API.
    async fn resolve_global_log_index(&self, job: &Job) -> u64 {
        let fallback = job.event_data.log_index;
        let Some(rpc) = self.source_rpcs.get(&job.source_chain) else {
            return fallback;
        };
        match rpc.get_transaction_receipt(&job.source_tx_hash).await {
            Ok(receipt) => receipt
                .logs
                .get(fallback as usize)
                .map(|l| l.log_index)
                .unwrap_or_else(|| {
                    tracing::warn!(job_id = job.id, "receipt had fewer logs than expected, using filter-local index");
                    fallback
                }),
            Err(e) => {
                tracing::warn!(job_id = job.id, error = %e, "could not fetch receipt for global log index translation, using filter-local index");
                fallback
            }
        }
    }

    async fn handle_execute(&self, job: &Job) -> Result<(), JobError> {
        self.job_store
            .update_status(job.id, JobStatus::Executing, JobPatch::default())?;

        let executor = self
            .executors
            .get(&job.dest_chain)
            .ok_or_else(|| relayer_core::error::RpcError::Call {
                method: "resolve_executor".to_string(),
                reason: format!("no executor configured for destination chain '{}'", job.dest_chain),
            })?;

        let tx_hash = executor.execute(job).await?;

        self.job_store.update_status(
            job.id,
            JobStatus::Completed,
            JobPatch {
                dest_tx_hash: Some(tx_hash),
                ..Default::default()
            },
        )?;
        Ok(())
    }

    /// Re-enters a failed job into the flow: back to `pending` if no proof has been obtained
    /// yet, otherwise straight to `proof_ready`. Always increments the retry counter.
    async fn handle_retry(&self, job: &Job) -> Result<(), JobError> {
        let next_status = if job.proof_required && job.proof_data.is_none() {
            JobStatus::Pending
        } else {
            JobStatus::ProofReady
        };
        self.job_store.increment_retry(job.id)?;
        self.job_store
            .update_status(job.id, next_status, JobPatch::default())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relayer_core::abi_value::DecodedEvent;
    use relayer_core::error::ProofClientError;
    use relayer_core::model::NewJob;
    use relayer_proof_client::ProofApi;
    use relayer_store::Database;
    use std::collections::BTreeMap;

    struct StubProofClient;

    #[async_trait]
    impl ProofApi for StubProofClient {
        async fn request_proof(
            &self,
            _source_chain_id: u64,
            _source_block_number: u64,
            _global_log_index: u64,
        ) -> Result<Vec<u8>, ProofClientError> {
            Ok(vec![0xca, 0xfe])
        }
    }

    fn sample_job_store(path: &std::path::Path) -> JobStore {
        let db = Database::open(path.to_str().unwrap()).unwrap();
        JobStore::new(db)
    }

    fn insert_job(store: &JobStore, proof_required: bool) -> i64 {
        store
            .create(NewJob {
                unique_id: "base:0xaa:2:arbitrum".to_string(),
                source_chain: "base".to_string(),
                source_tx_hash: "0xaa".to_string(),
                source_block_number: 1000,
                dest_chain: "arbitrum".to_string(),
                dest_address: "0xbb".to_string(),
                dest_method: "relayValue".to_string(),
                dest_method_signature: "relayValue(string key)".to_string(),
                mapping_name: "ValueRelay".to_string(),
                event_data: DecodedEvent {
                    name: "ValueSet".to_string(),
                    args: BTreeMap::new(),
                    block_number: 1000,
                    transaction_index: 0,
                    log_index: 2,
                },
                proof_required,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn handle_pending_requests_a_proof_when_required() {
        let dir = tempfile::tempdir().unwrap();
        let job_store = sample_job_store(&dir.path().join("jobs.sqlite"));
        let id = insert_job(&job_store, true);

        let queue = Queue {
            job_store: job_store.clone(),
            proof_client: Arc::new(StubProofClient),
            executors: HashMap::new(),
            source_chain_ids: HashMap::from([("base".to_string(), 8453)]),
            source_rpcs: HashMap::new(),
        };

        let job = job_store.find_by_unique_id("base:0xaa:2:arbitrum").unwrap().unwrap();
        queue.handle_pending(&job).await.unwrap();

        let job = job_store.find_by_unique_id("base:0xaa:2:arbitrum").unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::ProofReady);
        assert_eq!(job.proof_data.unwrap().proof, vec![0xca, 0xfe]);
    }

    #[tokio::test]
    async fn handle_pending_skips_proof_when_not_required() {
        let dir = tempfile::tempdir().unwrap();
        let job_store = sample_job_store(&dir.path().join("jobs.sqlite"));
        insert_job(&job_store, false);

        let queue = Queue {
            job_store: job_store.clone(),
            proof_client: Arc::new(StubProofClient),
            executors: HashMap::new(),
            source_chain_ids: HashMap::new(),
            source_rpcs: HashMap::new(),
        };

        let job = job_store.find_by_unique_id("base:0xaa:2:arbitrum").unwrap().unwrap();
        queue.handle_pending(&job).await.unwrap();

        let job = job_store.find_by_unique_id("base:0xaa:2:arbitrum").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::ProofReady);
        assert!(job.proof_data.is_none());
    }
}
