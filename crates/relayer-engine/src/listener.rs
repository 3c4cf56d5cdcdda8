use crate::{ContractDirectory, MappingContext};
use relayer_chain_rpc::abi::{decode_log, topic0};
use relayer_chain_rpc::ChainRpc;
use relayer_core::abi_value::DecodedEvent;
use relayer_core::error::JobError;
use relayer_core::model::{ChainConfig, NewJob, SWEEP_BLOCK_CAP};
use relayer_core::signature::ParsedSignature;
use relayer_resolver::{resolve, ResolverRegistry};
use relayer_store::{ChainStore, JobStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sweeps finalised blocks on a single source chain, decodes matching events, resolves their
/// destinations, and writes new relay jobs. One instance runs per configured chain.
pub struct Listener {
    pub chain: ChainConfig,
    pub rpc: Arc<dyn ChainRpc>,
    pub chain_store: ChainStore,
    pub job_store: JobStore,
    pub mappings: Vec<MappingContext>,
    pub resolver_registry: Arc<ResolverRegistry>,
    pub contracts: Arc<ContractDirectory>,
}

impl Listener {
    pub async fn run(&self, cancellation: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    tracing::info!(chain = %self.chain.name, "listener stopping");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(self.chain.poll_interval_ms)) => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::warn!(chain = %self.chain.name, error = %e, "sweep tick failed, will retry next tick");
                    }
                }
            }
        }
    }

    async fn sweep_once(&self) -> Result<(), JobError> {
        let head = self.rpc.get_head_block().await?;
        let safe = head.saturating_sub(self.chain.confirmations);

        let last = match self.chain_store.get_last_processed(&self.chain.name)? {
            0 => {
                tracing::info!(
                    chain = %self.chain.name,
                    seeded_at = safe,
                    "no persisted sweep cursor, seeding to head - confirmations"
                );
                self.chain_store.set_last_processed(&self.chain.name, safe)?;
                safe
            }
            last => last,
        };

        if safe <= last {
            return Ok(());
        }

        let from = last + 1;
        let to = safe.min(from + SWEEP_BLOCK_CAP - 1);

        for ctx in &self.mappings {
            self.sweep_mapping(ctx, from, to).await?;
        }

        self.chain_store.set_last_processed(&self.chain.name, to)?;
        Ok(())
    }

    async fn sweep_mapping(&self, ctx: &MappingContext, from: u64, to: u64) -> Result<(), JobError> {
        let event_sig = ParsedSignature::parse(&ctx.mapping.source_event_signature)
            .map_err(|_| relayer_core::error::RpcError::Call {
                method: "parse_event_signature".to_string(),
                reason: ctx.mapping.source_event_signature.clone(),
            })?;
        let topic = topic0(&event_sig);

        let logs = self
            .rpc
            .get_logs(from, to, &ctx.source_address, &topic)
            .await?;

        for log in logs {
            let args = match decode_log(&event_sig.params, &log.topics, &log.data) {
                Ok(args) => args,
                Err(e) => {
                    tracing::warn!(
                        chain = %self.chain.name,
                        mapping = %ctx.mapping.name,
                        tx_hash = %log.transaction_hash,
                        error = %e,
                        "failed to decode event log, skipping"
                    );
                    continue;
                }
            };

            let event = DecodedEvent {
                name: event_sig.name.clone(),
                args,
                block_number: log.block_number,
                transaction_index: log.transaction_index,
                log_index: log.log_index_in_filter,
            };

            let destinations = match resolve(
                &ctx.resolver_spec,
                &event,
                &self.chain.name,
                &self.resolver_registry,
            ) {
                Ok(dests) => dests,
                Err(e) => {
                    tracing::warn!(
                        chain = %self.chain.name,
                        mapping = %ctx.mapping.name,
                        error = %e,
                        "resolver failed for observed event, no job created"
                    );
                    continue;
                }
            };

            for dest_chain in destinations {
                self.create_job(ctx, &log.transaction_hash, log.block_number, &event, &dest_chain)?;
            }
        }
        Ok(())
    }

    fn create_job(
        &self,
        ctx: &MappingContext,
        tx_hash: &str,
        block_number: u64,
        event: &DecodedEvent,
        dest_chain: &str,
    ) -> Result<(), JobError> {
        let unique_id = format!(
            "{}:{}:{}:{}",
            self.chain.name, tx_hash, event.log_index, dest_chain
        );

        if self.job_store.find_by_unique_id(&unique_id)?.is_some() {
            return Ok(());
        }

        let Some(dest_address) = self
            .contracts
            .address_for(&ctx.mapping.destination_contract, dest_chain)
        else {
            tracing::warn!(
                mapping = %ctx.mapping.name,
                dest_chain,
                "destination contract is not deployed on the resolved chain, no job created"
            );
            return Ok(());
        };

        let new_job = NewJob {
            unique_id: unique_id.clone(),
            source_chain: self.chain.name.clone(),
            source_tx_hash: tx_hash.to_string(),
            source_block_number: block_number,
            dest_chain: dest_chain.to_string(),
            dest_address: dest_address.to_string(),
            dest_method: ctx.dest_method_name.clone(),
            dest_method_signature: ctx.mapping.destination_method_signature.clone(),
            mapping_name: ctx.mapping.name.clone(),
            event_data: event.clone(),
            proof_required: ctx.mapping.proof_required,
        };

        match self.job_store.create(new_job) {
            Ok(id) => {
                tracing::info!(job_id = id, unique_id = %unique_id, "created relay job");
                Ok(())
            }
            Err(relayer_core::error::StoreError::Duplicate(_)) => Ok(()),
            Err(e) => Err(relayer_core::error::JobError::Store(e)),
        }
    }
}
