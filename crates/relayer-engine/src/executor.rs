use relayer_chain_rpc::abi::encode_call;
use relayer_chain_rpc::{ChainRpc, TxRequest};
use relayer_core::abi_value::AbiValue;
use relayer_core::error::{EncodingError, ExecutionError};
use relayer_core::model::Job;
use relayer_core::signature::ParsedSignature;
use std::sync::Arc;

/// Encodes, signs, submits, and confirms a destination-chain transaction for a job that has
/// reached `proof_ready`. One instance runs per destination chain.
pub struct Executor {
    pub rpc: Arc<dyn ChainRpc>,
    pub gas_multiplier: f64,
    pub confirmations: u64,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

impl Executor {
    pub async fn execute(&self, job: &Job) -> Result<String, ExecutionError> {
        let sig = ParsedSignature::parse(&job.dest_method_signature).map_err(|e| {
            ExecutionError::Encoding(EncodingError::MalformedSignature {
                signature: job.dest_method_signature.clone(),
                reason: e.to_string(),
            })
        })?;

        let values = select_values(&sig, job)?;
        let data = encode_call(&sig, &values)?;

        let mut tx = TxRequest {
            to: job.dest_address.clone(),
            data,
            gas_limit: None,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
        };

        let estimated = self.rpc.estimate_gas(&tx).await?;
        let with_margin = (estimated as f64 * self.gas_multiplier).floor() as u64;
        tx.gas_limit = Some(with_margin);

        let tx_hash = self.rpc.send_transaction(tx).await?;
        let receipt = self
            .rpc
            .wait_for_confirmations(&tx_hash, self.confirmations.max(1))
            .await?;

        if !receipt.status_success {
            return Err(ExecutionError::ExecutionReverted { tx_hash });
        }

        Ok(tx_hash)
    }
}

/// Selects one `AbiValue` per destination-method parameter, applying the special `proof`/`bytes`
/// rule, then the event-argument lookup, then a type-based zero-value fallback with a warning.
fn select_values(sig: &ParsedSignature, job: &Job) -> Result<Vec<AbiValue>, EncodingError> {
    let mut values = Vec::with_capacity(sig.params.len());
    for param in &sig.params {
        if param.name == "proof" && param.ty == "bytes" {
            let proof = job
                .proof_data
                .as_ref()
                .ok_or_else(|| EncodingError::MissingValue("proof".to_string()))?;
            values.push(AbiValue::Bytes(proof.proof.clone()));
            continue;
        }

        if let Some(value) = job.event_data.args.get(&param.name) {
            values.push(value.clone());
            continue;
        }

        tracing::warn!(
            job_id = job.id,
            parameter = %param.name,
            ty = %param.ty,
            "no value available for destination parameter, using zero-value fallback"
        );
        values.push(AbiValue::zero_value_for(&param.ty));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relayer_core::abi_value::DecodedEvent;
    use relayer_core::model::{JobStatus, ProofData};
    use std::collections::BTreeMap;

    fn job_with_args(args: BTreeMap<String, AbiValue>, proof: Option<ProofData>) -> Job {
        Job {
            id: 1,
            unique_id: "base:0xaa:0:arbitrum".to_string(),
            source_chain: "base".to_string(),
            source_tx_hash: "0xaa".to_string(),
            source_block_number: 1,
            dest_chain: "arbitrum".to_string(),
            dest_address: "0x0000000000000000000000000000000000000001".to_string(),
            dest_method: "relayValue".to_string(),
            dest_method_signature: "relayValue(bytes proof, string key, uint256 missingArg)".to_string(),
            mapping_name: "M".to_string(),
            event_data: DecodedEvent {
                name: "ValueSet".to_string(),
                args,
                block_number: 1,
                transaction_index: 0,
                log_index: 0,
            },
            proof_required: true,
            proof_data: proof,
            status: JobStatus::ProofReady,
            dest_tx_hash: None,
            retry_count: 0,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
            last_retry_at: None,
        }
    }

    #[test]
    fn select_values_uses_proof_bytes_event_arg_then_zero_fallback() {
        let mut args = BTreeMap::new();
        args.insert("key".to_string(), AbiValue::String("k".to_string()));
        let job = job_with_args(
            args,
            Some(ProofData {
                proof: vec![0xde, 0xad],
            }),
        );
        let sig = ParsedSignature::parse(&job.dest_method_signature).unwrap();
        let values = select_values(&sig, &job).unwrap();
        assert_eq!(values[0], AbiValue::Bytes(vec![0xde, 0xad]));
        assert_eq!(values[1], AbiValue::String("k".to_string()));
        assert_eq!(values[2], AbiValue::zero_value_for("uint256"));
    }

    #[test]
    fn select_values_errors_when_proof_missing() {
        let job = job_with_args(BTreeMap::new(), None);
        let sig = ParsedSignature::parse(&job.dest_method_signature).unwrap();
        let err = select_values(&sig, &job).unwrap_err();
        assert!(matches!(err, EncodingError::MissingValue(_)));
    }
}
