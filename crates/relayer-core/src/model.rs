use crate::abi_value::DecodedEvent;
use serde::{Deserialize, Serialize};

/// Per-chain configuration: endpoint, signing material, and the tuning knobs that govern
/// how aggressively the listener sweeps and the executor submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_endpoint: String,
    pub signing_key: String,
    pub poll_interval_ms: u64,
    pub confirmations: u64,
    pub gas_multiplier: f64,
    #[serde(default)]
    pub max_fee_per_gas: Option<String>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<String>,
}

/// The role a contract deployment plays on a given chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractRole {
    Source,
    Destination,
    Both,
}

impl ContractRole {
    pub fn is_source(self) -> bool {
        matches!(self, ContractRole::Source | ContractRole::Both)
    }

    pub fn is_destination(self) -> bool {
        matches!(self, ContractRole::Destination | ContractRole::Both)
    }
}

/// A contract deployed on one particular chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDeployment {
    pub name: String,
    pub chain: String,
    pub address: String,
    pub role: ContractRole,
}

/// The destination-resolution strategy attached to an event mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DestinationResolverSpec {
    Static {
        destinations: Vec<String>,
    },
    EventParameter {
        parameter_name: String,
        #[serde(default)]
        mapping: Option<std::collections::BTreeMap<String, String>>,
    },
    Custom {
        function_id: String,
    },
}

/// A single relay rule: binds a source event to a destination method call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMapping {
    pub name: String,
    pub source_contract: String,
    pub source_event_signature: String,
    pub destination_contract: String,
    pub destination_method_signature: String,
    pub destination_resolver: String,
    pub proof_required: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// The lifecycle state of a relay job. Transitions follow the state machine described in the
/// design document; nothing outside the job store mutates these values directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    ProofRequested,
    ProofReady,
    Executing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::ProofRequested => "proof_requested",
            JobStatus::ProofReady => "proof_ready",
            JobStatus::Executing => "executing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<JobStatus> {
        Some(match s {
            "pending" => JobStatus::Pending,
            "proof_requested" => JobStatus::ProofRequested,
            "proof_ready" => JobStatus::ProofReady,
            "executing" => JobStatus::Executing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => return None,
        })
    }
}

/// A durable relay job: the intent to invoke one destination method in response to one
/// observed source event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub unique_id: String,
    pub source_chain: String,
    pub source_tx_hash: String,
    pub source_block_number: u64,
    pub dest_chain: String,
    pub dest_address: String,
    pub dest_method: String,
    pub dest_method_signature: String,
    pub mapping_name: String,
    pub event_data: DecodedEvent,
    pub proof_required: bool,
    pub proof_data: Option<ProofData>,
    pub status: JobStatus,
    pub dest_tx_hash: Option<String>,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_retry_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// The raw bytes returned by the proof service for a job, base64-decoded on arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofData {
    #[serde(with = "proof_bytes_as_hex")]
    pub proof: Vec<u8>,
}

mod proof_bytes_as_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(d)?;
        let stripped = raw.strip_prefix("0x").unwrap_or(&raw);
        hex::decode(stripped).map_err(serde::de::Error::custom)
    }
}

/// The fields a job store accepts when first creating a job, before it has been assigned an id.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub unique_id: String,
    pub source_chain: String,
    pub source_tx_hash: String,
    pub source_block_number: u64,
    pub dest_chain: String,
    pub dest_address: String,
    pub dest_method: String,
    pub dest_method_signature: String,
    pub mapping_name: String,
    pub event_data: DecodedEvent,
    pub proof_required: bool,
}

/// A partial update applied atomically alongside a status transition.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub proof_data: Option<ProofData>,
    pub dest_tx_hash: Option<String>,
    pub error_message: Option<String>,
}

pub const MAX_RETRIES: u32 = 3;
pub const RETRY_COOLDOWN_SECS: i64 = 5;
pub const SCHEDULER_CONCURRENCY: usize = 5;
pub const SWEEP_BLOCK_CAP: u64 = 100;
