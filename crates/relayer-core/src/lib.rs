#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Shared domain types for the relayer: the job state machine, chain/contract/mapping
//! configuration shapes, the tagged ABI value union, the human-readable signature parser, and
//! the crate-local error taxonomy every other relayer crate builds on.

pub mod abi_value;
pub mod error;
pub mod model;
pub mod signature;

pub use abi_value::{AbiValue, DecodedEvent};
pub use error::{
    ConfigError, EncodingError, ExecutionError, JobError, ProofClientError, ResolverError,
    RpcError, StoreError,
};
pub use model::{
    ChainConfig, ContractDeployment, ContractRole, DestinationResolverSpec, EventMapping, Job,
    JobPatch, JobStatus, NewJob, ProofData, MAX_RETRIES, RETRY_COOLDOWN_SECS,
    SCHEDULER_CONCURRENCY, SWEEP_BLOCK_CAP,
};
pub use signature::{ParsedSignature, SignatureParam};
