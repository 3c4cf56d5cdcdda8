use thiserror::Error;

/// Errors raised while loading or validating configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chain '{0}' referenced by a mapping is not defined")]
    UnknownChain(String),

    #[error("resolver '{0}' referenced by a mapping is not defined")]
    UnknownResolver(String),

    #[error("malformed method/event signature '{signature}': {reason}")]
    MalformedSignature { signature: String, reason: String },

    #[error("{0} unresolved reference(s) found during startup validation: {1}")]
    Aggregated(usize, String),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from a chain RPC provider. Non-fatal; the caller retries on the next tick.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc call '{method}' failed: {reason}")]
    Call { method: String, reason: String },

    #[error("transport error contacting chain endpoint: {0}")]
    Transport(String),

    #[error("receipt not found for transaction {0}")]
    ReceiptNotFound(String),
}

/// Errors from destination resolution. A single unresolved event produces a warning, not
/// a fatal error.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("event parameter '{0}' is missing from the decoded event")]
    MissingParameter(String),

    #[error("no custom resolver function registered under id '{0}'")]
    UnknownFunction(String),
}

/// Errors from the two-phase proof retrieval protocol.
#[derive(Debug, Error)]
pub enum ProofClientError {
    #[error("proof request failed after retries: {0}")]
    ProofRequestFailed(String),

    #[error("proof polling exceeded the maximum number of attempts")]
    ProofPollingTimeout,

    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors while encoding a destination method call from event data.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("malformed method signature '{signature}': {reason}")]
    MalformedSignature { signature: String, reason: String },

    #[error("no value available for parameter '{0}' and no zero-value fallback exists")]
    MissingValue(String),

    #[error("value for parameter '{name}' cannot be coerced to type '{ty}'")]
    TypeMismatch { name: String, ty: String },
}

/// Errors while submitting and confirming a destination-chain transaction.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("destination transaction {tx_hash} reverted")]
    ExecutionReverted { tx_hash: String },

    #[error("gas estimation failed: {0}")]
    GasEstimation(String),
}

/// Errors from the durable job/chain-state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a job with unique_id '{0}' already exists")]
    Duplicate(String),

    #[error("job {0} not found")]
    NotFound(i64),

    #[error("underlying database error: {0}")]
    Database(String),
}

/// The error kinds a job handler can terminate with. Every variant here is retryable under
/// the standard budget (see the queue's retry policy); the taxonomy exists for diagnostics,
/// not to special-case retry behavior.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    ProofClient(#[from] ProofClientError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
