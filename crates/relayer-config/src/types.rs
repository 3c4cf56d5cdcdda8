use relayer_core::model::{ChainConfig, ContractDeployment, DestinationResolverSpec, EventMapping};
use serde::Deserialize;
use std::collections::BTreeMap;

/// The raw config tree as it is deserialized straight from the JSON file, before environment
/// substitution runs over its string leaves.
pub type RawConfig = serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ProofApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retry_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub enable_file_logging: bool,
    #[serde(default)]
    pub log_path: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The fully resolved, strongly typed configuration the relayer runs with.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayerConfig {
    pub chains: Vec<ChainConfig>,
    pub contracts: Vec<ContractDeployment>,
    #[serde(rename = "eventMappings")]
    pub event_mappings: Vec<EventMapping>,
    #[serde(rename = "destinationResolvers")]
    pub destination_resolvers: BTreeMap<String, DestinationResolverSpec>,
    #[serde(rename = "proofApi")]
    pub proof_api: ProofApiConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}
