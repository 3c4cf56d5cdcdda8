mod cli;
mod shutdown;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use relayer_chain_rpc::{ChainRpc, EvmChainRpc};
use relayer_core::signature::ParsedSignature;
use relayer_engine::{ContractDirectory, Executor, Listener, MappingContext, Queue};
use relayer_proof_client::{JsonRpcProofClient, ProofClientConfig};
use relayer_resolver::ResolverRegistry;
use relayer_store::{ChainStore, Database, JobStore};
use shutdown::ShutdownController;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = relayer_config::load_config(&cli.config_path)
        .with_context(|| format!("loading configuration from {}", cli.config_path.display()))?;

    init_logging(&cli, &config.logging)?;

    let database_path = cli
        .database_path
        .clone()
        .unwrap_or_else(|| config.database.path.clone());
    let db = Database::open(&database_path).context("opening the relayer database")?;
    let chain_store = ChainStore::new(db.clone());
    let job_store = JobStore::new(db);

    let registry = ResolverRegistry::new();
    let unresolved = registry.validate(config.destination_resolvers.values());
    if !unresolved.is_empty() {
        anyhow::bail!(
            "no custom resolver function registered for: {}",
            unresolved.join(", ")
        );
    }
    let registry = Arc::new(registry);

    let contracts = Arc::new(ContractDirectory::new(config.contracts.clone()));

    let mut rpcs: HashMap<String, Arc<dyn ChainRpc>> = HashMap::new();
    let mut chain_ids = HashMap::new();
    for chain in &config.chains {
        let rpc = EvmChainRpc::connect(&chain.rpc_endpoint, &chain.signing_key, chain.chain_id)
            .await
            .with_context(|| format!("connecting to chain '{}'", chain.name))?;
        rpcs.insert(chain.name.clone(), Arc::new(rpc));
        chain_ids.insert(chain.name.clone(), chain.chain_id);
    }

    let proof_client = Arc::new(JsonRpcProofClient::new(ProofClientConfig {
        base_url: config.proof_api.base_url.clone(),
        timeout_ms: config.proof_api.timeout_ms,
        retry_attempts: config.proof_api.retry_attempts,
        api_key: config.proof_api.api_key.clone(),
    }));

    let mut executors = HashMap::new();
    for chain in &config.chains {
        let Some(rpc) = rpcs.get(&chain.name) else {
            continue;
        };
        executors.insert(
            chain.name.clone(),
            Arc::new(Executor {
                rpc: rpc.clone(),
                gas_multiplier: chain.gas_multiplier,
                confirmations: chain.confirmations,
                max_fee_per_gas: chain
                    .max_fee_per_gas
                    .as_deref()
                    .map(parse_wei)
                    .transpose()?,
                max_priority_fee_per_gas: chain
                    .max_priority_fee_per_gas
                    .as_deref()
                    .map(parse_wei)
                    .transpose()?,
            }),
        );
    }

    let mut listeners = Vec::new();
    for chain in &config.chains {
        let Some(rpc) = rpcs.get(&chain.name) else {
            continue;
        };
        let mut mappings = Vec::new();
        for mapping in &config.event_mappings {
            if !mapping.enabled {
                continue;
            }
            let Some(source_address) = contracts.address_for(&mapping.source_contract, &chain.name) else {
                continue;
            };
            let resolver_spec = config
                .destination_resolvers
                .get(&mapping.destination_resolver)
                .cloned()
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "mapping '{}' references an unknown resolver",
                        mapping.name
                    )
                })?;
            let dest_sig = ParsedSignature::parse(&mapping.destination_method_signature)
                .with_context(|| {
                    format!(
                        "parsing destination signature for mapping '{}'",
                        mapping.name
                    )
                })?;

            mappings.push(MappingContext {
                mapping: mapping.clone(),
                source_address: source_address.to_string(),
                dest_method_name: dest_sig.name,
                resolver_spec,
            });
        }

        listeners.push(Listener {
            chain: chain.clone(),
            rpc: rpc.clone(),
            chain_store: chain_store.clone(),
            job_store: job_store.clone(),
            mappings,
            resolver_registry: registry.clone(),
            contracts: contracts.clone(),
        });
    }

    let queue = Queue {
        job_store: job_store.clone(),
        proof_client,
        executors,
        source_chain_ids: chain_ids,
        source_rpcs: rpcs,
    };

    let shutdown = Arc::new(ShutdownController::new());
    shutdown::spawn_signal_handler(shutdown.clone());
    let token = shutdown.token();

    let mut handles = Vec::new();
    for listener in listeners {
        let token = token.clone();
        handles.push(tokio::spawn(async move { listener.run(token).await }));
    }
    handles.push(tokio::spawn(async move { queue.run(token).await }));

    let drain_deadline = Duration::from_secs(cli.drain_deadline_secs);
    let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

    match tokio::time::timeout(drain_deadline, futures::future::join_all(handles)).await {
        Ok(results) => {
            for result in results {
                result.context("a relayer task panicked")?;
            }
        }
        Err(_) => {
            tracing::warn!(
                drain_deadline_secs = cli.drain_deadline_secs,
                "drain deadline elapsed with tasks still in flight, forcing termination"
            );
            for handle in &abort_handles {
                handle.abort();
            }
        }
    }

    if cli.clear_db_on_exit {
        if let Err(e) = std::fs::remove_file(&database_path) {
            tracing::warn!(error = %e, "failed to remove database file on exit");
        }
    }

    tracing::info!("relayer shut down cleanly");
    Ok(())
}

fn parse_wei(raw: &str) -> anyhow::Result<u128> {
    raw.parse::<u128>()
        .with_context(|| format!("invalid wei amount '{raw}'"))
}

fn init_logging(cli: &Cli, logging: &relayer_config::LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let level = cli.log_level.clone().unwrap_or_else(|| logging.level.clone());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    let enable_file_logging = cli.enable_file_logging || logging.enable_file_logging;
    if enable_file_logging {
        let log_path = cli
            .log_path
            .clone()
            .or_else(|| logging.log_path.clone())
            .unwrap_or_else(|| "./relayer.log".to_string());
        let path = std::path::Path::new(&log_path);
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("relayer.log"));
        let file_appender = tracing_appender::rolling::never(directory, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        std::mem::forget(guard);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).json())
            .init();
    } else {
        registry.init();
    }

    Ok(())
}
