#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! The listener, executor, and scheduler that together drive a relay job from observation to
//! on-chain completion.

mod executor;
mod listener;
mod queue;

pub use executor::Executor;
pub use listener::Listener;
pub use queue::Queue;

use relayer_core::model::{ContractDeployment, DestinationResolverSpec, EventMapping};

/// Everything a listener needs to act on one configured event mapping on its own chain: the
/// mapping itself, the concrete source contract address, and the parsed destination-resolver
/// spec. The destination address is not known until the resolver picks a destination chain, so
/// it is looked up from the `ContractDirectory` at job-creation time instead of being carried
/// here.
#[derive(Debug, Clone)]
pub struct MappingContext {
    pub mapping: EventMapping,
    pub source_address: String,
    pub dest_method_name: String,
    pub resolver_spec: DestinationResolverSpec,
}

/// A lookup from (contract name, chain) to deployed address, built once from the config's
/// contract list and shared read-only across every listener.
#[derive(Debug, Clone)]
pub struct ContractDirectory {
    deployments: Vec<ContractDeployment>,
}

impl ContractDirectory {
    pub fn new(deployments: Vec<ContractDeployment>) -> ContractDirectory {
        ContractDirectory { deployments }
    }

    pub fn address_for(&self, contract_name: &str, chain: &str) -> Option<&str> {
        self.deployments
            .iter()
            .find(|d| d.name == contract_name && d.chain == chain)
            .map(|d| d.address.as_str())
    }
}
