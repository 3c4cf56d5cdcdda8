#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Maps an observed event to the set of destination chains it should be relayed to.

use relayer_core::abi_value::{AbiValue, DecodedEvent};
use relayer_core::error::ResolverError;
use relayer_core::model::DestinationResolverSpec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A custom resolver function: takes the mapping's own spec (so `custom` resolvers can be
/// parameterised, e.g. by a `function_id`-specific config blob embedded elsewhere), the
/// decoded event, and the source chain name; returns the ordered destination chain list.
pub type CustomResolverFn =
    Arc<dyn Fn(&DecodedEvent, &str) -> Result<Vec<String>, ResolverError> + Send + Sync>;

/// Holds the `custom` resolver functions registered at startup, keyed by `function_id`.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    functions: BTreeMap<String, CustomResolverFn>,
}

impl ResolverRegistry {
    pub fn new() -> ResolverRegistry {
        ResolverRegistry::default()
    }

    pub fn register(&mut self, function_id: impl Into<String>, f: CustomResolverFn) {
        self.functions.insert(function_id.into(), f);
    }

    pub fn contains(&self, function_id: &str) -> bool {
        self.functions.contains_key(function_id)
    }

    /// Validates that every `custom` variant in `specs` refers to a registered function.
    /// Returns the aggregated list of unresolved function ids (empty means all resolved).
    pub fn validate<'a>(
        &self,
        specs: impl Iterator<Item = &'a DestinationResolverSpec>,
    ) -> Vec<String> {
        let mut missing = Vec::new();
        for spec in specs {
            if let DestinationResolverSpec::Custom { function_id } = spec {
                if !self.contains(function_id) {
                    missing.push(function_id.clone());
                }
            }
        }
        missing
    }
}

/// Resolves a decoded event to its destination chain set according to `spec`.
pub fn resolve(
    spec: &DestinationResolverSpec,
    event: &DecodedEvent,
    source_chain: &str,
    registry: &ResolverRegistry,
) -> Result<Vec<String>, ResolverError> {
    match spec {
        DestinationResolverSpec::Static { destinations } => Ok(destinations
            .iter()
            .filter(|d| d.as_str() != source_chain)
            .cloned()
            .collect()),
        DestinationResolverSpec::EventParameter {
            parameter_name,
            mapping,
        } => {
            let value = event
                .args
                .get(parameter_name)
                .ok_or_else(|| ResolverError::MissingParameter(parameter_name.clone()))?;
            let raw = abi_value_to_string(value);
            let chain = match mapping {
                Some(table) => table.get(&raw).cloned().unwrap_or_else(|| {
                    tracing::debug!(parameter = %parameter_name, value = %raw, "no mapping entry, using raw value as chain name");
                    raw
                }),
                None => raw,
            };
            Ok(vec![chain])
        }
        DestinationResolverSpec::Custom { function_id } => {
            let f = self::lookup(registry, function_id)?;
            f(event, source_chain)
        }
    }
}

fn lookup(registry: &ResolverRegistry, function_id: &str) -> Result<CustomResolverFn, ResolverError> {
    registry
        .functions
        .get(function_id)
        .cloned()
        .ok_or_else(|| ResolverError::UnknownFunction(function_id.to_string()))
}

fn abi_value_to_string(value: &AbiValue) -> String {
    match value {
        AbiValue::Uint(v) => v.to_string(),
        AbiValue::Int(v) => v.to_string(),
        AbiValue::Address(v) => v.clone(),
        AbiValue::Bool(v) => v.to_string(),
        AbiValue::Bytes(v) => format!("0x{}", hex::encode(v)),
        AbiValue::String(v) => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn event_with(args: BTreeMap<String, AbiValue>) -> DecodedEvent {
        DecodedEvent {
            name: "ValueSet".to_string(),
            args,
            block_number: 1,
            transaction_index: 0,
            log_index: 0,
        }
    }

    #[test]
    fn static_resolver_excludes_source_chain() {
        let spec = DestinationResolverSpec::Static {
            destinations: vec!["base".to_string(), "arbitrum".to_string()],
        };
        let event = event_with(BTreeMap::new());
        let registry = ResolverRegistry::new();
        let dests = resolve(&spec, &event, "base", &registry).unwrap();
        assert_eq!(dests, vec!["arbitrum".to_string()]);
    }

    #[test]
    fn static_resolver_with_only_source_yields_empty() {
        let spec = DestinationResolverSpec::Static {
            destinations: vec!["base".to_string()],
        };
        let event = event_with(BTreeMap::new());
        let registry = ResolverRegistry::new();
        let dests = resolve(&spec, &event, "base", &registry).unwrap();
        assert!(dests.is_empty());
    }

    #[test]
    fn event_parameter_resolver_uses_mapping_table() {
        let mut mapping = BTreeMap::new();
        mapping.insert("137".to_string(), "polygon".to_string());
        let spec = DestinationResolverSpec::EventParameter {
            parameter_name: "destinationChainId".to_string(),
            mapping: Some(mapping),
        };
        let mut args = BTreeMap::new();
        args.insert(
            "destinationChainId".to_string(),
            AbiValue::Uint(BigUint::from(137u32)),
        );
        let event = event_with(args);
        let registry = ResolverRegistry::new();
        let dests = resolve(&spec, &event, "base", &registry).unwrap();
        assert_eq!(dests, vec!["polygon".to_string()]);
    }

    #[test]
    fn event_parameter_resolver_errors_on_missing_parameter() {
        let spec = DestinationResolverSpec::EventParameter {
            parameter_name: "missing".to_string(),
            mapping: None,
        };
        let event = event_with(BTreeMap::new());
        let registry = ResolverRegistry::new();
        let err = resolve(&spec, &event, "base", &registry).unwrap_err();
        assert!(matches!(err, ResolverError::MissingParameter(_)));
    }

    #[test]
    fn custom_resolver_dispatches_to_registered_function() {
        let mut registry = ResolverRegistry::new();
        registry.register(
            "always-polygon",
            Arc::new(|_event, _source| Ok(vec!["polygon".to_string()])),
        );
        let spec = DestinationResolverSpec::Custom {
            function_id: "always-polygon".to_string(),
        };
        let event = event_with(BTreeMap::new());
        let dests = resolve(&spec, &event, "base", &registry).unwrap();
        assert_eq!(dests, vec!["polygon".to_string()]);
    }

    #[test]
    fn validate_reports_unregistered_custom_functions() {
        let registry = ResolverRegistry::new();
        let specs = vec![DestinationResolverSpec::Custom {
            function_id: "missing-fn".to_string(),
        }];
        let missing = registry.validate(specs.iter());
        assert_eq!(missing, vec!["missing-fn".to_string()]);
    }
}
