use crate::env_subst::{resolve_private_key, substitute_json};
use crate::types::RelayerConfig;
use relayer_core::error::ConfigError;
use relayer_core::signature::ParsedSignature;
use std::collections::HashSet;
use std::path::Path;

/// Reads, substitutes, parses, and validates the relayer's configuration file.
pub fn load_config(path: &Path) -> Result<RelayerConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut value: serde_json::Value = serde_json::from_str(&raw)?;
    resolve_private_keys(&mut value);
    substitute_json(&mut value);

    let config: RelayerConfig = serde_json::from_value(value)?;
    validate(&config)?;
    Ok(config)
}

fn resolve_private_keys(value: &mut serde_json::Value) {
    if let Some(chains) = value.get_mut("chains").and_then(|v| v.as_array_mut()) {
        for chain in chains {
            if let Some(key) = chain.get_mut("signing_key").and_then(|v| v.as_str()) {
                let resolved = resolve_private_key(key);
                chain["signing_key"] = serde_json::Value::String(resolved);
            }
        }
    }
}

/// Validates cross references between mappings, chains, and resolvers, and that every
/// signature parses. Aggregates every problem found into a single error rather than failing
/// on the first one, so an operator can fix a misconfigured file in one pass.
pub fn validate(config: &RelayerConfig) -> Result<(), ConfigError> {
    let known_chains: HashSet<&str> = config.chains.iter().map(|c| c.name.as_str()).collect();
    let known_resolvers: HashSet<&str> = config.destination_resolvers.keys().map(|s| s.as_str()).collect();

    let mut problems = Vec::new();

    for mapping in &config.event_mappings {
        if !known_resolvers.contains(mapping.destination_resolver.as_str()) {
            problems.push(format!(
                "mapping '{}' references unknown resolver '{}'",
                mapping.name, mapping.destination_resolver
            ));
        }
        if let Err(e) = ParsedSignature::parse(&mapping.source_event_signature) {
            problems.push(format!("mapping '{}' has a malformed event signature: {e}", mapping.name));
        }
        if let Err(e) = ParsedSignature::parse(&mapping.destination_method_signature) {
            problems.push(format!("mapping '{}' has a malformed method signature: {e}", mapping.name));
        }
    }

    for resolver in config.destination_resolvers.values() {
        if let relayer_core::model::DestinationResolverSpec::Static { destinations } = resolver {
            for d in destinations {
                if !known_chains.contains(d.as_str()) {
                    problems.push(format!("static resolver references unknown chain '{d}'"));
                }
            }
        }
    }

    for contract in &config.contracts {
        if !known_chains.contains(contract.chain.as_str()) {
            problems.push(format!(
                "contract '{}' is deployed on unknown chain '{}'",
                contract.name, contract.chain
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Aggregated(problems.len(), problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    const VALID: &str = r#"
    {
      "chains": [
        {"name":"base","chain_id":8453,"rpc_endpoint":"http://localhost:1","signing_key":"0xaa","poll_interval_ms":1000,"confirmations":2,"gas_multiplier":1.2},
        {"name":"arbitrum","chain_id":42161,"rpc_endpoint":"http://localhost:2","signing_key":"0xbb","poll_interval_ms":1000,"confirmations":2,"gas_multiplier":1.2}
      ],
      "contracts": [
        {"name":"Source","chain":"base","address":"0x1","role":"source"},
        {"name":"Dest","chain":"arbitrum","address":"0x2","role":"destination"}
      ],
      "eventMappings": [
        {"name":"M","source_contract":"Source","source_event_signature":"ValueSet(string key)","destination_contract":"Dest","destination_method_signature":"relay(string key)","destination_resolver":"R","proof_required":false}
      ],
      "destinationResolvers": {
        "R": {"strategy":"static","destinations":["arbitrum"]}
      },
      "proofApi": {"base_url":"http://localhost:3"},
      "database": {"path":"/tmp/relayer-test.sqlite"},
      "logging": {"level":"info"}
    }
    "#;

    #[test]
    fn loads_a_valid_config() {
        let f = write_config(VALID);
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.event_mappings.len(), 1);
    }

    #[test]
    fn rejects_mapping_referencing_unknown_resolver() {
        let bad = VALID.replace("\"destination_resolver\":\"R\"", "\"destination_resolver\":\"NOPE\"");
        let f = write_config(&bad);
        let err = load_config(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Aggregated(_, _)));
    }

    #[test]
    fn load_config_resolves_private_key_placeholder_before_generic_substitution() {
        unsafe { std::env::remove_var("PRIVATE_KEY") };

        let with_placeholder = VALID.replace("\"signing_key\":\"0xaa\"", "\"signing_key\":\"${PRIVATE_KEY}\"");
        let f = write_config(&with_placeholder);

        unsafe { std::env::set_var("PRIVATE_KEY", "deadbeef") };
        let config = load_config(f.path()).unwrap();
        unsafe { std::env::remove_var("PRIVATE_KEY") };

        assert_eq!(config.chains[0].signing_key, "0xdeadbeef");
    }

    #[test]
    fn load_config_zero_fills_private_key_when_unset() {
        unsafe { std::env::remove_var("PRIVATE_KEY") };
        let with_placeholder = VALID.replace("\"signing_key\":\"0xaa\"", "\"signing_key\":\"${PRIVATE_KEY}\"");
        let f = write_config(&with_placeholder);

        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chains[0].signing_key, format!("0x{}", "0".repeat(64)));
    }
}
