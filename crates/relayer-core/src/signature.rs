use crate::error::ConfigError;

/// One parameter of a parsed human-readable signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParam {
    pub ty: String,
    pub name: String,
    pub indexed: bool,
}

/// A parsed `Name(type1 name1, type2 name2, …)` signature, used for both event and method
/// schemas. The `indexed` qualifier is recognised on event parameters and carried through, but
/// has no effect on destination-call encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignature {
    pub name: String,
    pub params: Vec<SignatureParam>,
}

impl ParsedSignature {
    /// Parses `"ValueSet(string key, uint256 indexed value)"` style signatures.
    pub fn parse(raw: &str) -> Result<ParsedSignature, ConfigError> {
        let raw = raw.trim();
        let open = raw.find('(').ok_or_else(|| ConfigError::MalformedSignature {
            signature: raw.to_string(),
            reason: "missing '('".to_string(),
        })?;
        if !raw.ends_with(')') {
            return Err(ConfigError::MalformedSignature {
                signature: raw.to_string(),
                reason: "missing trailing ')'".to_string(),
            });
        }
        let name = raw[..open].trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::MalformedSignature {
                signature: raw.to_string(),
                reason: "empty name".to_string(),
            });
        }
        let body = &raw[open + 1..raw.len() - 1];
        let mut params = Vec::new();
        if !body.trim().is_empty() {
            for part in body.split(',') {
                params.push(parse_param(part, raw)?);
            }
        }
        Ok(ParsedSignature { name, params })
    }

    /// Re-renders the signature in canonical `Name(type name, …)` form, dropping `indexed`.
    pub fn render(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, params)
    }
}

fn parse_param(part: &str, full: &str) -> Result<SignatureParam, ConfigError> {
    let mut tokens: Vec<&str> = part.split_whitespace().collect();
    let malformed = || ConfigError::MalformedSignature {
        signature: full.to_string(),
        reason: format!("could not parse parameter '{}'", part.trim()),
    };
    if tokens.len() < 2 {
        return Err(malformed());
    }
    let mut indexed = false;
    if let Some(pos) = tokens.iter().position(|t| *t == "indexed") {
        indexed = true;
        tokens.remove(pos);
    }
    if tokens.len() != 2 {
        return Err(malformed());
    }
    Ok(SignatureParam {
        ty: tokens[0].to_string(),
        name: tokens[1].to_string(),
        indexed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_signature_with_indexed_marker() {
        let parsed = ParsedSignature::parse("ValueSet(string key, uint256 indexed value)").unwrap();
        assert_eq!(parsed.name, "ValueSet");
        assert_eq!(parsed.params.len(), 2);
        assert_eq!(parsed.params[0].ty, "string");
        assert_eq!(parsed.params[0].name, "key");
        assert!(!parsed.params[0].indexed);
        assert_eq!(parsed.params[1].ty, "uint256");
        assert!(parsed.params[1].indexed);
    }

    #[test]
    fn render_drops_indexed_marker_and_round_trips_signature_shape() {
        let parsed = ParsedSignature::parse("ValueSet(string key, uint256 indexed value)").unwrap();
        assert_eq!(parsed.render(), "ValueSet(string key, uint256 value)");
        let reparsed = ParsedSignature::parse(&parsed.render()).unwrap();
        assert_eq!(parsed.name, reparsed.name);
        assert_eq!(
            parsed.params.iter().map(|p| (&p.ty, &p.name)).collect::<Vec<_>>(),
            reparsed.params.iter().map(|p| (&p.ty, &p.name)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn parses_zero_argument_signature() {
        let parsed = ParsedSignature::parse("Ping()").unwrap();
        assert_eq!(parsed.name, "Ping");
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn rejects_missing_parens() {
        assert!(ParsedSignature::parse("Ping").is_err());
    }

    #[test]
    fn rejects_malformed_parameter() {
        assert!(ParsedSignature::parse("Ping(uint256)").is_err());
    }
}
