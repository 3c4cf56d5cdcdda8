//! Dynamic ABI encoding/decoding driven by a runtime-parsed human-readable signature, shared by
//! the listener (event decoding) and the executor (call encoding).

use ethers::abi::{decode, encode, ParamType, Token};
use ethers::utils::keccak256;
use num_bigint::{BigInt, BigUint};
use relayer_core::abi_value::AbiValue;
use relayer_core::error::EncodingError;
use relayer_core::signature::{ParsedSignature, SignatureParam};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Maps a Solidity-style type name (`uint256`, `address`, `bytes32`, `string`, …) to its
/// `ethers` `ParamType`.
pub fn solidity_type_to_param_type(ty: &str) -> Result<ParamType, EncodingError> {
    let malformed = |reason: &str| EncodingError::MalformedSignature {
        signature: ty.to_string(),
        reason: reason.to_string(),
    };

    if ty == "address" {
        Ok(ParamType::Address)
    } else if ty == "bool" {
        Ok(ParamType::Bool)
    } else if ty == "string" {
        Ok(ParamType::String)
    } else if ty == "bytes" {
        Ok(ParamType::Bytes)
    } else if let Some(bits) = ty.strip_prefix("uint") {
        let bits: usize = bits.parse().map_err(|_| malformed("invalid uint width"))?;
        Ok(ParamType::Uint(bits))
    } else if let Some(bits) = ty.strip_prefix("int") {
        let bits: usize = bits.parse().map_err(|_| malformed("invalid int width"))?;
        Ok(ParamType::Int(bits))
    } else if let Some(len) = ty.strip_prefix("bytes") {
        let len: usize = len.parse().map_err(|_| malformed("invalid fixed-bytes length"))?;
        Ok(ParamType::FixedBytes(len))
    } else {
        Err(malformed("unrecognised type"))
    }
}

/// The canonical `Name(type1,type2,…)` form used to derive a selector/topic0, dropping
/// parameter names and the `indexed` qualifier.
pub fn canonical_signature(sig: &ParsedSignature) -> String {
    let types = sig
        .params
        .iter()
        .map(|p| p.ty.clone())
        .collect::<Vec<_>>()
        .join(",");
    format!("{}({})", sig.name, types)
}

pub fn topic0(sig: &ParsedSignature) -> String {
    let hash = keccak256(canonical_signature(sig).as_bytes());
    format!("0x{}", hex::encode(hash))
}

pub fn function_selector(sig: &ParsedSignature) -> [u8; 4] {
    let hash = keccak256(canonical_signature(sig).as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Decodes a log's topics and data into named `AbiValue`s, given the event's parsed schema.
/// Indexed dynamic types (`string`/`bytes`/arrays) are stored as their 32-byte topic hash since
/// the pre-image is not recoverable from the log alone; this is a known, accepted limitation.
pub fn decode_log(
    params: &[SignatureParam],
    topics: &[String],
    data: &[u8],
) -> Result<BTreeMap<String, AbiValue>, EncodingError> {
    let non_indexed: Vec<&SignatureParam> = params.iter().filter(|p| !p.indexed).collect();
    let indexed: Vec<&SignatureParam> = params.iter().filter(|p| p.indexed).collect();

    let non_indexed_types: Vec<ParamType> = non_indexed
        .iter()
        .map(|p| solidity_type_to_param_type(&p.ty))
        .collect::<Result<_, _>>()?;
    let decoded_tokens = decode(&non_indexed_types, data).map_err(|e| EncodingError::TypeMismatch {
        name: "<event data>".to_string(),
        ty: e.to_string(),
    })?;

    let mut out = BTreeMap::new();
    for (param, token) in non_indexed.into_iter().zip(decoded_tokens.into_iter()) {
        let ty = solidity_type_to_param_type(&param.ty)?;
        out.insert(param.name.clone(), token_to_abi_value(&token, &ty, &param.name)?);
    }

    // topics[0] is the event selector; indexed params occupy topics[1..] in declaration order.
    for (i, param) in indexed.into_iter().enumerate() {
        let raw_topic = topics.get(i + 1).ok_or_else(|| EncodingError::MissingValue(param.name.clone()))?;
        out.insert(param.name.clone(), decode_indexed_topic(&param.ty, raw_topic)?);
    }

    Ok(out)
}

fn decode_indexed_topic(ty: &str, raw_topic: &str) -> Result<AbiValue, EncodingError> {
    let stripped = raw_topic.strip_prefix("0x").unwrap_or(raw_topic);
    let bytes = hex::decode(stripped).map_err(|e| EncodingError::TypeMismatch {
        name: raw_topic.to_string(),
        ty: e.to_string(),
    })?;

    if ty == "address" {
        let tail = &bytes[bytes.len().saturating_sub(20)..];
        Ok(AbiValue::Address(format!("0x{}", hex::encode(tail))))
    } else if ty == "bool" {
        Ok(AbiValue::Bool(bytes.iter().any(|b| *b != 0)))
    } else if ty.starts_with("uint") {
        Ok(AbiValue::Uint(BigUint::from_bytes_be(&bytes)))
    } else if ty.starts_with("int") {
        Ok(AbiValue::Int(BigInt::from_signed_bytes_be(&bytes)))
    } else {
        // string, bytes, bytes32, arrays: store the raw 32-byte topic value as-is.
        Ok(AbiValue::Bytes(bytes))
    }
}

fn token_to_abi_value(token: &Token, ty: &ParamType, name: &str) -> Result<AbiValue, EncodingError> {
    let mismatch = || EncodingError::TypeMismatch {
        name: name.to_string(),
        ty: format!("{ty:?}"),
    };
    Ok(match (token, ty) {
        (Token::Uint(v), ParamType::Uint(_)) => {
            AbiValue::Uint(BigUint::from_bytes_be(&v.to_owned().to_big_endian_bytes()))
        }
        (Token::Int(v), ParamType::Int(_)) => {
            AbiValue::Int(BigInt::from_signed_bytes_be(&v.to_owned().to_big_endian_bytes()))
        }
        (Token::Address(a), ParamType::Address) => AbiValue::Address(format!("{a:#x}")),
        (Token::Bool(b), ParamType::Bool) => AbiValue::Bool(*b),
        (Token::Bytes(b), ParamType::Bytes) => AbiValue::Bytes(b.clone()),
        (Token::FixedBytes(b), ParamType::FixedBytes(_)) => AbiValue::Bytes(b.clone()),
        (Token::String(s), ParamType::String) => AbiValue::String(s.clone()),
        _ => return Err(mismatch()),
    })
}

/// Converts a `U256`/`I256`-backed token's big-endian bytes. `ethers` exposes this via
/// `to_big_endian`/`to_bytes`; this helper normalises the small API difference between the two
/// integer token kinds into a single byte-slice accessor.
trait ToBigEndianBytes {
    fn to_big_endian_bytes(self) -> [u8; 32];
}

impl ToBigEndianBytes for ethers::types::U256 {
    fn to_big_endian_bytes(self) -> [u8; 32] {
        let mut buf = [0u8; 32];
        self.to_big_endian(&mut buf);
        buf
    }
}

impl ToBigEndianBytes for ethers::types::I256 {
    fn to_big_endian_bytes(self) -> [u8; 32] {
        let mut buf = [0u8; 32];
        self.to_big_endian(&mut buf);
        buf
    }
}

/// Encodes `values` against `params` (in order) and prefixes the result with the 4-byte
/// function selector derived from `sig`.
pub fn encode_call(
    sig: &ParsedSignature,
    values: &[AbiValue],
) -> Result<Vec<u8>, EncodingError> {
    if values.len() != sig.params.len() {
        return Err(EncodingError::TypeMismatch {
            name: sig.name.clone(),
            ty: format!("expected {} arguments, got {}", sig.params.len(), values.len()),
        });
    }
    let mut tokens = Vec::with_capacity(values.len());
    for (param, value) in sig.params.iter().zip(values.iter()) {
        let ty = solidity_type_to_param_type(&param.ty)?;
        tokens.push(abi_value_to_token(value, &ty, &param.name)?);
    }
    let mut out = function_selector(sig).to_vec();
    out.extend(encode(&tokens));
    Ok(out)
}

fn abi_value_to_token(value: &AbiValue, ty: &ParamType, name: &str) -> Result<Token, EncodingError> {
    let mismatch = || EncodingError::TypeMismatch {
        name: name.to_string(),
        ty: format!("{ty:?}"),
    };
    Ok(match (value, ty) {
        (AbiValue::Uint(v), ParamType::Uint(_)) => {
            if v.to_bytes_be().len() > 32 {
                return Err(mismatch());
            }
            Token::Uint(ethers::types::U256::from_big_endian(&v.to_bytes_be()))
        }
        (AbiValue::Int(v), ParamType::Int(_)) => {
            let as_u: BigUint = if v.sign() == num_bigint::Sign::Minus {
                let magnitude = (-v).to_biguint().unwrap();
                (BigUint::from(1u32) << 256) - magnitude
            } else {
                v.to_biguint().unwrap()
            };
            Token::Int(ethers::types::U256::from_big_endian(&as_u.to_bytes_be()))
        }
        (AbiValue::Address(a), ParamType::Address) => {
            Token::Address(ethers::types::Address::from_str(a).map_err(|_| mismatch())?)
        }
        (AbiValue::Bool(b), ParamType::Bool) => Token::Bool(*b),
        (AbiValue::Bytes(b), ParamType::Bytes) => Token::Bytes(b.clone()),
        (AbiValue::Bytes(b), ParamType::FixedBytes(n)) => {
            if b.len() != *n {
                return Err(mismatch());
            }
            Token::FixedBytes(b.clone())
        }
        (AbiValue::String(s), ParamType::String) => Token::String(s.clone()),
        _ => return Err(mismatch()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayer_core::signature::ParsedSignature;

    #[test]
    fn topic0_is_stable_for_canonical_signature() {
        let sig = ParsedSignature::parse("ValueSet(string key, uint256 indexed value)").unwrap();
        let t = topic0(&sig);
        assert!(t.starts_with("0x"));
        assert_eq!(t.len(), 66);
    }

    #[test]
    fn encode_call_prefixes_selector_and_encodes_args() {
        let sig = ParsedSignature::parse("relayValue(bytes proof, uint256 value)").unwrap();
        let values = vec![
            AbiValue::Bytes(vec![0xde, 0xad]),
            AbiValue::Uint(BigUint::from(42u32)),
        ];
        let encoded = encode_call(&sig, &values).unwrap();
        assert!(encoded.len() > 4);
    }

    #[test]
    fn decode_log_splits_indexed_and_non_indexed_params() {
        let sig = ParsedSignature::parse("ValueSet(string key, uint256 indexed value)").unwrap();
        let non_indexed_types = vec![ParamType::String];
        let data = encode(&[Token::String("k".to_string())]);
        let mut value_bytes = [0u8; 32];
        value_bytes[31] = 42;
        let topics = vec![
            topic0(&sig),
            format!("0x{}", hex::encode(value_bytes)),
        ];
        let decoded = decode_log(&sig.params, &topics, &data).unwrap();
        assert_eq!(decoded.get("key"), Some(&AbiValue::String("k".to_string())));
        assert_eq!(decoded.get("value"), Some(&AbiValue::Uint(BigUint::from(42u32))));
        let _ = non_indexed_types;
    }
}
