use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tagged, heterogeneous value carried by a decoded event argument or resolved destination
/// call argument. Arbitrary-precision integers are kept as bigints internally but serialize as
/// decimal strings so they round-trip through JSON without precision loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AbiValue {
    Uint(#[serde(with = "biguint_as_string")] BigUint),
    Int(#[serde(with = "bigint_as_string")] BigInt),
    Address(String),
    Bool(bool),
    Bytes(#[serde(with = "bytes_as_hex")] Vec<u8>),
    String(String),
}

impl AbiValue {
    pub fn type_tag(&self) -> &'static str {
        match self {
            AbiValue::Uint(_) => "uint",
            AbiValue::Int(_) => "int",
            AbiValue::Address(_) => "address",
            AbiValue::Bool(_) => "bool",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::String(_) => "string",
        }
    }

    pub fn zero_value_for(type_name: &str) -> AbiValue {
        if type_name.starts_with("uint") {
            AbiValue::Uint(BigUint::from(0u32))
        } else if type_name.starts_with("int") {
            AbiValue::Int(BigInt::from(0))
        } else if type_name == "address" {
            AbiValue::Address("0x0000000000000000000000000000000000000000".to_string())
        } else if type_name == "bool" {
            AbiValue::Bool(false)
        } else if type_name.starts_with("bytes") {
            AbiValue::Bytes(Vec::new())
        } else {
            AbiValue::String(String::new())
        }
    }
}

/// A decoded event's full snapshot, as persisted into a job's `event_data` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub name: String,
    pub args: BTreeMap<String, AbiValue>,
    pub block_number: u64,
    pub transaction_index: u64,
    pub log_index: u64,
}

mod biguint_as_string {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(v: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        let raw = String::deserialize(d)?;
        BigUint::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

mod bigint_as_string {
    use num_bigint::BigInt;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(v: &BigInt, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigInt, D::Error> {
        let raw = String::deserialize(d)?;
        BigInt::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

mod bytes_as_hex {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_round_trips_through_json_without_precision_loss() {
        let huge = AbiValue::Uint(BigUint::parse_bytes(
            b"115792089237316195423570985008687907853269984665640564039457584007913129639935",
            10,
        )
        .unwrap());
        let json = serde_json::to_string(&huge).unwrap();
        let back: AbiValue = serde_json::from_str(&json).unwrap();
        assert_eq!(huge, back);
    }

    #[test]
    fn bytes_round_trip_as_hex() {
        let v = AbiValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("0xdeadbeef"));
        let back: AbiValue = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn zero_value_fallback_matches_type() {
        assert_eq!(
            AbiValue::zero_value_for("uint256"),
            AbiValue::Uint(BigUint::from(0u32))
        );
        assert_eq!(AbiValue::zero_value_for("bool"), AbiValue::Bool(false));
        assert_eq!(
            AbiValue::zero_value_for("address"),
            AbiValue::Address("0x0000000000000000000000000000000000000000".to_string())
        );
    }
}
