//! Utility functions shared across the marketplace crate.

use crate::error::{MarketError, MarketResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a value to CBOR bytes.
pub fn cbor_to_vec<T: Serialize>(value: &T) -> MarketResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer)
        .map_err(|e| MarketError::Serialization(format!("CBOR serialization failed: {e}")))?;
    Ok(buffer)
}

/// Deserialize CBOR data with a size limit to prevent oversized payloads.
pub fn cbor_from_limited_reader<T: DeserializeOwned>(
    data: &[u8],
    max_bytes: usize,
) -> MarketResult<T> {
    if data.len() > max_bytes {
        return Err(MarketError::Validation(format!(
            "CBOR payload too large: {} bytes (max {})",
            data.len(),
            max_bytes
        )));
    }
    ciborium::from_reader(data)
        .map_err(|e| MarketError::Serialization(format!("CBOR deserialization failed: {e}")))
}

/// Decode a hex string, tolerating an optional `0x` prefix.
pub fn decode_hex_prefixed(input: &str) -> MarketResult<Vec<u8>> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| MarketError::Validation(format!("invalid hex {input:?}: {e}")))
}

/// Serde adapter for `u128` amounts.
///
/// Amounts are written as decimal strings so they survive JSON and
/// self-describing formats past `u64::MAX`. Plain numbers are accepted on
/// input.
pub mod amount_string {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        match RawAmount::deserialize(deserializer)? {
            RawAmount::Text(text) => text
                .trim()
                .parse()
                .map_err(|e| D::Error::custom(format!("invalid amount {text:?}: {e}"))),
            RawAmount::Number(n) => Ok(u128::from(n)),
        }
    }
}
