//! Structural validation of published public-key material.
//!
//! Keys are RSA public keys serialized as JSON, `{"n": <base64 modulus>,
//! "e": <decimal exponent>}`. Only well-formedness is checked here; key
//! strength is the owner's concern.

use data_encoding::{BASE64, BASE64_NOPAD};
use serde::{Deserialize, Serialize};

use crate::config::{MIN_KEY_EXPONENT, MIN_KEY_MODULUS_BYTES};
use crate::error::{MarketError, MarketResult};

#[derive(Deserialize)]
struct RawRsaKey {
    n: Option<String>,
    e: Option<ExponentField>,
}

/// Exponents appear both as strings (`"65537"`) and bare numbers in the wild.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExponentField {
    Text(String),
    Number(u64),
}

/// A validated public key record.
///
/// `material` is kept verbatim so lookups return exactly what was registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    pub material: String,
    pub modulus_bits: usize,
    pub exponent: u64,
}

impl PublicKeyRecord {
    /// Parse and validate key material.
    pub fn parse(material: &str) -> MarketResult<Self> {
        let raw: RawRsaKey = serde_json::from_str(material)
            .map_err(|e| MarketError::InvalidKey(format!("not a JSON key object: {e}")))?;

        let n = raw
            .n
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| MarketError::InvalidKey("missing modulus \"n\"".to_string()))?;
        let modulus = decode_base64(n.trim())?;
        if modulus.len() < MIN_KEY_MODULUS_BYTES {
            return Err(MarketError::InvalidKey(format!(
                "modulus is {} bytes, need at least {MIN_KEY_MODULUS_BYTES}",
                modulus.len()
            )));
        }

        let exponent = match raw.e {
            Some(ExponentField::Number(e)) => e,
            Some(ExponentField::Text(e)) => e
                .trim()
                .parse::<u64>()
                .map_err(|err| MarketError::InvalidKey(format!("exponent {e:?}: {err}")))?,
            None => {
                return Err(MarketError::InvalidKey(
                    "missing exponent \"e\"".to_string(),
                ))
            }
        };
        if exponent < MIN_KEY_EXPONENT {
            return Err(MarketError::InvalidKey(format!(
                "exponent {exponent} is below {MIN_KEY_EXPONENT}"
            )));
        }

        Ok(Self {
            material: material.to_string(),
            modulus_bits: modulus.len() * 8,
            exponent,
        })
    }
}

fn decode_base64(input: &str) -> MarketResult<Vec<u8>> {
    let decoded = if input.ends_with('=') {
        BASE64.decode(input.as_bytes())
    } else {
        BASE64_NOPAD.decode(input.as_bytes())
    };
    decoded.map_err(|e| MarketError::InvalidKey(format!("modulus is not base64: {e}")))
}
