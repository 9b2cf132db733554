use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::config::COMMITMENT_SIZE;
use crate::error::{MarketError, MarketResult};
use crate::util::decode_hex_prefixed;

/// Commitment to off-channel data: the SHA-256 digest the seller publishes
/// up front and the buyer later opens by revealing a preimage.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment([u8; COMMITMENT_SIZE]);

impl Commitment {
    pub const fn from_bytes(bytes: [u8; COMMITMENT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Commit to `data` by hashing it.
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        let digest: [u8; COMMITMENT_SIZE] = Sha256::digest(data.as_ref()).into();
        Self(digest)
    }

    pub const fn as_bytes(&self) -> &[u8; COMMITMENT_SIZE] {
        &self.0
    }

    /// Check whether `revealed` hashes to this commitment.
    pub fn opens_with(&self, revealed: &[u8]) -> bool {
        Self::of(revealed) == *self
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.to_hex())
    }
}

impl FromStr for Commitment {
    type Err = MarketError;

    fn from_str(s: &str) -> MarketResult<Self> {
        let bytes = decode_hex_prefixed(s)?;
        let len = bytes.len();
        let bytes: [u8; COMMITMENT_SIZE] = bytes.try_into().map_err(|_| {
            MarketError::Validation(format!(
                "commitment must be {COMMITMENT_SIZE} bytes, got {len}"
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
