use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::config::ADDRESS_SIZE;
use crate::error::{MarketError, MarketResult};
use crate::util::decode_hex_prefixed;

/// Identity of a participant or contract on the ledger.
///
/// Rendered as `0x`-prefixed lowercase hex. Serialized in the same textual
/// form so snapshots and IPC payloads stay readable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// The all-zero address, used where an identity is absent.
    pub const ZERO: Self = Self([0u8; ADDRESS_SIZE]);

    pub const fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_SIZE]
    }

    /// Derive the address of a contract deployed by `deployer` with the given
    /// per-deployer nonce: the trailing bytes of `SHA-256(deployer || nonce)`.
    pub fn derive(deployer: &Address, nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(deployer.0);
        hasher.update(nonce.to_be_bytes());
        let digest: [u8; 32] = hasher.finalize().into();

        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest[32 - ADDRESS_SIZE..]);
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = MarketError;

    fn from_str(s: &str) -> MarketResult<Self> {
        let bytes = decode_hex_prefixed(s)?;
        let len = bytes.len();
        let bytes: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|_| {
            MarketError::Validation(format!("address must be {ADDRESS_SIZE} bytes, got {len}"))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
