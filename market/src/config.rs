//! Configuration constants for the marketplace.
//!
//! Protocol constants are fixed at compile time. Operational limits live in
//! [`MarketConfig`], which can be tuned through environment variables.

use crate::error::{MarketError, MarketResult};

/// Consecutive failed verifications after which a listing is banned.
pub const RETRY_LIMIT: u32 = 10;

/// Size in bytes of a data commitment (SHA-256 digest).
pub const COMMITMENT_SIZE: usize = 32;

/// Size in bytes of an identity address.
pub const ADDRESS_SIZE: usize = 20;

/// Minimum decoded modulus length accepted for registered public keys.
pub const MIN_KEY_MODULUS_BYTES: usize = 64;

/// Smallest public exponent accepted for registered public keys.
pub const MIN_KEY_EXPONENT: u64 = 3;

/// Maximum size accepted when decoding a ledger snapshot.
pub const MAX_SNAPSHOT_SIZE: usize = 64 * 1024 * 1024;

/// Default tracing filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default capacity of the live event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Default cap on metadata pairs attached to a listing.
pub const DEFAULT_MAX_METADATA_ENTRIES: usize = 64;

/// Default cap on the length of an upload reference.
pub const DEFAULT_MAX_REFERENCE_LEN: usize = 4096;

/// Default cap on the length of registered key material.
pub const DEFAULT_MAX_KEY_MATERIAL_LEN: usize = 8192;

/// Environment variable overriding the tracing filter.
pub const LOG_FILTER_ENV: &str = "MARKET_LOG_FILTER";

/// Environment variable overriding the event channel capacity.
pub const EVENT_CAPACITY_ENV: &str = "MARKET_EVENT_CAPACITY";

/// Environment variable overriding the metadata cap.
pub const MAX_METADATA_ENV: &str = "MARKET_MAX_METADATA";

/// Environment variable overriding the upload reference cap.
pub const MAX_REFERENCE_LEN_ENV: &str = "MARKET_MAX_REFERENCE_LEN";

/// Environment variable overriding the key material cap.
pub const MAX_KEY_LEN_ENV: &str = "MARKET_MAX_KEY_LEN";

/// Runtime limits for a ledger instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    /// Tracing filter used by binaries when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Capacity of the broadcast channel feeding event subscribers.
    pub event_channel_capacity: usize,
    /// Maximum metadata pairs per listing.
    pub max_metadata_entries: usize,
    /// Maximum upload reference length in bytes.
    pub max_reference_len: usize,
    /// Maximum key material length in bytes.
    pub max_key_material_len: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            max_metadata_entries: DEFAULT_MAX_METADATA_ENTRIES,
            max_reference_len: DEFAULT_MAX_REFERENCE_LEN,
            max_key_material_len: DEFAULT_MAX_KEY_MATERIAL_LEN,
        }
    }
}

impl MarketConfig {
    /// Build a config from the process environment, falling back to defaults.
    pub fn from_env() -> MarketResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> MarketResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            log_filter: lookup(LOG_FILTER_ENV).unwrap_or(defaults.log_filter),
            event_channel_capacity: parse_limit(
                &lookup,
                EVENT_CAPACITY_ENV,
                defaults.event_channel_capacity,
            )?,
            max_metadata_entries: parse_limit(
                &lookup,
                MAX_METADATA_ENV,
                defaults.max_metadata_entries,
            )?,
            max_reference_len: parse_limit(
                &lookup,
                MAX_REFERENCE_LEN_ENV,
                defaults.max_reference_len,
            )?,
            max_key_material_len: parse_limit(
                &lookup,
                MAX_KEY_LEN_ENV,
                defaults.max_key_material_len,
            )?,
        };
        Ok(config)
    }
}

fn parse_limit<F>(lookup: &F, name: &str, default: usize) -> MarketResult<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(MarketError::Config(format!("{name} must be greater than zero"))),
        Ok(value) => Ok(value),
        Err(e) => Err(MarketError::Config(format!("{name}={raw:?}: {e}"))),
    }
}

/// Return the current Unix timestamp in seconds.
///
/// For testable code, prefer accepting a `TimeProvider` parameter instead.
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
