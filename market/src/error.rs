use crate::marketplace::Address;

/// Domain-specific error types for the marketplace library.
///
/// Every rejected operation maps to exactly one variant so callers can tell
/// which rule was violated. A failed operation leaves no state behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("listing is not for sale")]
    NotForSale,

    #[error("listing has no purchase in progress")]
    NotInProgress,

    #[error("caller is not the buyer of the purchase in progress")]
    NotBuyer,

    #[error("caller is not the listing owner")]
    NotOwner,

    #[error("caller is denied from purchasing this listing")]
    AccessDenied,

    #[error("payment of {paid} is below the listing price of {price}")]
    NotEnoughFunds { price: u128, paid: u128 },

    #[error("listing is banned")]
    Banned,

    #[error("no public key registered for {0}")]
    NotRegistered(Address),

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("metadata length mismatch: {keys} keys, {values} values")]
    MetadataLengthMismatch { keys: usize, values: usize },

    #[error("listing price must be greater than zero")]
    InvalidPrice,

    #[error("unknown account: {0}")]
    UnknownAccount(Address),

    #[error("insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience type alias.
pub type MarketResult<T> = Result<T, MarketError>;
