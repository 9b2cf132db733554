//! Cryptographic utilities for listing delivery proofs.
//!
//! A listing commits to its data with SHA-256; the buyer proves receipt by
//! revealing the preimage. Buyers publish an RSA public key so the seller can
//! encrypt deliveries to them.

pub mod commitment;
pub mod pubkey;

pub use commitment::Commitment;
pub use pubkey::PublicKeyRecord;
