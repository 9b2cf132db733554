//! Deterministic identities and key material for tests.

use data_encoding::BASE64;
use sha2::{Digest, Sha256};

use crate::config::ADDRESS_SIZE;
use crate::marketplace::Address;

/// A 2048-bit RSA public key in the JSON form buyers register.
pub const SAMPLE_PUBLIC_KEY: &str = r#"{"n":"1ybSJguycYonJ3JJo+u1MwF2h93zf3zuwSNKQbrrY7YMarsdnyHPshx9C26gGthrONqZnnz4kF9V5N4GC3UPIbNGBdeEJX/Hp+McGRUPgS/zTXvVZYo1oxOVzCaARv055BdcweCHaWzO0U+lwtTvR8588ezD/xcvg3tXrnXeDRZ4a0Hmgul/9IF8t92gEiTCFFDZyiWJhOPMSAdYhHjw0k47B337oiGUfr3YcAQmrrlZO78U+44vHkd2CxE4OLfH0yss+GHZYa1slKriQlivj2bBwESmNO6BkqUa52Tes0VFxRr7F4lKLvgx5skN5kzACsga2HaheXjHJqWx5tx9hw==","e":"65537"}"#;

/// Create a test address with deterministic bytes.
pub fn make_test_address(id: u8) -> Address {
    let mut bytes = [0u8; ADDRESS_SIZE];
    bytes[0] = 0xaa;
    bytes[ADDRESS_SIZE - 1] = id;
    bytes[ADDRESS_SIZE - 2] = id.wrapping_mul(31);
    Address::from_bytes(bytes)
}

/// Structurally valid 2048-bit key material that differs per `seed`.
pub fn sample_public_key(seed: u8) -> String {
    let mut modulus = Vec::with_capacity(256);
    let mut block: [u8; 32] = Sha256::digest([seed]).into();
    while modulus.len() < 256 {
        modulus.extend_from_slice(&block);
        block = Sha256::digest(block).into();
    }
    // Top bit set so the modulus is a full 2048 bits.
    modulus[0] |= 0x80;
    format!(r#"{{"n":"{}","e":"65537"}}"#, BASE64.encode(&modulus))
}
