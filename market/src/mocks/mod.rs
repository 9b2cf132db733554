//! Mock implementations and fixtures for testing.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! integration suite.

pub mod accounts;
pub mod time;

pub use accounts::{make_test_address, sample_public_key, SAMPLE_PUBLIC_KEY};
pub use time::MockTime;
