//! Testing utilities for deterministic harness tests.

pub mod mock_ledger;

pub use mock_ledger::{CallSpan, MockLedger};
