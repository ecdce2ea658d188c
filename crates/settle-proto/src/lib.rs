//! # settle-proto
//!
//! Shared types and error definitions for the settle verification harness.
//!
//! This crate provides the foundational abstractions used across all settle
//! crates, including:
//! - The harness error taxonomy and `Result` alias
//! - The ledger backend's uniform wire envelope and endpoint payloads
//! - Exact base-unit token amounts (never floating point)
//! - Validated ledger addresses

mod address;
mod amount;
mod envelope;
mod error;

pub use address::{Address, AddressError, ADDRESS_PATTERN};
pub use amount::{AmountError, TokenAmount};
pub use envelope::{ApiEnvelope, AuthPayload, BalanceInfo, RewardStatus, TxReceipt, UserInfo};
pub use error::{HarnessError, Result};
