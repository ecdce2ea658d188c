//! # settle-core
//!
//! Engine of the settle verification harness.
//!
//! This crate provides:
//! - The ledger backend seam and its HTTP implementation
//! - Identity provisioning with collision-resistant naming
//! - The fixed-delay settlement poller
//! - The scenario orchestrator with serialization groups
//! - The invariant assertion engine and fault-path driver
//! - Suite reporting with per-step diagnostics

mod assertions;
mod client;
mod config;
mod faults;
mod identity;
mod orchestrator;
mod poller;
mod report;
mod scenario;
pub mod testing;

pub use assertions::{check, AssertionResult, CheckKind, Observed};
pub use client::{HttpLedger, LedgerBackend};
pub use config::{ConfigError, HarnessConfig, PollConfig, SeedAccount, TokenConfig};
pub use faults::{drive_invalid, FaultKind, FaultResult};
pub use identity::{Identity, Provisioner};
pub use orchestrator::Orchestrator;
pub use poller::{poll, PollBudget, PollOutcome};
pub use report::{ScenarioReport, StepOutcome, StepReport, SuiteReport, Verdict};
pub use scenario::{
    Accept, Action, ObserveKind, Recipient, Scenario, SettleSpec, Source, Step,
};
