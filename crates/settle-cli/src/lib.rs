//! # settle-cli
//!
//! Built-in scenario suite and CLI surface for the settle harness.

pub mod suite;
