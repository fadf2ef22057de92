//! Shared test utilities for radiorec integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a real orchestrator and scheduler over temp directories
//! - Fakes for the external collaborators (sources, process runner, timer, notifier)
//! - Builders for programs, commands and schedule jobs

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
