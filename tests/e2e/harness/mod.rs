//! E2E test harness for CED.
//!
//! Some builders, steps and assertions are only used by a subset of
//! scenarios.

#![allow(dead_code)]

pub mod assertions;
pub mod clock;
pub mod runner;
pub mod steps;
pub mod workspace;

pub use assertions::Assertion;
pub use scenario::Scenario;
pub use steps::Edit;
pub use workspace::TestWorkspace;
