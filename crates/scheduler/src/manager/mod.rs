//! The task manager: leader-gated scheduling of generated jobs.
//!
//! Split into focused submodules:
//! - `core`: TaskManager struct, constructor, registration, and accessors
//! - `scheduling`: one scheduling pass (priming, eligibility scan, generate and submit)
//! - `report`: per-pass outcome

mod core;
mod report;
mod scheduling;
#[cfg(test)]
mod tests;

pub use self::core::TaskManager;
pub use self::report::{ScheduleReport, TypeFailure};
