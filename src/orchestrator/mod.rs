//! The two user-triggerable workflows and their shared run skeleton.

mod runner;

pub use runner::{Orchestrator, RunReport, RunSummary};
