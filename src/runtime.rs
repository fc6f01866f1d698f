//! Abstraction over the sandboxed code-execution runtime.
//!
//! The orchestrator never talks to an interpreter directly; it drives this
//! trait. Real implementations wrap an isolated interpreter; tests use a
//! scripted double.

use async_trait::async_trait;

use crate::errors::AdapterError;
use crate::phase::{ExecOptions, ExecOutcome, FailureKind};

/// What `setup` found when preparing the runtime.
///
/// A runtime can come up already stopped when an environment precondition
/// (installed before any phase runs) has failed. That state short-circuits
/// the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetupOutcome {
    /// A failure recorded before any phase ran, if any.
    pub pre_stopped: Option<FailureKind>,
}

impl SetupOutcome {
    /// The runtime is ready to execute phases.
    pub fn ready() -> Self {
        Self::default()
    }

    /// The runtime is already stopped with the given failure kind.
    pub fn stopped(kind: FailureKind) -> Self {
        Self {
            pre_stopped: Some(kind),
        }
    }
}

/// Executes code strings inside an isolated interpreter.
///
/// Phase-level code failures are reported through `ExecOutcome`; an `Err`
/// from any method means the runtime itself broke outside the phase
/// protocol and is fatal for the current run.
#[async_trait(?Send)]
pub trait RuntimeAdapter {
    /// Prepare the runtime for a run.
    async fn setup(&mut self) -> Result<SetupOutcome, AdapterError>;

    /// Execute one code segment, after resetting any phase-scoped state
    /// (stdout echoing, stack-trace collapsing) from `options`.
    async fn execute(
        &mut self,
        code: &str,
        options: &ExecOptions,
    ) -> Result<ExecOutcome, AdapterError>;

    /// Release the runtime. Called on every exit path of a run.
    async fn teardown(&mut self) -> Result<(), AdapterError>;
}
