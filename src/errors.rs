//! Typed error hierarchy for the orchestrator.
//!
//! Two top-level enums cover the two failure surfaces:
//! - `OrchestratorError`: workflow-level failures (busy lock, persistence,
//!   adapter faults bubbling up)
//! - `AdapterError`: the sandboxed runtime itself failed outside the
//!   phase/outcome protocol
//!
//! Phase failures are *not* errors: they are recovered into `RunOutcome`
//! values and never cross the orchestrator boundary as `Err`.

use thiserror::Error;

use crate::lock::ActionKind;

/// Errors from the orchestration workflows.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A trigger arrived while a run was already active. Recovered locally
    /// by dropping the trigger; never user-visible.
    #[error("a {active} run is already active for this session")]
    Busy { active: ActionKind },

    #[error("runtime adapter fault: {0}")]
    Adapter(#[from] AdapterError),

    #[error("failed to persist editor buffer for session {session}: {source}")]
    PersistFailed {
        session: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to decode gated content: {0}")]
    GatedDecode(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Whether this error is the recoverable single-flight rejection.
    pub fn is_busy(&self) -> bool {
        matches!(self, OrchestratorError::Busy { .. })
    }
}

/// Errors from the sandboxed runtime adapter, outside the phase protocol.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("runtime setup failed: {0}")]
    Setup(String),

    #[error("runtime crashed during execution: {0}")]
    Execution(String),

    #[error("runtime teardown failed: {0}")]
    Teardown(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
