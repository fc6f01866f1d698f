//! Ordered phase execution with first-failure abort.
//!
//! The pipeline owns exactly one rule: phases run strictly in order, each
//! only after the previous one's outcome is known, and the first failure
//! stops everything. Interpretation of the outcome (attempts, disclosure)
//! belongs to the orchestrator.

use tracing::debug;

use crate::errors::AdapterError;
use crate::phase::{PhaseSpec, RunOutcome};
use crate::runtime::RuntimeAdapter;

pub struct PhasePipeline;

impl PhasePipeline {
    /// Run the phases in order against the adapter.
    ///
    /// Returns `Ok` with a stopped outcome on the first phase failure; an
    /// `Err` means the adapter itself faulted and the run is over.
    pub async fn run<A: RuntimeAdapter + ?Sized>(
        phases: &[PhaseSpec],
        adapter: &mut A,
    ) -> Result<RunOutcome, AdapterError> {
        Self::run_with_observer(phases, adapter, |_| {}).await
    }

    /// Like `run`, with a callback invoked after each successful phase so
    /// the caller can echo progress feedback.
    pub async fn run_with_observer<A, F>(
        phases: &[PhaseSpec],
        adapter: &mut A,
        mut on_phase_ok: F,
    ) -> Result<RunOutcome, AdapterError>
    where
        A: RuntimeAdapter + ?Sized,
        F: FnMut(&PhaseSpec),
    {
        for phase in phases {
            debug!(section = %phase.section, "running phase");
            let outcome = adapter.execute(&phase.code, &phase.options).await?;
            if let Some(kind) = outcome.failure {
                debug!(section = %phase.section, ?kind, "phase failed, aborting pipeline");
                return Ok(RunOutcome::stopped_at(phase.section, kind));
            }
            on_phase_ok(phase);
        }
        Ok(RunOutcome::success())
    }
}
