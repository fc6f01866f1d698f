//! Attempt-budget policy.
//!
//! Decides when a failed run may consume an attempt, and applies the
//! consumption. The decrement is applied at most once per completed run;
//! the orchestrator enforces the once-per-run part by calling `decrement`
//! a single time after the pipeline returns.

use tracing::debug;

use crate::section::Section;
use crate::session::{DisclosurePolicy, Session};

pub struct AttemptBudget;

impl AttemptBudget {
    /// Whether a failure in `failing` may consume an attempt: true iff the
    /// section sits at or after the session's decrement boundary in the
    /// editor < public < secret order.
    pub fn can_decrement(session: &Session, failing: Section) -> bool {
        failing >= session.decrement_boundary
    }

    /// Consume one attempt.
    ///
    /// No-op when content is already revealed, a disclosure policy override
    /// is active, or the budget is unlimited. Returns the new value for the
    /// UI counter when it should be updated; the −1 "just exhausted" marker
    /// is never handed to the UI.
    pub fn decrement(session: &mut Session) -> Option<u32> {
        if session.revealed || session.policy != DisclosurePolicy::Normal {
            return None;
        }
        session.attempts_left = session.attempts_left.decremented();
        debug!(session = %session.id, attempts = ?session.attempts_left, "attempt consumed");
        session.attempts_left.displayable()
    }
}
