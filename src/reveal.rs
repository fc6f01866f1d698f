//! One-way disclosure of gated content.
//!
//! The gate owns two decisions: whether the run's outcome triggers a
//! disclosure, and what the closing message says. The actual decode is
//! delegated to the `GatedContentStore` and happens at most once per
//! session; `revealed` never reverts.

use anyhow::Result;
use tracing::debug;

use crate::gated::GatedContentStore;
use crate::messages::Messages;
use crate::phase::RunOutcome;
use crate::session::{DisclosurePolicy, Session};

/// What the gate decided about a completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    /// Perform the one-way disclosure now.
    pub should_reveal: bool,
    /// The run's closing line, if this outcome warrants one.
    pub message: Option<String>,
}

pub struct RevealGate;

impl RevealGate {
    /// Interpret a completed run.
    ///
    /// Content is revealable only when the session carries gated material,
    /// nothing has been revealed yet, and the disclosure policy is normal.
    /// Given revealability, disclosure triggers on success or on an
    /// exhausted attempt budget.
    pub fn evaluate(session: &Session, outcome: &RunOutcome, messages: &Messages) -> Verdict {
        let success = !outcome.stopped;
        let revealable = !session.gated.is_empty()
            && !session.revealed
            && session.policy == DisclosurePolicy::Normal;

        if success {
            if revealable {
                debug!(session = %session.id, "gated content disclosure triggered on success");
                return Verdict {
                    should_reveal: true,
                    message: Some(messages.success_message(Some(&session.gated))),
                };
            }
            // Every successful run closes with the congratulation line,
            // with or without gated material to point at.
            return Verdict {
                should_reveal: false,
                message: Some(messages.success_message(None)),
            };
        }

        if revealable && session.attempts_left.is_spent() {
            debug!(session = %session.id, "gated content disclosure triggered on exhausted budget");
            return Verdict {
                should_reveal: true,
                message: Some(messages.reveal_on_failure(&session.gated)),
            };
        }

        Verdict::default()
    }

    /// Perform the one-way disclosure: decode the blob and flip `revealed`.
    ///
    /// Idempotent: once the session is revealed, later calls return `None`
    /// without touching the store.
    pub async fn reveal(
        session: &mut Session,
        store: &dyn GatedContentStore,
        blob: &str,
    ) -> Result<Option<String>> {
        if session.revealed {
            return Ok(None);
        }
        let content = store.decode(blob).await?;
        session.revealed = true;
        debug!(session = %session.id, "gated content revealed");
        Ok(Some(content))
    }
}
