//! Per-session single-flight guard.
//!
//! At most one orchestration run may be active per session. Acquisition
//! never queues or blocks: a second trigger while a token is outstanding
//! fails immediately with `OrchestratorError::Busy` and the trigger is
//! dropped. Release is tied to the token's `Drop`, so it happens on every
//! exit path of the guarded workflow, including early returns on adapter
//! faults.
//!
//! The lock is a per-session value object, not a module-level singleton, so
//! several editor widgets on one page never interfere with each other.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::OrchestratorError;

/// Which user-triggerable workflow a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Run the editor buffer and its inline public tests.
    PublicChecks,
    /// Run the full editor → public → secret validation.
    Validation,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::PublicChecks => write!(f, "public checks"),
            ActionKind::Validation => write!(f, "validation"),
        }
    }
}

/// Single-flight run lock for one session.
///
/// The active slot is shared with outstanding tokens so a token can clear
/// it from wherever it ends up being dropped.
#[derive(Debug, Clone, Default)]
pub struct RunLock {
    active: Rc<Cell<Option<ActionKind>>>,
}

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to start a run of the given kind.
    ///
    /// Fails with `Busy` if any run is already active; there is no queueing.
    pub fn try_acquire(&self, kind: ActionKind) -> Result<RunToken, OrchestratorError> {
        if let Some(active) = self.active.get() {
            debug!(%active, requested = %kind, "run lock busy, dropping trigger");
            return Err(OrchestratorError::Busy { active });
        }
        self.active.set(Some(kind));
        Ok(RunToken {
            active: Rc::clone(&self.active),
            kind,
        })
    }

    /// The kind of the in-flight run, if any.
    pub fn active_action(&self) -> Option<ActionKind> {
        self.active.get()
    }

    /// Whether the in-flight run, if any, is of the given kind.
    pub fn is_action_active(&self, kind: ActionKind) -> bool {
        self.active.get() == Some(kind)
    }

    /// Explicit release, for call sites that prefer a named operation over
    /// dropping the token.
    pub fn release(token: RunToken) {
        drop(token);
    }
}

/// Proof of an acquired run slot. Releasing happens on drop.
#[derive(Debug)]
pub struct RunToken {
    active: Rc<Cell<Option<ActionKind>>>,
    kind: ActionKind,
}

impl RunToken {
    pub fn kind(&self) -> ActionKind {
        self.kind
    }
}

impl Drop for RunToken {
    fn drop(&mut self) {
        self.active.set(None);
    }
}
