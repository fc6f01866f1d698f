//! Per-widget session state.
//!
//! One `Session` exists per exercise editor instance and lives as long as
//! the widget. It owns the consumable attempt counter, the one-way `revealed`
//! flag, and the disclosure policy switch.

use serde::{Deserialize, Serialize};

use crate::section::Section;

/// The remaining-attempts counter.
///
/// Finite values may go down to −1: the −1 marker means "just exhausted" and
/// exists so that the exhaustion transition fires exactly once. It is never
/// shown to the user; `displayable` is the only rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attempts {
    Unlimited,
    Remaining(i32),
}

impl Attempts {
    /// The value after one consumed attempt. Unlimited never changes;
    /// finite values floor at −1.
    pub fn decremented(self) -> Self {
        match self {
            Attempts::Unlimited => Attempts::Unlimited,
            Attempts::Remaining(n) => Attempts::Remaining((n - 1).max(-1)),
        }
    }

    /// The value the UI counter may render: finite and non-negative only.
    pub fn displayable(&self) -> Option<u32> {
        match self {
            Attempts::Remaining(n) if *n >= 0 => Some(*n as u32),
            _ => None,
        }
    }

    /// Exactly zero attempts left, the disclosure trigger.
    pub fn is_spent(&self) -> bool {
        matches!(self, Attempts::Remaining(0))
    }
}

/// Which gated materials this exercise carries. Fixed at session creation.
///
/// (The upstream data source encodes this as a two-bit mask; the explicit
/// struct keeps the two flags from being confused with each other.)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatedContent {
    pub has_solution: bool,
    pub has_remarks: bool,
}

impl GatedContent {
    pub const NONE: GatedContent = GatedContent {
        has_solution: false,
        has_remarks: false,
    };

    pub const BOTH: GatedContent = GatedContent {
        has_solution: true,
        has_remarks: true,
    };

    /// Decode the wire-level two-bit mask (bit 0: solution, bit 1: remarks).
    pub fn from_mask(mask: u8) -> Self {
        Self {
            has_solution: mask & 1 != 0,
            has_remarks: mask & 2 != 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.has_solution && !self.has_remarks
    }

    pub fn both(&self) -> bool {
        self.has_solution && self.has_remarks
    }
}

/// Session-level switch controlling whether reveal checks run at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosurePolicy {
    /// Reveal logic is active.
    #[default]
    Normal,
    /// Content starts disclosed (e.g. teacher preview builds).
    AlwaysRevealed,
    /// Reveal checks are bypassed for the duration of a self-check run.
    /// Always transient: the orchestrator restores the previous policy when
    /// the run ends.
    ForceHidden,
}

/// State for one exercise editor instance.
#[derive(Debug, Clone)]
pub struct Session {
    /// Stable identifier, also the persistence key for the editor buffer.
    pub id: String,
    pub attempts_left: Attempts,
    /// One-way flag: flips to true at most once, never reverts.
    pub revealed: bool,
    pub gated: GatedContent,
    pub policy: DisclosurePolicy,
    /// Earliest section at which a failure may consume an attempt.
    pub decrement_boundary: Section,
}

impl Session {
    pub fn new(id: impl Into<String>, attempts: Attempts, gated: GatedContent) -> Self {
        Self {
            id: id.into(),
            attempts_left: attempts,
            revealed: false,
            gated,
            policy: DisclosurePolicy::Normal,
            decrement_boundary: Section::Public,
        }
    }

    pub fn with_decrement_boundary(mut self, boundary: Section) -> Self {
        self.decrement_boundary = boundary;
        self
    }

    pub fn with_policy(mut self, policy: DisclosurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The persistable view of the mutable session fields.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            attempts_left: self.attempts_left,
            revealed: self.revealed,
        }
    }

    /// Reapply a previously persisted snapshot. The revealed flag only ever
    /// moves forward.
    pub fn restore(&mut self, snapshot: &SessionSnapshot) {
        self.attempts_left = snapshot.attempts_left;
        self.revealed = self.revealed || snapshot.revealed;
    }
}

/// The mutable session fields, serialized alongside the editor buffer so a
/// reloaded widget picks up where the learner left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub attempts_left: Attempts,
    pub revealed: bool,
}
