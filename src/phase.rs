//! Phase specifications and run outcomes.
//!
//! A `PhaseSpec` is one immutable code segment scheduled for execution; a
//! `RunOutcome` is the single value a pipeline run produces and the budget
//! and reveal policies consume.

use serde::{Deserialize, Serialize};

use crate::section::Section;

/// Environment options applied to the runtime before a phase executes.
///
/// The editor section runs with the defaults; validation sections suppress
/// raw stdout and collapse stack traces to assertion-only detail unless the
/// exercise overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOptions {
    /// Forward the executed code's stdout to the user's terminal.
    pub echo_stdout: bool,
    /// Reduce stack traces to the assertion line only.
    pub collapse_stack_trace: bool,
    /// Automatically echo the failing assertion expression when an assert
    /// carries no message of its own.
    pub auto_assert_logging: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            echo_stdout: true,
            collapse_stack_trace: false,
            auto_assert_logging: false,
        }
    }
}

impl ExecOptions {
    /// The restrictive profile used for public and secret test sections.
    pub fn validation() -> Self {
        Self {
            echo_stdout: false,
            collapse_stack_trace: true,
            auto_assert_logging: true,
        }
    }
}

/// One code segment scheduled for execution. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// The code to execute.
    pub code: String,
    /// Which section of the run this segment belongs to.
    pub section: Section,
    /// Runtime environment options for this segment.
    pub options: ExecOptions,
}

impl PhaseSpec {
    /// Create a phase with the default (editor) environment options.
    pub fn new(code: impl Into<String>, section: Section) -> Self {
        Self {
            code: code.into(),
            section,
            options: ExecOptions::default(),
        }
    }

    /// Create a phase with explicit environment options.
    pub fn with_options(code: impl Into<String>, section: Section, options: ExecOptions) -> Self {
        Self {
            code: code.into(),
            section,
            options,
        }
    }
}

/// How a phase's code failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// An assertion in the executed code failed.
    Assertion,
    /// Any other failure: syntax error, runtime exception, and the like.
    Other,
}

/// What a single `execute` call reported back.
///
/// A phase failure is data, not an error: the adapter recovers it into this
/// value and the pipeline decides what to do with it. Adapter-level faults
/// travel separately as `AdapterError`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecOutcome {
    /// `None` when the code ran to completion.
    pub failure: Option<FailureKind>,
}

impl ExecOutcome {
    /// The code ran without failure.
    pub fn ok() -> Self {
        Self { failure: None }
    }

    /// The code failed with the given kind.
    pub fn failed(kind: FailureKind) -> Self {
        Self {
            failure: Some(kind),
        }
    }
}

/// The result of one pipeline run, produced once and then consumed by the
/// attempt-budget and reveal policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// True when a phase failed and the pipeline aborted.
    pub stopped: bool,
    /// How the failing phase failed, if any.
    pub failure_kind: Option<FailureKind>,
    /// The section whose phase failed. `None` for runs that never entered
    /// the pipeline (a pre-existing stopped runtime).
    pub failing_section: Option<Section>,
    /// The single closing line to surface to the user, if any.
    pub final_message: Option<String>,
}

impl RunOutcome {
    /// All phases ran to completion.
    pub fn success() -> Self {
        Self::default()
    }

    /// The pipeline aborted at the given section.
    pub fn stopped_at(section: Section, kind: FailureKind) -> Self {
        Self {
            stopped: true,
            failure_kind: Some(kind),
            failing_section: Some(section),
            final_message: None,
        }
    }

    /// The runtime was already stopped before any phase ran.
    pub fn pre_stopped(kind: FailureKind) -> Self {
        Self {
            stopped: true,
            failure_kind: Some(kind),
            failing_section: None,
            final_message: None,
        }
    }

    /// Whether the failure, if any, was an assertion failure.
    pub fn is_assertion(&self) -> bool {
        self.failure_kind == Some(FailureKind::Assertion)
    }
}
