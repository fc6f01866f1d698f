//! The orchestrator: lock, setup, phases, interpretation, teardown.
//!
//! Every run follows the same skeleton regardless of workflow:
//! Idle → Locked/Setup → PhaseExec → Interpret → Teardown → Idle.
//! The run lock token and the unconditional teardown call are what make the
//! two structural invariants hold: at most one run per session, and the
//! runtime is always released no matter how the run ends.
//!
//! Run entry points take `&self`: mutable state lives in `RefCell`s so a
//! host can hold shared references to one orchestrator and fire triggers at
//! will. A trigger that arrives while a run is suspended at an await point
//! bounces off the lock before touching any cell, so it is dropped silently
//! instead of tripping an overlapping borrow.

use std::cell::RefCell;
use std::mem;

use tracing::debug;

use crate::budget::AttemptBudget;
use crate::errors::OrchestratorError;
use crate::exercise::{self, ExerciseSource};
use crate::feedback::{BufferedFeedback, FeedbackChannel};
use crate::gated::{GatedContentStore, LzwStore};
use crate::lock::{ActionKind, RunLock};
use crate::messages::Messages;
use crate::phase::{ExecOptions, PhaseSpec, RunOutcome};
use crate::pipeline::PhasePipeline;
use crate::reveal::RevealGate;
use crate::runtime::{RuntimeAdapter, SetupOutcome};
use crate::section::Section;
use crate::session::{DisclosurePolicy, Session, SessionSnapshot};
use crate::storage::{MemoryStore, PersistedBuffer, snapshot_key};

/// What a trigger produced.
#[derive(Debug)]
pub enum RunSummary {
    /// Another run was active; the trigger was dropped.
    Dropped,
    /// The run went through the full skeleton.
    Completed(RunReport),
}

impl RunSummary {
    pub fn was_dropped(&self) -> bool {
        matches!(self, RunSummary::Dropped)
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunSummary::Dropped => None,
            RunSummary::Completed(report) => Some(report),
        }
    }
}

/// The outcome of one completed run, after interpretation.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The pipeline outcome, with the closing message filled in.
    pub outcome: RunOutcome,
    /// Whether this run performed the one-way disclosure.
    pub revealed_now: bool,
    /// New value for the UI attempts counter, when it should be updated.
    pub counter_update: Option<u32>,
}

/// Which phase list a run executes.
#[derive(Debug, Clone, Copy)]
enum Workflow {
    PublicChecks,
    Validation { use_reference: bool },
}

/// Composes the session, lock, pipeline, budget and reveal gate into the
/// user-triggerable workflows.
pub struct Orchestrator<A: RuntimeAdapter> {
    session: RefCell<Session>,
    source: ExerciseSource,
    adapter: RefCell<A>,
    lock: RunLock,
    feedback: RefCell<Box<dyn FeedbackChannel>>,
    storage: Box<dyn PersistedBuffer>,
    gated_store: Box<dyn GatedContentStore>,
    messages: Messages,
    /// Environment options for the public and secret sections.
    validation_options: ExecOptions,
    /// The current editor text, kept in sync by the widget.
    buffer: RefCell<String>,
    /// Decoded gated content, present once revealed.
    revealed_content: RefCell<Option<String>>,
}

impl<A: RuntimeAdapter> Orchestrator<A> {
    pub fn new(session: Session, source: ExerciseSource, adapter: A) -> Self {
        Self {
            session: RefCell::new(session),
            source,
            adapter: RefCell::new(adapter),
            lock: RunLock::new(),
            feedback: RefCell::new(Box::new(BufferedFeedback::new())),
            storage: Box::new(MemoryStore::new()),
            gated_store: Box::new(LzwStore),
            messages: Messages::default(),
            validation_options: ExecOptions::validation(),
            buffer: RefCell::new(String::new()),
            revealed_content: RefCell::new(None),
        }
    }

    pub fn with_feedback(mut self, feedback: impl FeedbackChannel + 'static) -> Self {
        self.feedback = RefCell::new(Box::new(feedback));
        self
    }

    pub fn with_storage(mut self, storage: impl PersistedBuffer + 'static) -> Self {
        self.storage = Box::new(storage);
        self
    }

    pub fn with_gated_store(mut self, store: impl GatedContentStore + 'static) -> Self {
        self.gated_store = Box::new(store);
        self
    }

    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_validation_options(mut self, options: ExecOptions) -> Self {
        self.validation_options = options;
        self
    }

    /// Restore persisted state and build the initial editor buffer.
    ///
    /// For preview sessions (`AlwaysRevealed`) the gated content is
    /// disclosed immediately; a session reloaded in the revealed state gets
    /// its disclosed content decoded again so it stays visible.
    pub async fn initialize(&self) -> Result<(), OrchestratorError> {
        if let Some(json) = self
            .storage
            .load(&snapshot_key(&self.session_id()))
            .map_err(|source| self.persist_error(source))?
        {
            match serde_json::from_str::<SessionSnapshot>(&json) {
                Ok(snapshot) => self.session.borrow_mut().restore(&snapshot),
                Err(err) => {
                    debug!(session = %self.session_id(), %err, "ignoring corrupt session snapshot")
                }
            }
        }

        let stored = self
            .storage
            .load(&self.session_id())
            .map_err(|source| self.persist_error(source))?;
        *self.buffer.borrow_mut() =
            exercise::start_code(stored.as_deref(), &self.source, &self.messages.tests_marker);
        self.save()?;

        let (revealed, always_revealed) = {
            let session = self.session.borrow();
            (
                session.revealed,
                session.policy == DisclosurePolicy::AlwaysRevealed,
            )
        };
        if always_revealed && !revealed {
            self.perform_reveal().await?;
        } else if revealed && !self.source.gated_blob.is_empty() {
            let content = self
                .gated_store
                .decode(&self.source.gated_blob)
                .await
                .map_err(OrchestratorError::GatedDecode)?;
            *self.revealed_content.borrow_mut() = Some(content);
        }
        Ok(())
    }

    pub fn buffer(&self) -> String {
        self.buffer.borrow().clone()
    }

    /// Sync the editor text from the widget.
    pub fn set_buffer(&self, text: impl Into<String>) {
        *self.buffer.borrow_mut() = text.into();
    }

    /// A snapshot view of the session state.
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    /// The decoded gated content, once disclosed.
    pub fn revealed_content(&self) -> Option<String> {
        self.revealed_content.borrow().clone()
    }

    pub fn is_action_active(&self, kind: ActionKind) -> bool {
        self.lock.is_action_active(kind)
    }

    /// Persist the current editor buffer.
    pub fn save(&self) -> Result<(), OrchestratorError> {
        self.storage
            .save(&self.session_id(), &self.buffer.borrow())
            .map_err(|source| self.persist_error(source))
    }

    /// Reset the buffer to the exercise's starting code and persist it.
    pub fn restart(&self) -> Result<(), OrchestratorError> {
        *self.buffer.borrow_mut() =
            exercise::start_code(None, &self.source, &self.messages.tests_marker);
        self.save()
    }

    /// Toggle comments on the inline test block below the marker line.
    /// Returns false when the buffer holds no marker.
    pub fn toggle_tests_comment(&self) -> Result<bool, OrchestratorError> {
        let toggled = exercise::toggle_tests_comment(&self.buffer.borrow(), &self.messages.tests_marker);
        match toggled {
            Some(toggled) => {
                *self.buffer.borrow_mut() = toggled;
                self.save()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Workflow A: run the editor buffer (with its inline public tests).
    pub async fn run_public_checks(&self) -> Result<RunSummary, OrchestratorError> {
        self.run_workflow(ActionKind::PublicChecks, Workflow::PublicChecks)
            .await
    }

    /// Workflow B: run editor → public → secret and interpret the outcome.
    pub async fn run_validation(&self) -> Result<RunSummary, OrchestratorError> {
        self.run_workflow(
            ActionKind::Validation,
            Workflow::Validation {
                use_reference: false,
            },
        )
        .await
    }

    /// Administrative variant: validate the bundled reference solution
    /// against its own tests. The disclosure policy is forced off for the
    /// duration so the self-check can never trigger a real disclosure, and
    /// both the policy and the persisted learner buffer are restored
    /// unconditionally when the run ends.
    pub async fn run_self_check(&self) -> Result<RunSummary, OrchestratorError> {
        // Bail before touching the policy so a dropped trigger leaves no
        // trace of the transient override.
        if self.lock.active_action().is_some() {
            return Ok(RunSummary::Dropped);
        }

        let saved_policy = mem::replace(
            &mut self.session.borrow_mut().policy,
            DisclosurePolicy::ForceHidden,
        );
        let result = self
            .run_workflow(
                ActionKind::Validation,
                Workflow::Validation {
                    use_reference: true,
                },
            )
            .await;
        self.session.borrow_mut().policy = saved_policy;
        let restore = self.save();

        let summary = result?;
        restore?;
        Ok(summary)
    }

    /// The shared run skeleton. Teardown and lock release happen on every
    /// exit path below the setup call.
    async fn run_workflow(
        &self,
        action: ActionKind,
        workflow: Workflow,
    ) -> Result<RunSummary, OrchestratorError> {
        let token = match self.lock.try_acquire(action) {
            Ok(token) => token,
            Err(err) if err.is_busy() => return Ok(RunSummary::Dropped),
            Err(err) => return Err(err),
        };
        debug!(%action, "run started");

        // Save before anything else, in case an error occurs mid-run.
        let code = match workflow {
            Workflow::Validation {
                use_reference: true,
            } => self.source.reference_solution.clone(),
            _ => self.buffer.borrow().clone(),
        };
        self.storage
            .save(&self.session_id(), &code)
            .map_err(|source| self.persist_error(source))?;

        // These borrows span the whole run; overlapping triggers were
        // already rejected by the lock above.
        let mut adapter = self.adapter.borrow_mut();
        let mut feedback = self.feedback.borrow_mut();
        feedback.append(&self.messages.run_script);

        let interpreted = match adapter.setup().await {
            Ok(setup_outcome) => {
                self.execute_and_interpret(
                    workflow,
                    setup_outcome,
                    code,
                    &mut adapter,
                    &mut **feedback,
                )
                .await
            }
            Err(fault) => Err(OrchestratorError::Adapter(fault)),
        };

        match &interpreted {
            Ok(report) => {
                if let Some(msg) = &report.outcome.final_message {
                    feedback.append(msg);
                } else if report.outcome.stopped {
                    // Every terminal state closes with exactly one line.
                    let line = match report.outcome.failing_section {
                        Some(section) => self
                            .messages
                            .phase_failure_line(section, action == ActionKind::Validation),
                        None => self.messages.runtime_stopped.clone(),
                    };
                    feedback.append(&line);
                }
            }
            Err(_) => {
                feedback.append(&self.messages.adapter_fault);
            }
        }

        // Teardown runs regardless of how the run went; only then do
        // faults propagate.
        let teardown = adapter.teardown().await;
        drop(feedback);
        drop(adapter);
        drop(token);
        debug!(%action, "run finished");

        // Consumed attempts and disclosures survive a faulted teardown.
        self.persist_snapshot()?;
        let report = interpreted?;
        teardown.map_err(OrchestratorError::Adapter)?;
        Ok(RunSummary::Completed(report))
    }

    async fn execute_and_interpret(
        &self,
        workflow: Workflow,
        setup_outcome: SetupOutcome,
        code: String,
        adapter: &mut A,
        feedback: &mut dyn FeedbackChannel,
    ) -> Result<RunReport, OrchestratorError> {
        match workflow {
            Workflow::PublicChecks => {
                if let Some(kind) = setup_outcome.pre_stopped {
                    return Ok(RunReport {
                        outcome: RunOutcome::pre_stopped(kind),
                        revealed_now: false,
                        counter_update: None,
                    });
                }
                let phases = vec![PhaseSpec::new(code, Section::Editor)];
                let mut outcome = self.run_pipeline(&phases, false, adapter, feedback).await?;
                if !outcome.stopped && self.source.has_validation() {
                    outcome.final_message = Some(self.messages.reminder.clone());
                }
                Ok(RunReport {
                    outcome,
                    revealed_now: false,
                    counter_update: None,
                })
            }
            Workflow::Validation { .. } => {
                // The setup preamble is charged like the editor section.
                let mut allow_decrement =
                    AttemptBudget::can_decrement(&self.session.borrow(), Section::Editor);

                let outcome = if let Some(kind) = setup_outcome.pre_stopped {
                    let outcome = RunOutcome::pre_stopped(kind);
                    if !outcome.is_assertion() {
                        // Pre-existing non-assertion failures are not
                        // interpreted for attempt consumption.
                        return Ok(RunReport {
                            outcome,
                            revealed_now: false,
                            counter_update: None,
                        });
                    }
                    outcome
                } else {
                    let phases = vec![
                        PhaseSpec::new(code, Section::Editor),
                        PhaseSpec::with_options(
                            self.source.public_tests.clone(),
                            Section::Public,
                            self.validation_options,
                        ),
                        PhaseSpec::with_options(
                            self.source.secret_tests.clone(),
                            Section::Secret,
                            self.validation_options,
                        ),
                    ];
                    let outcome = self.run_pipeline(&phases, true, adapter, feedback).await?;
                    if let Some(section) = outcome.failing_section {
                        allow_decrement =
                            AttemptBudget::can_decrement(&self.session.borrow(), section);
                    }
                    outcome
                };

                self.interpret(outcome, allow_decrement).await
            }
        }
    }

    async fn run_pipeline(
        &self,
        phases: &[PhaseSpec],
        validating: bool,
        adapter: &mut A,
        feedback: &mut dyn FeedbackChannel,
    ) -> Result<RunOutcome, OrchestratorError> {
        let quiet_success =
            !validating && !self.source.has_validation() && self.source.public_tests.is_empty();
        let messages = &self.messages;

        let outcome = PhasePipeline::run_with_observer(phases, adapter, |phase| {
            let line = if quiet_success {
                messages.success_no_tests.clone()
            } else {
                messages.phase_success_line(phase.section, validating)
            };
            feedback.append(&line);
        })
        .await
        .map_err(OrchestratorError::Adapter)?;
        Ok(outcome)
    }

    /// Apply the budget and reveal policies to a completed validation run.
    async fn interpret(
        &self,
        mut outcome: RunOutcome,
        allow_decrement: bool,
    ) -> Result<RunReport, OrchestratorError> {
        let mut counter_update = None;
        if outcome.stopped && allow_decrement {
            counter_update = AttemptBudget::decrement(&mut self.session.borrow_mut());
        }

        let verdict = RevealGate::evaluate(&self.session.borrow(), &outcome, &self.messages);
        let mut revealed_now = false;
        if verdict.should_reveal {
            revealed_now = self.perform_reveal().await?;
        }
        outcome.final_message = verdict.message;

        Ok(RunReport {
            outcome,
            revealed_now,
            counter_update,
        })
    }

    async fn perform_reveal(&self) -> Result<bool, OrchestratorError> {
        let content = {
            let mut session = self.session.borrow_mut();
            RevealGate::reveal(
                &mut session,
                self.gated_store.as_ref(),
                &self.source.gated_blob,
            )
            .await
        }
        .map_err(OrchestratorError::GatedDecode)?;
        match content {
            Some(content) => {
                *self.revealed_content.borrow_mut() = Some(content);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn persist_snapshot(&self) -> Result<(), OrchestratorError> {
        let json = serde_json::to_string(&self.session.borrow().snapshot())
            .map_err(|err| OrchestratorError::Other(err.into()))?;
        self.storage
            .save(&snapshot_key(&self.session_id()), &json)
            .map_err(|source| self.persist_error(source))
    }

    fn persist_error(&self, source: anyhow::Error) -> OrchestratorError {
        OrchestratorError::PersistFailed {
            session: self.session_id(),
            source,
        }
    }

    fn session_id(&self) -> String {
        self.session.borrow().id.clone()
    }
}
