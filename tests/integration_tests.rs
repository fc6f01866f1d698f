//! End-to-end tests driving the orchestrator through a scripted runtime.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;

use gradex::errors::AdapterError;
use gradex::exercise::ExerciseSource;
use gradex::feedback::BufferedFeedback;
use gradex::gated::PlainStore;
use gradex::lock::ActionKind;
use gradex::messages::Messages;
use gradex::phase::{ExecOptions, ExecOutcome, FailureKind};
use gradex::runtime::{RuntimeAdapter, SetupOutcome};
use gradex::section::Section;
use gradex::storage::MemoryStore;
use gradex::{Attempts, DisclosurePolicy, GatedContent, Orchestrator, OrchestratorError, Session};

#[derive(Debug, Default)]
struct AdapterLog {
    setups: usize,
    teardowns: usize,
    executed: Vec<String>,
}

/// Runtime double scripted by code content: a phase fails when its code
/// contains the configured snippet. Each `execute` yields once, like a real
/// interpreter round-trip, so runs suspend mid-flight. The log handle
/// survives handing the adapter to the orchestrator.
#[derive(Clone, Default)]
struct ScriptedAdapter {
    log: Rc<RefCell<AdapterLog>>,
    fail_on: Option<(String, FailureKind)>,
    pre_stopped: Option<FailureKind>,
    setup_fault: bool,
    teardown_fault: bool,
}

impl ScriptedAdapter {
    fn passing() -> Self {
        Self::default()
    }

    fn failing_on(snippet: &str, kind: FailureKind) -> Self {
        Self {
            fail_on: Some((snippet.to_string(), kind)),
            ..Self::default()
        }
    }

    fn executed(&self) -> Vec<String> {
        self.log.borrow().executed.clone()
    }

    fn setups(&self) -> usize {
        self.log.borrow().setups
    }

    fn teardowns(&self) -> usize {
        self.log.borrow().teardowns
    }
}

#[async_trait(?Send)]
impl RuntimeAdapter for ScriptedAdapter {
    async fn setup(&mut self) -> Result<SetupOutcome, AdapterError> {
        self.log.borrow_mut().setups += 1;
        if self.setup_fault {
            return Err(AdapterError::Setup("interpreter failed to boot".to_string()));
        }
        Ok(match self.pre_stopped {
            Some(kind) => SetupOutcome::stopped(kind),
            None => SetupOutcome::ready(),
        })
    }

    async fn execute(
        &mut self,
        code: &str,
        _options: &ExecOptions,
    ) -> Result<ExecOutcome, AdapterError> {
        self.log.borrow_mut().executed.push(code.to_string());
        tokio::task::yield_now().await;
        match &self.fail_on {
            Some((snippet, kind)) if code.contains(snippet) => Ok(ExecOutcome::failed(*kind)),
            _ => Ok(ExecOutcome::ok()),
        }
    }

    async fn teardown(&mut self) -> Result<(), AdapterError> {
        self.log.borrow_mut().teardowns += 1;
        if self.teardown_fault {
            return Err(AdapterError::Teardown("interpreter hung on release".to_string()));
        }
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn exercise() -> ExerciseSource {
    ExerciseSource {
        user_content: "def square(x):\n    ...".to_string(),
        public_tests: "assert square(2) == 4".to_string(),
        secret_tests: "assert square(-3) == 9".to_string(),
        reference_solution: "def square(x):\n    return x * x".to_string(),
        gated_blob: "<h3>Solution</h3>".to_string(),
    }
}

async fn orchestrator(
    attempts: Attempts,
    gated: GatedContent,
    adapter: ScriptedAdapter,
) -> (Orchestrator<ScriptedAdapter>, BufferedFeedback) {
    init_tracing();
    let session = Session::new("ide-1", attempts, gated);
    let feedback = BufferedFeedback::new();
    let orch = Orchestrator::new(session, exercise(), adapter)
        .with_feedback(feedback.clone())
        .with_gated_store(PlainStore);
    orch.initialize().await.unwrap();
    (orch, feedback)
}

#[tokio::test]
async fn test_editor_failure_does_not_consume_an_attempt() {
    let adapter = ScriptedAdapter::failing_on("square(", FailureKind::Other);
    let (orch, feedback) =
        orchestrator(Attempts::Remaining(3), GatedContent::BOTH, adapter.clone()).await;
    orch.set_buffer("def square(x:\n    return x");

    let summary = orch.run_validation().await.unwrap();
    let report = summary.report().unwrap();
    assert!(report.outcome.stopped);
    assert_eq!(report.outcome.failing_section, Some(Section::Editor));
    assert!(report.counter_update.is_none());
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(3));
    assert!(!orch.session().revealed);
    // The public and secret phases never ran.
    assert_eq!(adapter.executed().len(), 1);
    assert_eq!(adapter.teardowns(), 1);
    assert_eq!(
        feedback.last().as_deref(),
        Some("Validation - editor code: failure")
    );
}

#[tokio::test]
async fn test_public_failure_consumes_one_attempt_without_reveal() {
    let adapter = ScriptedAdapter::failing_on("square(2)", FailureKind::Assertion);
    let (orch, feedback) =
        orchestrator(Attempts::Remaining(3), GatedContent::BOTH, adapter.clone()).await;
    orch.set_buffer("def square(x):\n    return x");

    let report = orch.run_validation().await.unwrap().report().unwrap().clone();
    assert_eq!(report.outcome.failing_section, Some(Section::Public));
    assert_eq!(report.counter_update, Some(2));
    assert!(!report.revealed_now);
    assert!(report.outcome.final_message.is_none());
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(2));
    assert!(!orch.session().revealed);
    assert_eq!(
        feedback.last().as_deref(),
        Some("Validation - public tests: failure")
    );
}

#[tokio::test]
async fn test_exhausting_the_budget_reveals_on_failure() {
    let adapter = ScriptedAdapter::failing_on("square(-3)", FailureKind::Assertion);
    let (orch, _) = orchestrator(Attempts::Remaining(1), GatedContent::BOTH, adapter).await;
    orch.set_buffer("def square(x):\n    return x * x if x > 0 else 0");

    let report = orch.run_validation().await.unwrap().report().unwrap().clone();
    assert_eq!(report.outcome.failing_section, Some(Section::Secret));
    assert_eq!(report.counter_update, Some(0));
    assert!(report.revealed_now);
    assert_eq!(
        report.outcome.final_message.as_deref(),
        Some("The validation failed. The solution and the remarks are now available.")
    );
    assert!(orch.session().revealed);
    assert_eq!(orch.revealed_content().as_deref(), Some("<h3>Solution</h3>"));

    // A later failing run neither decrements further nor re-reveals.
    let report = orch.run_validation().await.unwrap().report().unwrap().clone();
    assert!(report.counter_update.is_none());
    assert!(!report.revealed_now);
    assert!(report.outcome.final_message.is_none());
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(0));
}

#[tokio::test]
async fn test_full_success_with_no_gated_content_is_a_plain_success() {
    let adapter = ScriptedAdapter::passing();
    let (orch, feedback) =
        orchestrator(Attempts::Remaining(3), GatedContent::NONE, adapter.clone()).await;

    let report = orch.run_validation().await.unwrap().report().unwrap().clone();
    assert!(!report.outcome.stopped);
    assert!(report.counter_update.is_none());
    assert!(!report.revealed_now);
    let msg = report.outcome.final_message.unwrap();
    assert!(msg.contains("You passed all the tests!"));
    assert!(!msg.contains("Don't hesitate"));
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(3));

    // All three sections ran and echoed their success lines.
    assert_eq!(adapter.executed().len(), 3);
    let lines = feedback.lines();
    assert!(lines.contains(&"Validation - editor code: success".to_string()));
    assert!(lines.contains(&"Validation - public tests: success".to_string()));
    assert!(lines.contains(&"Validation - secret tests: success".to_string()));
}

#[tokio::test]
async fn test_full_success_reveals_gated_content() {
    let adapter = ScriptedAdapter::passing();
    let (orch, _) = orchestrator(Attempts::Remaining(3), GatedContent::BOTH, adapter).await;

    let report = orch.run_validation().await.unwrap().report().unwrap().clone();
    assert!(report.revealed_now);
    let msg = report.outcome.final_message.unwrap();
    assert!(msg.ends_with("the solution and the remarks."));
    assert!(orch.session().revealed);
    // Success never consumes an attempt.
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(3));
}

#[tokio::test]
async fn test_public_checks_success_reminds_about_validation() {
    let adapter = ScriptedAdapter::passing();
    let (orch, feedback) =
        orchestrator(Attempts::Remaining(3), GatedContent::BOTH, adapter.clone()).await;

    let report = orch.run_public_checks().await.unwrap().report().unwrap().clone();
    assert!(!report.outcome.stopped);
    assert!(!report.revealed_now);
    assert!(report.counter_update.is_none());
    assert_eq!(
        report.outcome.final_message.as_deref(),
        Some("Don't forget to validate the code against the secret tests!")
    );
    assert!(!orch.session().revealed);

    // Only the editor buffer ran.
    assert_eq!(adapter.executed().len(), 1);
    assert!(feedback.lines().contains(&"editor code: success".to_string()));
}

#[tokio::test]
async fn test_public_checks_without_any_tests_reports_done() {
    init_tracing();
    let source = ExerciseSource {
        user_content: "x = 1".to_string(),
        ..ExerciseSource::default()
    };
    let session = Session::new("ide-plain", Attempts::Unlimited, GatedContent::NONE);
    let feedback = BufferedFeedback::new();
    let orch = Orchestrator::new(session, source, ScriptedAdapter::passing())
        .with_feedback(feedback.clone());
    orch.initialize().await.unwrap();

    let report = orch.run_public_checks().await.unwrap().report().unwrap().clone();
    assert!(!report.outcome.stopped);
    assert!(report.outcome.final_message.is_none());
    assert!(feedback.lines().contains(&"Done without error.".to_string()));
}

#[tokio::test]
async fn test_self_check_never_reveals_and_restores_policy() {
    // The reference solution fails its own secret tests: a broken exercise.
    let adapter = ScriptedAdapter::failing_on("square(-3)", FailureKind::Assertion);
    let (orch, _) =
        orchestrator(Attempts::Remaining(1), GatedContent::BOTH, adapter.clone()).await;
    let learner_buffer = orch.buffer();

    let report = orch.run_self_check().await.unwrap().report().unwrap().clone();
    assert_eq!(report.outcome.failing_section, Some(Section::Secret));
    assert!(!report.revealed_now);
    assert!(report.counter_update.is_none());

    // No reveal, no attempt consumed, and the override did not stick.
    assert!(!orch.session().revealed);
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(1));
    assert_eq!(orch.session().policy, DisclosurePolicy::Normal);

    // The run executed the bundled solution, not the learner's buffer.
    assert_eq!(adapter.executed()[0], exercise().reference_solution);
    assert_eq!(orch.buffer(), learner_buffer);
}

#[tokio::test]
async fn test_second_trigger_during_active_run_is_dropped() {
    let adapter = ScriptedAdapter::passing();
    let (orch, _) = orchestrator(Attempts::Remaining(3), GatedContent::NONE, adapter.clone()).await;

    // The validation suspends inside execute; the second trigger lands
    // while it is in flight and must bounce off the lock.
    let (first, second) = tokio::join!(orch.run_validation(), orch.run_public_checks());
    assert!(!first.unwrap().was_dropped());
    assert!(second.unwrap().was_dropped());

    // The dropped trigger never reached the runtime.
    assert_eq!(adapter.setups(), 1);
    assert_eq!(adapter.executed().len(), 3);
    assert_eq!(adapter.teardowns(), 1);

    // The lock was released; a fresh trigger goes through.
    assert!(!orch.is_action_active(ActionKind::Validation));
    assert!(!orch.run_validation().await.unwrap().was_dropped());
}

#[tokio::test]
async fn test_self_check_trigger_during_active_run_is_dropped() {
    let adapter = ScriptedAdapter::passing();
    let (orch, _) = orchestrator(Attempts::Remaining(3), GatedContent::NONE, adapter).await;

    let (first, second) = tokio::join!(orch.run_validation(), orch.run_self_check());
    assert!(!first.unwrap().was_dropped());
    assert!(second.unwrap().was_dropped());
    // The transient override left no trace.
    assert_eq!(orch.session().policy, DisclosurePolicy::Normal);
}

#[tokio::test]
async fn test_setup_fault_still_tears_down_and_releases_the_lock() {
    let adapter = ScriptedAdapter {
        setup_fault: true,
        ..ScriptedAdapter::default()
    };
    let (orch, feedback) =
        orchestrator(Attempts::Remaining(3), GatedContent::BOTH, adapter.clone()).await;

    let err = orch.run_validation().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Adapter(AdapterError::Setup(_))));
    assert_eq!(adapter.teardowns(), 1);
    assert_eq!(
        feedback.last().as_deref(),
        Some("Something went wrong while preparing the runtime. Please try again.")
    );

    // The lock was released on the error path; state is untouched.
    assert!(!orch.is_action_active(ActionKind::Validation));
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(3));
    assert!(!orch.session().revealed);
}

#[tokio::test]
async fn test_teardown_fault_does_not_lose_consumed_state() {
    init_tracing();
    let store = MemoryStore::new();
    let mut adapter = ScriptedAdapter::failing_on("square(-3)", FailureKind::Assertion);
    adapter.teardown_fault = true;

    let session = Session::new("ide-1", Attempts::Remaining(1), GatedContent::BOTH);
    let orch = Orchestrator::new(session, exercise(), adapter)
        .with_storage(store.clone())
        .with_gated_store(PlainStore);
    orch.initialize().await.unwrap();
    orch.set_buffer("def square(x):\n    return x * x if x > 0 else 0");

    // The run decrements to zero and reveals, then teardown faults.
    let err = orch.run_validation().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Adapter(AdapterError::Teardown(_))));
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(0));
    assert!(orch.session().revealed);
    drop(orch);

    // A reloaded widget still sees the consumed attempt and the disclosure.
    let session = Session::new("ide-1", Attempts::Remaining(1), GatedContent::BOTH);
    let orch = Orchestrator::new(session, exercise(), ScriptedAdapter::passing())
        .with_storage(store)
        .with_gated_store(PlainStore);
    orch.initialize().await.unwrap();
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(0));
    assert!(orch.session().revealed);
    assert_eq!(orch.revealed_content().as_deref(), Some("<h3>Solution</h3>"));
}

#[tokio::test]
async fn test_pre_stopped_non_assertion_is_not_interpreted() {
    let adapter = ScriptedAdapter {
        pre_stopped: Some(FailureKind::Other),
        ..ScriptedAdapter::default()
    };
    let (orch, feedback) =
        orchestrator(Attempts::Remaining(1), GatedContent::BOTH, adapter.clone()).await;

    let report = orch.run_validation().await.unwrap().report().unwrap().clone();
    assert!(report.outcome.stopped);
    assert!(report.outcome.failing_section.is_none());
    assert_eq!(
        feedback.last().as_deref(),
        Some("The environment failed before your code could run.")
    );
    assert!(report.counter_update.is_none());
    assert!(!report.revealed_now);
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(1));
    // No phase ever executed.
    assert!(adapter.executed().is_empty());
    assert_eq!(adapter.teardowns(), 1);
}

#[tokio::test]
async fn test_pre_stopped_assertion_charges_the_editor_boundary() {
    init_tracing();
    let adapter = ScriptedAdapter {
        pre_stopped: Some(FailureKind::Assertion),
        ..ScriptedAdapter::default()
    };
    let session = Session::new("ide-1", Attempts::Remaining(1), GatedContent::BOTH)
        .with_decrement_boundary(Section::Editor);
    let orch = Orchestrator::new(session, exercise(), adapter).with_gated_store(PlainStore);
    orch.initialize().await.unwrap();

    let report = orch.run_validation().await.unwrap().report().unwrap().clone();
    assert_eq!(report.counter_update, Some(0));
    assert!(report.revealed_now);
    assert!(orch.session().revealed);
}

#[tokio::test]
async fn test_state_survives_a_widget_reload() {
    init_tracing();
    let store = MemoryStore::new();
    let adapter = ScriptedAdapter::failing_on("square(2)", FailureKind::Assertion);

    let session = Session::new("ide-1", Attempts::Remaining(3), GatedContent::BOTH);
    let orch = Orchestrator::new(session, exercise(), adapter)
        .with_storage(store.clone())
        .with_gated_store(PlainStore);
    orch.initialize().await.unwrap();
    orch.set_buffer("def square(x):\n    return x\n");
    orch.save().unwrap();
    orch.run_validation().await.unwrap();
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(2));
    drop(orch);

    // A fresh widget with the same store picks up the buffer and counter.
    let session = Session::new("ide-1", Attempts::Remaining(3), GatedContent::BOTH);
    let orch = Orchestrator::new(session, exercise(), ScriptedAdapter::passing())
        .with_storage(store)
        .with_gated_store(PlainStore);
    orch.initialize().await.unwrap();
    assert_eq!(orch.buffer(), "def square(x):\n    return x\n");
    assert_eq!(orch.session().attempts_left, Attempts::Remaining(2));
}

#[tokio::test]
async fn test_always_revealed_session_discloses_at_startup() {
    init_tracing();
    let session = Session::new("ide-preview", Attempts::Remaining(3), GatedContent::BOTH)
        .with_policy(DisclosurePolicy::AlwaysRevealed);
    let orch = Orchestrator::new(session, exercise(), ScriptedAdapter::passing())
        .with_gated_store(PlainStore);
    orch.initialize().await.unwrap();

    assert!(orch.session().revealed);
    assert_eq!(orch.revealed_content().as_deref(), Some("<h3>Solution</h3>"));
}

#[tokio::test]
async fn test_initialize_builds_buffer_and_toggle_roundtrips() {
    let (orch, _) = orchestrator(
        Attempts::Remaining(3),
        GatedContent::NONE,
        ScriptedAdapter::passing(),
    )
    .await;

    assert_eq!(
        orch.buffer(),
        "def square(x):\n    ...\n\n# Tests\nassert square(2) == 4\n"
    );

    assert!(orch.toggle_tests_comment().unwrap());
    assert!(orch.buffer().contains("#assert square(2) == 4"));
    assert!(orch.toggle_tests_comment().unwrap());
    assert!(orch.buffer().contains("\nassert square(2) == 4"));

    orch.set_buffer("scratch");
    orch.restart().unwrap();
    assert_eq!(
        orch.buffer(),
        "def square(x):\n    ...\n\n# Tests\nassert square(2) == 4\n"
    );
}

#[tokio::test]
async fn test_relocalized_messages_flow_through_a_run() {
    init_tracing();
    let messages = Messages::from_toml_str(
        r#"
fail_head = "La validation a échoué."
reveal_solution = "la solution"
reveal_join = "et"
reveal_remarks = "les remarques"
fail_tail_plural = "sont maintenant disponibles"
"#,
    )
    .unwrap();

    let adapter = ScriptedAdapter::failing_on("square(-3)", FailureKind::Assertion);
    let session = Session::new("ide-fr", Attempts::Remaining(1), GatedContent::BOTH);
    let orch = Orchestrator::new(session, exercise(), adapter)
        .with_gated_store(PlainStore)
        .with_messages(messages);
    orch.initialize().await.unwrap();
    orch.set_buffer("def square(x):\n    return x * x if x > 0 else 0");

    let report = orch.run_validation().await.unwrap().report().unwrap().clone();
    assert_eq!(
        report.outcome.final_message.as_deref(),
        Some("La validation a échoué. La solution et les remarques sont maintenant disponibles.")
    );
}
