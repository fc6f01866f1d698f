//! The persistent output log visible to the user.
//!
//! The orchestrator appends human-readable lines here: the run-start echo,
//! per-section success lines, and exactly one closing line per terminal
//! state. The rendering side (terminal widget) is out of scope.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

/// Appends lines to the session's visible output log.
pub trait FeedbackChannel {
    fn append(&mut self, line: &str);
}

/// In-memory channel with shared handles, so callers can keep a clone for
/// inspection after handing one to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct BufferedFeedback {
    lines: Rc<RefCell<Vec<String>>>,
}

impl BufferedFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.lines.borrow().last().cloned()
    }
}

impl FeedbackChannel for BufferedFeedback {
    fn append(&mut self, line: &str) {
        info!(feedback = line);
        self.lines.borrow_mut().push(line.to_string());
    }
}
