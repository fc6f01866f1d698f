//! User-facing phrase table and closing-message composition.
//!
//! All human-readable lines the orchestrator emits come from this table so
//! deployments can relocalize them from a TOML file. Missing keys fall back
//! to the built-in English phrases.
//!
//! # Configuration File Format
//!
//! ```toml
//! run_script = "Running the script..."
//! validation_prefix = "Validation - "
//! success_word = "success"
//! fail_head = "The validation failed."
//! reveal_solution = "the solution"
//! reveal_remarks = "the remarks"
//! fail_tail = "is now available"
//! fail_tail_plural = "are now available"
//! tests_marker = "# Tests"
//! success_emojis = ["🎉", "🚀"]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::section::Section;
use crate::session::GatedContent;

/// The phrase table. Construct with `Messages::default()` or load overrides
/// from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    /// Echoed when a run starts.
    pub run_script: String,
    /// Prefix for per-section success lines during full validation.
    pub validation_prefix: String,
    pub editor_label: String,
    pub public_label: String,
    pub secret_label: String,
    pub success_word: String,
    pub failure_word: String,
    /// Success line when the editor holds no tests and no validation exists.
    pub success_no_tests: String,
    /// Reminder appended when public checks pass but a validation workflow
    /// still exists.
    pub reminder: String,
    pub success_head: String,
    pub success_head_extra: String,
    pub success_emojis: Vec<String>,
    /// Intro of the reveal clause on success.
    pub success_tail: String,
    pub fail_head: String,
    pub reveal_solution: String,
    pub reveal_join: String,
    pub reveal_remarks: String,
    pub fail_tail: String,
    pub fail_tail_plural: String,
    /// Generic line surfaced when the runtime adapter itself faults.
    pub adapter_fault: String,
    /// Line surfaced when the runtime was already stopped before any phase
    /// could run.
    pub runtime_stopped: String,
    /// Marker line separating the learner's code from the inline test block.
    pub tests_marker: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            run_script: "Running the script...".to_string(),
            validation_prefix: "Validation - ".to_string(),
            editor_label: "editor code".to_string(),
            public_label: "public tests".to_string(),
            secret_label: "secret tests".to_string(),
            success_word: "success".to_string(),
            failure_word: "failure".to_string(),
            success_no_tests: "Done without error.".to_string(),
            reminder: "Don't forget to validate the code against the secret tests!".to_string(),
            success_head: "Well done!".to_string(),
            success_head_extra: "You passed all the tests!".to_string(),
            success_emojis: vec![
                "🎉".to_string(),
                "✨".to_string(),
                "🚀".to_string(),
                "💪".to_string(),
            ],
            success_tail: "Don't hesitate to look at".to_string(),
            fail_head: "The validation failed.".to_string(),
            reveal_solution: "the solution".to_string(),
            reveal_join: "and".to_string(),
            reveal_remarks: "the remarks".to_string(),
            fail_tail: "is now available".to_string(),
            fail_tail_plural: "are now available".to_string(),
            adapter_fault: "Something went wrong while preparing the runtime. Please try again."
                .to_string(),
            runtime_stopped: "The environment failed before your code could run.".to_string(),
            tests_marker: "# Tests".to_string(),
        }
    }
}

impl Messages {
    /// Load a phrase table from a TOML file; missing keys keep their
    /// built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read messages file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse messages TOML")
    }

    pub fn section_label(&self, section: Section) -> &str {
        match section {
            Section::Editor => &self.editor_label,
            Section::Public => &self.public_label,
            Section::Secret => &self.secret_label,
        }
    }

    /// The per-section success line echoed after a phase completes.
    pub fn phase_success_line(&self, section: Section, during_validation: bool) -> String {
        let intro = if during_validation {
            self.validation_prefix.as_str()
        } else {
            ""
        };
        format!(
            "{}{}: {}",
            intro,
            self.section_label(section),
            self.success_word
        )
    }

    /// The closing line for a run that stopped at a phase, when no richer
    /// message (reveal, reminder) applies.
    pub fn phase_failure_line(&self, section: Section, during_validation: bool) -> String {
        let intro = if during_validation {
            self.validation_prefix.as_str()
        } else {
            ""
        };
        format!(
            "{}{}: {}",
            intro,
            self.section_label(section),
            self.failure_word
        )
    }

    /// The closing message for a fully successful run. When `revealable`
    /// carries the gated-content flags, a trailing clause points the learner
    /// at the newly disclosed material.
    pub fn success_message(&self, revealable: Option<&GatedContent>) -> String {
        let more = match revealable {
            Some(gated) if !gated.is_empty() => format!(
                "\n{} {}.",
                self.success_tail,
                self.reveal_clauses(gated).join(" ")
            ),
            _ => String::new(),
        };
        format!(
            "{} {} {}{}",
            self.success_head,
            self.pick_emoji(),
            self.success_head_extra,
            more
        )
    }

    /// The closing message when the budget ran out and gated content is
    /// disclosed on failure. The trailing clause pluralizes when both a
    /// solution and remarks are present.
    pub fn reveal_on_failure(&self, gated: &GatedContent) -> String {
        let mut clauses = self.reveal_clauses(gated);
        if let Some(first) = clauses.first_mut() {
            *first = capitalize(first);
        }
        let tail = if gated.both() {
            &self.fail_tail_plural
        } else {
            &self.fail_tail
        };
        let sentence = clauses.join(" ");
        let parts: Vec<&str> = [self.fail_head.as_str(), sentence.as_str(), tail.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        format!("{}.", parts.join(" ").trim_end().trim_end_matches('.'))
    }

    fn reveal_clauses(&self, gated: &GatedContent) -> Vec<String> {
        let mut clauses = Vec::new();
        if gated.has_solution {
            clauses.push(self.reveal_solution.clone());
        }
        if gated.both() {
            clauses.push(self.reveal_join.clone());
        }
        if gated.has_remarks {
            clauses.push(self.reveal_remarks.clone());
        }
        clauses
    }

    fn pick_emoji(&self) -> &str {
        if self.success_emojis.is_empty() {
            return "";
        }
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as usize)
            .unwrap_or(0);
        &self.success_emojis[nanos % self.success_emojis.len()]
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
