//! Exercise source material and editor-buffer text manipulation.
//!
//! An exercise ships several code segments: the starting code the learner
//! edits, a public test block (inlined into the buffer below a marker line),
//! a secret test block, a reference solution, and the encoded gated blob.
//! This module also owns the text rules tied to the marker line: building
//! the initial buffer and toggling the inline test block in and out of
//! comments.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The code segments shipped with one exercise. Fixed at widget creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExerciseSource {
    /// Starting code placed in the editor.
    pub user_content: String,
    /// Public test block, inlined below the marker. May be empty.
    pub public_tests: String,
    /// Hidden validation test block. May be empty; its presence is what
    /// makes the full-validation workflow exist.
    pub secret_tests: String,
    /// Reference solution, used by the self-check workflow.
    pub reference_solution: String,
    /// Encoded solution/remarks material, decoded once at first reveal.
    pub gated_blob: String,
}

impl ExerciseSource {
    /// Whether a full-validation workflow exists for this exercise.
    pub fn has_validation(&self) -> bool {
        !self.secret_tests.is_empty()
    }
}

// Matches a line as (leading spaces, optional '#', rest).
static COMMENTED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)(#?)(.*)$").unwrap());

/// Index of the marker line, if present: the first line whose trimmed text
/// starts with the marker token.
pub fn find_marker_line(buffer: &str, marker: &str) -> Option<usize> {
    buffer
        .lines()
        .position(|line| line.trim_start().starts_with(marker))
}

/// Toggle comments on every line below the marker.
///
/// Rules, per line:
/// - leading spaces never affect the logic,
/// - lines whose first non-space char is not `#` get commented out,
/// - lines starting with `#` not followed by a space get uncommented
///   (a `# prose` comment keeps its comment marker),
/// - blank lines are left alone.
///
/// Returns `None` when the buffer has no marker line.
pub fn toggle_tests_comment(buffer: &str, marker: &str) -> Option<String> {
    let marker_idx = find_marker_line(buffer, marker)?;

    let toggled: Vec<String> = buffer
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i <= marker_idx {
                return line.to_string();
            }
            let Some(caps) = COMMENTED_LINE.captures(line) else {
                return line.to_string();
            };
            let (spaces, head, tail) = (&caps[1], &caps[2], &caps[3]);
            if head == "#" && !tail.starts_with(' ') {
                format!("{spaces}{tail}")
            } else if head.is_empty() && !tail.trim().is_empty() {
                format!("{spaces}#{tail}")
            } else {
                line.to_string()
            }
        })
        .collect();

    Some(toggled.join("\n"))
}

/// Join the starting code and the public test block with the marker line.
/// Empty segments are skipped.
pub fn join_user_and_public(user_content: &str, public_tests: &str, marker: &str) -> String {
    [user_content, public_tests]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(&format!("\n\n{marker}\n"))
}

/// Build the initial editor buffer: a previously stored buffer wins,
/// otherwise the joined starting code. Trailing newlines are normalized and
/// the result always holds at least one line so the terminal prompt stays
/// visible.
pub fn start_code(stored: Option<&str>, source: &ExerciseSource, marker: &str) -> String {
    let mut code = match stored {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => join_user_and_public(&source.user_content, &source.public_tests, marker),
    };

    code = code.trim_end_matches('\n').to_string();
    if code.is_empty() {
        code = "\n".to_string();
    }
    code + "\n"
}
