//! Pipeline sections and their fixed execution order.
//!
//! Every run executes code segments in the order editor → public → secret.
//! The ordering is also what the attempt-budget policy compares against when
//! deciding whether a failure may consume an attempt.

use serde::{Deserialize, Serialize};

/// One ordered code segment of a run.
///
/// Variant order matters: the derived `Ord` gives the total order
/// editor < public < secret used by the decrement-boundary policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// The learner's editor buffer (starting code plus inline public tests).
    Editor,
    /// The public test block shipped with the exercise.
    Public,
    /// The hidden validation test block.
    Secret,
}

impl Section {
    /// All sections, in execution order.
    pub const ALL: [Section; 3] = [Section::Editor, Section::Public, Section::Secret];

    /// Position of this section in the execution order.
    pub fn order(self) -> u8 {
        match self {
            Section::Editor => 0,
            Section::Public => 1,
            Section::Secret => 2,
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::Editor => write!(f, "editor"),
            Section::Public => write!(f, "public"),
            Section::Secret => write!(f, "secret"),
        }
    }
}

impl std::str::FromStr for Section {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "editor" => Ok(Section::Editor),
            "public" => Ok(Section::Public),
            "secret" | "secrets" => Ok(Section::Secret),
            _ => anyhow::bail!("Invalid section '{}'. Valid values: editor, public, secret", s),
        }
    }
}
