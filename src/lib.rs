pub mod budget;
pub mod errors;
pub mod exercise;
pub mod feedback;
pub mod gated;
pub mod lock;
pub mod messages;
pub mod orchestrator;
pub mod phase;
pub mod pipeline;
pub mod reveal;
pub mod runtime;
pub mod section;
pub mod session;
pub mod storage;

pub use errors::{AdapterError, OrchestratorError};
pub use orchestrator::{Orchestrator, RunReport, RunSummary};
pub use session::{Attempts, DisclosurePolicy, GatedContent, Session};
