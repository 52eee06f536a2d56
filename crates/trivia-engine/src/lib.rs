//! The trivia engine: question pool, human approval of drafts, the single
//! active trivia session and its answers, and dynamic ground truth.
//!
//! Everything here is generic over [`trivia_core::store::TriviaStore`] and
//! the collaborator traits in [`trivia_core::ports`]; concrete backends are
//! chosen by the binary.

pub mod alert;
pub mod approval;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod pool;
pub mod render;
pub mod resolver;
pub mod retry;
pub mod session;

#[cfg(test)]
mod testing;

pub use approval::{ApprovalWorkflow, ResumeReport, ReviewerDirectory};
pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use engine::{MaintenanceReport, TriviaEngine};
pub use error::{Error, ErrorKind, Result};
pub use resolver::Recorded;
