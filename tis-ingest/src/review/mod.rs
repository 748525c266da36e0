//! Review gate
//!
//! Detects courses needing human adjudication, suspends the file's pipeline
//! task until decisions arrive, and applies those decisions.

pub mod decisions;
pub mod detector;
pub mod registry;

pub use decisions::{apply_decisions, AppliedDecisions};
pub use detector::detect_flags;
pub use registry::{ReviewError, ReviewGuard, ReviewRegistry, SessionInfo};
