//! # TIS Common Library
//!
//! Shared code for the transcript intake service:
//! - Error type used by storage and configuration code
//! - Service event types (ServiceEvent enum) and the EventBus
//! - Configuration resolution (CLI → ENV → TOML → defaults)
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
