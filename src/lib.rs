//! Study assistant backend: tutor chat, study tools, tasks, notes and a
//! weekly planner over swappable persistence and generation providers.
//!
//! ```text
//! config ──► bootstrap ──► Assistant { Storage, LlmProvider } ──► http
//! ```

pub mod assistant;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod storage;

#[cfg(feature = "http")]
pub mod http;

pub use assistant::Assistant;
pub use error::AppError;
pub use llm::Mode;
