//! Application-wide error types.
//!
//! Only startup can fail with an [`AppError`]. Storage and generation have
//! their own error enums ([`StorageError`](crate::storage::StorageError),
//! [`ProviderError`](crate::llm::ProviderError)) that the assistant contains.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
