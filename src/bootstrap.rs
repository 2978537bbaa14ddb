//! Service selection.
//!
//! Persistence and generation are chosen independently from the resolved
//! config. Each falls back on its own (file-backed storage, mock
//! generation) when its remote credentials are missing or invalid, so
//! startup never fails on a provider.

use tracing::info;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::llm::providers;
use crate::storage;

pub fn assistant(config: &Config) -> Assistant {
    let storage = storage::select(config);
    let llm = providers::select(config);
    info!(
        storage = storage.name(),
        llm = llm.name(),
        mock_mode = config.server.mock_mode,
        "assistant ready"
    );
    Assistant::new(storage, llm)
}
