// Engine error taxonomy.
//
// Infrastructure code (queries, config, CLI) works in anyhow::Result like the
// rest of the crate. The evaluation entry points return PulseError so callers
// can tell a bad request apart from a missing entity or a storage outage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PulseError {
    /// Missing or malformed entity id, entity type or range. Raised before
    /// any data is fetched.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The entity is not registered in the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A per-entity cap was hit (e.g. fan moments per hour).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The interaction store could not be read. Evaluation degrades to zeroed
    /// signals instead of surfacing this to the caller.
    #[error("Interaction store unavailable: {0:#}")]
    UpstreamFetch(anyhow::Error),

    /// A read or write against the snapshot / moment store failed.
    #[error("Persistence failure: {0:#}")]
    Persistence(anyhow::Error),
}

impl PulseError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        PulseError::InvalidInput(msg.into())
    }
}

pub type EngineResult<T> = std::result::Result<T, PulseError>;
