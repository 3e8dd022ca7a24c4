// Signal fetcher — bounded reads from the interaction source.

use std::sync::Arc;

use tracing::{debug, warn};

use super::interaction::InteractionRecord;
use super::range::TimeWindow;
use super::traits::InteractionSource;
use crate::db::models::EntityRef;
use crate::error::{EngineResult, PulseError};

/// Wraps an InteractionSource with the engine's row limit and error mapping.
#[derive(Clone)]
pub struct SignalFetcher {
    source: Arc<dyn InteractionSource>,
    limit: usize,
}

impl SignalFetcher {
    pub fn new(source: Arc<dyn InteractionSource>, limit: usize) -> Self {
        Self {
            source,
            limit: limit.max(1),
        }
    }

    /// Fetch one window. Source failures become `PulseError::UpstreamFetch`.
    pub async fn fetch(
        &self,
        entity: &EntityRef,
        window: &TimeWindow,
    ) -> EngineResult<Vec<InteractionRecord>> {
        let rows = self
            .source
            .fetch_interactions(entity, window, self.limit)
            .await
            .map_err(PulseError::UpstreamFetch)?;

        if rows.len() >= self.limit {
            warn!(
                entity = %entity,
                limit = self.limit,
                "Interaction fetch hit the row limit, signals are truncated"
            );
        }
        debug!(entity = %entity, rows = rows.len(), "Fetched interactions");
        Ok(rows)
    }

    /// Fetch one window, or an empty list if the source is unavailable.
    /// The flag reports whether the fallback was used.
    pub async fn fetch_or_empty(
        &self,
        entity: &EntityRef,
        window: &TimeWindow,
    ) -> (Vec<InteractionRecord>, bool) {
        match self.fetch(entity, window).await {
            Ok(rows) => (rows, false),
            Err(e) => {
                warn!(entity = %entity, error = %e, "Falling back to zeroed signals");
                (Vec::new(), true)
            }
        }
    }
}
