// Interaction source trait — the time-series store the engine reads from.
//
// Implementors: SqliteDatabase (the bundled store). Anything that can answer
// "rows for this entity between these instants" fits behind it.

use anyhow::Result;
use async_trait::async_trait;

use super::interaction::InteractionRecord;
use super::range::TimeWindow;
use crate::db::models::EntityRef;

#[async_trait]
pub trait InteractionSource: Send + Sync {
    /// Interactions for `entity` with `window.start <= occurred_at < window.end`,
    /// oldest first, at most `limit` rows.
    async fn fetch_interactions(
        &self,
        entity: &EntityRef,
        window: &TimeWindow,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>>;
}
