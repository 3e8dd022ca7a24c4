// Import — load owners, entities and raw interactions from a JSON document.
//
// This is how data gets into the store outside the host application:
//
// {
//   "owners":       [{"owner_id": 1, "push_opt_in": true, "created_at": "..."}],
//   "entities":     [{"entity_type": "band", "entity_id": 1, "name": "...", "owner_id": 1}],
//   "interactions": [{"kind": "page_view", "entity_type": "band", "entity_id": 1,
//                     "occurred_at": "...", "city": "Austin"}]
// }
//
// The whole document is validated before anything is written, and the
// write itself is all-or-nothing.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::{Entity, OwnerProfile};
use crate::db::Database;
use crate::signals::interaction::InteractionRecord;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportDocument {
    #[serde(default)]
    pub owners: Vec<OwnerProfile>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub interactions: Vec<InteractionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub owners: usize,
    pub entities: usize,
    pub interactions: usize,
}

impl ImportDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Import file is not a valid import document")
    }

    fn validate(&self) -> Result<()> {
        for owner in &self.owners {
            if owner.owner_id <= 0 {
                anyhow::bail!("owner_id must be positive (got {})", owner.owner_id);
            }
        }
        for entity in &self.entities {
            if entity.entity.entity_id <= 0 {
                anyhow::bail!("{} has a non-positive id", entity.entity);
            }
            if entity.name.trim().is_empty() {
                anyhow::bail!("{} has an empty name", entity.entity);
            }
        }
        for (i, record) in self.interactions.iter().enumerate() {
            if record.common().entity_id <= 0 {
                anyhow::bail!("interaction #{i} has a non-positive entity_id");
            }
        }
        Ok(())
    }
}

/// Write a parsed document in one transaction. Owners go first so entities
/// can reference them.
pub async fn import_document(db: &Arc<dyn Database>, doc: &ImportDocument) -> Result<ImportSummary> {
    doc.validate()?;

    let interactions = db
        .import_batch(&doc.owners, &doc.entities, &doc.interactions)
        .await?;

    let summary = ImportSummary {
        owners: doc.owners.len(),
        entities: doc.entities.len(),
        interactions,
    };
    info!(
        owners = summary.owners,
        entities = summary.entities,
        interactions = summary.interactions,
        "Import complete"
    );
    Ok(summary)
}

pub async fn import_file(db: &Arc<dyn Database>, path: &Path) -> Result<ImportSummary> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file {}", path.display()))?;
    let doc = ImportDocument::from_json(&json)?;
    import_document(db, &doc).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::EntityType;
    use crate::signals::interaction::InteractionKind;

    const DOC: &str = r#"{
        "owners": [{"owner_id": 1, "push_opt_in": true, "created_at": "2026-01-01T00:00:00Z"}],
        "entities": [{"entity_type": "band", "entity_id": 7, "name": "The Lanterns", "owner_id": 1}],
        "interactions": [
            {"kind": "page_view", "entity_type": "band", "entity_id": 7,
             "occurred_at": "2026-05-01T19:30:00Z", "city": "Austin"},
            {"kind": "link_click", "entity_type": "band", "entity_id": 7,
             "occurred_at": "2026-05-01T19:31:00Z", "platform": "spotify"}
        ]
    }"#;

    #[test]
    fn test_parse_document() {
        let doc = ImportDocument::from_json(DOC).unwrap();
        assert_eq!(doc.owners.len(), 1);
        assert_eq!(doc.entities[0].entity.entity_type, EntityType::Band);
        assert_eq!(doc.interactions[1].kind(), InteractionKind::LinkClick);
        assert_eq!(doc.interactions[1].platform(), Some("spotify"));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let doc = ImportDocument::from_json("{}").unwrap();
        assert!(doc.owners.is_empty() && doc.entities.is_empty() && doc.interactions.is_empty());
    }

    #[tokio::test]
    async fn test_import_writes_everything() {
        let db: Arc<dyn Database> = Arc::new(crate::db::SqliteDatabase::in_memory().unwrap());
        let doc = ImportDocument::from_json(DOC).unwrap();
        let summary = import_document(&db, &doc).await.unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                owners: 1,
                entities: 1,
                interactions: 2
            }
        );
        assert_eq!(db.count_interactions().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_document_writes_nothing() {
        let db: Arc<dyn Database> = Arc::new(crate::db::SqliteDatabase::in_memory().unwrap());
        let mut doc = ImportDocument::from_json(DOC).unwrap();
        doc.entities[0].name = "  ".to_string();
        assert!(import_document(&db, &doc).await.is_err());
        assert!(db.get_owner(1).await.unwrap().is_none());
    }
}
