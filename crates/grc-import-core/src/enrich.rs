//! Display enrichment for search results.
//!
//! Each link target is decorated with its business-unit and owner names. The
//! lookups for all targets run concurrently; any lookup that fails or finds
//! nothing yields [`UNKNOWN`] instead of failing the search.

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    link::LinkTarget,
    store::{Query, Store, Table},
};

/// Placeholder for a name that could not be resolved.
pub const UNKNOWN: &str = "Unknown";

/// A link target with display names attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTarget {
    /// The target.
    #[serde(flatten)]
    pub target: LinkTarget,
    /// Name of the owning business unit.
    pub business_unit: String,
    /// Full name of the owner.
    pub owner: String,
}

/// Attaches business-unit and owner names to every target, preserving order.
pub async fn enrich_targets<S: Store + ?Sized>(
    store: &S,
    targets: Vec<LinkTarget>,
) -> Vec<EnrichedTarget> {
    join_all(targets.into_iter().map(|target| enrich_one(store, target))).await
}

async fn enrich_one<S: Store + ?Sized>(store: &S, target: LinkTarget) -> EnrichedTarget {
    let (business_unit, owner) = futures::join!(
        display_name(store, Table::BusinessUnits, target.business_unit_id, "name"),
        display_name(store, Table::Profiles, target.owner_id, "full_name"),
    );
    EnrichedTarget {
        target,
        business_unit,
        owner,
    }
}

async fn display_name<S: Store + ?Sized>(
    store: &S,
    table: Table,
    id: Option<Uuid>,
    column: &str,
) -> String {
    let Some(id) = id else {
        return UNKNOWN.to_string();
    };

    match store
        .select(table, &Query::new().eq("id", id.to_string()).limit(1))
        .await
    {
        Ok(rows) => rows
            .first()
            .and_then(|row| row.get(column))
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .map_or_else(|| UNKNOWN.to_string(), ToString::to_string),
        Err(error) => {
            tracing::warn!(table = table.name(), %id, %error, "display lookup failed");
            UNKNOWN.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::{UNKNOWN, enrich_targets};
    use crate::{
        link::LinkTarget,
        store::{MemoryStore, Table},
    };

    fn target(business_unit_id: Option<Uuid>, owner_id: Option<Uuid>) -> LinkTarget {
        LinkTarget {
            id: Uuid::new_v4(),
            title: "Access review".to_string(),
            code: None,
            business_unit_id,
            owner_id,
        }
    }

    #[tokio::test]
    async fn resolves_names_and_falls_back_to_unknown() {
        let store = MemoryStore::new();
        let unit = Uuid::new_v4();
        let owner = Uuid::new_v4();
        store.seed(
            Table::BusinessUnits,
            json!({ "id": unit, "name": "Finance" }).as_object().cloned().unwrap(),
        );
        store.seed(
            Table::Profiles,
            json!({ "id": owner, "full_name": "" }).as_object().cloned().unwrap(),
        );

        let enriched = enrich_targets(
            &store,
            vec![target(Some(unit), Some(owner)), target(None, Some(Uuid::new_v4()))],
        )
        .await;

        assert_eq!(enriched[0].business_unit, "Finance");
        assert_eq!(enriched[0].owner, UNKNOWN);
        assert_eq!(enriched[1].business_unit, UNKNOWN);
        assert_eq!(enriched[1].owner, UNKNOWN);
    }
}
