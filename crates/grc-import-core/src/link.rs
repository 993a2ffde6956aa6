//! Linking requirement candidates to risks and controls.
//!
//! Targets are found with a case-insensitive title search, or created on the
//! spot with placeholder values from [`Config`]. Creating a target attaches
//! it to the first included candidate that still lacks a link of that kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, json};
use uuid::Uuid;

use crate::{
    Config,
    domain::RequirementCandidate,
    store::{Query, Store, StoreError, Table, from_row, row_id},
};

/// What a requirement can be linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A risk.
    Risk,
    /// A control.
    Control,
}

impl EntityKind {
    /// The table holding targets of this kind.
    #[must_use]
    pub const fn table(self) -> Table {
        match self {
            Self::Risk => Table::Risks,
            Self::Control => Table::Controls,
        }
    }

    /// The mapping-table column that references targets of this kind.
    #[must_use]
    pub const fn mapping_column(self) -> &'static str {
        match self {
            Self::Risk => "risk_id",
            Self::Control => "control_id",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Risk => "risk",
            Self::Control => "control",
        })
    }
}

/// A risk or control as returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct LinkTarget {
    /// Row id.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Control code; risks have none.
    #[serde(default)]
    pub code: Option<String>,
    /// Owning business unit.
    #[serde(default)]
    pub business_unit_id: Option<Uuid>,
    /// Owner profile.
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

/// Errors raised while creating link targets.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// A required field was blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Searches and creates link targets.
#[derive(Debug)]
pub struct Linker<'a, S: Store + ?Sized> {
    store: &'a S,
    config: &'a Config,
}

impl<'a, S: Store + ?Sized> Linker<'a, S> {
    /// Creates a linker.
    #[must_use]
    pub const fn new(store: &'a S, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Finds targets whose title contains `query`, case-insensitively.
    ///
    /// Queries shorter than the configured minimum return nothing without
    /// touching the store; results are capped at the configured limit.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, kind: EntityKind, query: &str) -> Result<Vec<LinkTarget>, StoreError> {
        let query = query.trim();
        if query.chars().count() < self.config.min_query_len() {
            return Ok(Vec::new());
        }

        let table = kind.table();
        let rows = self
            .store
            .select(
                table,
                &Query::new()
                    .contains("title", query)
                    .limit(self.config.search_limit()),
            )
            .await?;
        rows.into_iter().map(|row| from_row(table, row)).collect()
    }

    /// Creates a risk with placeholder category, level and status.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::MissingField`] for a blank title, or the store's
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn create_risk(&self, title: &str) -> Result<LinkTarget, LinkError> {
        let title = non_blank(title, "title")?;
        let defaults = &self.config.risk_defaults;

        let mut row = Map::new();
        row.insert("title".into(), json!(title));
        row.insert("category".into(), json!(defaults.category));
        row.insert("inherent_level".into(), json!(defaults.level));
        row.insert("status".into(), json!(defaults.status));

        let stored = self.store.insert(Table::Risks, row).await?;
        Ok(from_row(Table::Risks, stored)?)
    }

    /// Creates a control with placeholder type, frequency and process area,
    /// filed under the configured control set (created if missing).
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::MissingField`] for a blank code or title, or the
    /// store's error.
    #[tracing::instrument(skip(self))]
    pub async fn create_control(
        &self,
        code: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<LinkTarget, LinkError> {
        let code = non_blank(code, "code")?;
        let title = non_blank(title, "title")?;
        let control_set_id = self.ensure_control_set().await?;
        let defaults = &self.config.control_defaults;

        let mut row = Map::new();
        row.insert("code".into(), json!(code));
        row.insert("title".into(), json!(title));
        row.insert(
            "description".into(),
            json!(description.map(str::trim).filter(|d| !d.is_empty())),
        );
        row.insert("control_type".into(), json!(defaults.control_type));
        row.insert("frequency".into(), json!(defaults.frequency));
        row.insert("process_area".into(), json!(defaults.process_area));
        row.insert("control_set_id".into(), json!(control_set_id));

        let stored = self.store.insert(Table::Controls, row).await?;
        Ok(from_row(Table::Controls, stored)?)
    }

    async fn ensure_control_set(&self) -> Result<Uuid, StoreError> {
        let name = &self.config.control_defaults.control_set;
        let existing = self
            .store
            .select(Table::ControlSets, &Query::new().eq_ignore_case("name", name).limit(1))
            .await?;
        if let Some(row) = existing.first() {
            return row_id(Table::ControlSets, row);
        }

        tracing::info!(control_set = %name, "creating control set");
        let mut row = Map::new();
        row.insert("name".into(), json!(name));
        let stored = self
            .store
            .upsert(Table::ControlSets, row, &["name"])
            .await?;
        row_id(Table::ControlSets, &stored)
    }
}

fn non_blank<'v>(value: &'v str, field: &'static str) -> Result<&'v str, LinkError> {
    let value = value.trim();
    if value.is_empty() {
        Err(LinkError::MissingField(field))
    } else {
        Ok(value)
    }
}

/// Links `target` to the first included candidate without a link of that
/// kind. Returns the index of the candidate, if any.
pub fn attach_to_first_unlinked(
    candidates: &mut [RequirementCandidate],
    kind: EntityKind,
    target: Uuid,
) -> Option<usize> {
    let index = candidates
        .iter()
        .position(|candidate| candidate.include && candidate.is_unlinked(kind))?;
    set_link(&mut candidates[index], kind, Some(target));
    Some(index)
}

/// Sets or clears one link of a candidate.
pub const fn set_link(candidate: &mut RequirementCandidate, kind: EntityKind, target: Option<Uuid>) {
    match kind {
        EntityKind::Control => candidate.linked_control_id = target,
        EntityKind::Risk => candidate.linked_risk_id = target,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::{EntityKind, LinkError, Linker, attach_to_first_unlinked};
    use crate::{
        Config,
        domain::RequirementCandidate,
        store::{MemoryStore, Row, Table},
    };

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn short_queries_return_nothing() {
        let store = MemoryStore::new();
        store.seed(Table::Risks, row(json!({ "title": "A" })));
        let config = Config::default();

        let found = Linker::new(&store, &config)
            .search(EntityKind::Risk, "A")
            .await
            .unwrap();

        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_capped() {
        let store = MemoryStore::new();
        for index in 0..30 {
            store.seed(Table::Controls, row(json!({ "title": format!("Access review {index}"), "code": format!("AC-{index}") })));
        }
        let mut config = Config::default();
        config.set("search_limit", "5").unwrap();

        let found = Linker::new(&store, &config)
            .search(EntityKind::Control, "ACCESS")
            .await
            .unwrap();

        assert_eq!(found.len(), 5);
        assert_eq!(found[0].code.as_deref(), Some("AC-0"));
    }

    #[tokio::test]
    async fn created_controls_share_one_control_set() {
        let store = MemoryStore::new();
        let config = Config::default();
        let linker = Linker::new(&store, &config);

        linker.create_control("AC-1", "Access", None).await.unwrap();
        linker.create_control("AC-2", "Backup", Some("  ")).await.unwrap();

        let sets = store.rows(Table::ControlSets);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0]["name"], "Imported Controls");
        let controls = store.rows(Table::Controls);
        assert_eq!(controls[0]["control_set_id"], controls[1]["control_set_id"]);
        assert_eq!(controls[1]["description"], json!(null));
    }

    #[tokio::test]
    async fn risk_gets_placeholder_values() {
        let store = MemoryStore::new();
        let config = Config::default();

        let risk = Linker::new(&store, &config)
            .create_risk("Data leak")
            .await
            .unwrap();

        assert_eq!(risk.title, "Data leak");
        assert_eq!(store.rows(Table::Risks)[0]["status"], "identified");
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let store = MemoryStore::new();
        let config = Config::default();

        let error = Linker::new(&store, &config).create_risk("  ").await.unwrap_err();

        assert!(matches!(error, LinkError::MissingField("title")));
    }

    #[test]
    fn attaches_to_first_included_unlinked_candidate() {
        let mut candidates = vec![
            RequirementCandidate {
                include: false,
                ..RequirementCandidate::new("A", "T", "X")
            },
            RequirementCandidate {
                linked_risk_id: Some(Uuid::new_v4()),
                ..RequirementCandidate::new("B", "T", "X")
            },
            RequirementCandidate::new("C", "T", "X"),
        ];
        let risk = Uuid::new_v4();

        assert_eq!(attach_to_first_unlinked(&mut candidates, EntityKind::Risk, risk), Some(2));
        assert_eq!(candidates[2].linked_risk_id, Some(risk));
        assert_eq!(
            attach_to_first_unlinked(&mut candidates, EntityKind::Control, risk),
            Some(1)
        );
    }
}
