use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// A row as exchanged with the persistence service.
pub type Row = Map<String, Value>;

/// Tables the importer reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// Compliance frameworks.
    Frameworks,
    /// Framework sections.
    Sections,
    /// Framework requirements.
    Requirements,
    /// Requirement-to-control and requirement-to-risk mappings.
    RequirementMappings,
    /// Risks.
    Risks,
    /// Controls.
    Controls,
    /// Groups of controls.
    ControlSets,
    /// Organizational units; read-only lookups.
    BusinessUnits,
    /// User profiles; read-only lookups.
    Profiles,
}

impl Table {
    /// The table name used by the persistence service.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Frameworks => "compliance_frameworks",
            Self::Sections => "compliance_sections",
            Self::Requirements => "compliance_requirements",
            Self::RequirementMappings => "requirement_controls_map",
            Self::Risks => "risks",
            Self::Controls => "controls",
            Self::ControlSets => "control_sets",
            Self::BusinessUnits => "business_units",
            Self::Profiles => "profiles",
        }
    }

    /// Column sets that must be unique across the table's rows.
    ///
    /// A row whose key contains a null does not take part in that key.
    #[must_use]
    pub const fn unique_keys(self) -> &'static [&'static [&'static str]] {
        match self {
            Self::Frameworks => &[&["code"]],
            Self::Sections => &[&["framework_id", "code"]],
            Self::Requirements => &[&["framework_id", "requirement_code"]],
            Self::RequirementMappings => {
                &[&["requirement_id", "control_id"], &["requirement_id", "risk_id"]]
            }
            Self::ControlSets => &[&["name"]],
            Self::Risks | Self::Controls | Self::BusinessUnits | Self::Profiles => &[],
        }
    }
}

/// A condition on one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact equality.
    Eq(String, Value),
    /// Case-insensitive string equality.
    EqIgnoreCase(String, String),
    /// Case-insensitive substring match.
    ContainsIgnoreCase(String, String),
}

/// A conjunction of filters with an optional row limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// All filters must hold.
    pub filters: Vec<Filter>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
}

impl Query {
    /// A query matching every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    /// Adds a case-insensitive equality filter.
    #[must_use]
    pub fn eq_ignore_case(mut self, column: &str, value: &str) -> Self {
        self.filters
            .push(Filter::EqIgnoreCase(column.to_string(), value.to_string()));
        self
    }

    /// Adds a case-insensitive substring filter.
    #[must_use]
    pub fn contains(mut self, column: &str, needle: &str) -> Self {
        self.filters
            .push(Filter::ContainsIgnoreCase(column.to_string(), needle.to_string()));
        self
    }

    /// Limits the number of returned rows.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Errors raised by a [`Store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request never got a response.
    #[error("Request to {table} failed: {source}")]
    Transport {
        /// Table being accessed.
        table: &'static str,
        /// Underlying error.
        source: reqwest::Error,
    },

    /// The service rejected the request.
    #[error("{table}: service returned {status}: {message}")]
    Service {
        /// Table being accessed.
        table: &'static str,
        /// HTTP status.
        status: u16,
        /// Response body.
        message: String,
    },

    /// A unique key would be violated.
    #[error("{table}: duplicate value for ({})", columns.join(", "))]
    Conflict {
        /// Table being accessed.
        table: &'static str,
        /// The violated key.
        columns: Vec<String>,
    },

    /// A returned row did not have the expected shape.
    #[error("{table}: malformed row: {reason}")]
    MalformedRow {
        /// Table being accessed.
        table: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// The store is not configured.
    #[error("Store is not configured: {0}")]
    Config(String),
}

/// The persistence-service seam.
///
/// Implementations return the affected rows, including server-assigned ids.
/// Upserts name the columns that identify an existing row.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the rows matching `query`, in storage order.
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Inserts one row and returns it as stored.
    async fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError>;

    /// Applies `patch` to every row matching `query` and returns them.
    async fn update(&self, table: Table, query: &Query, patch: Row)
    -> Result<Vec<Row>, StoreError>;

    /// Inserts `row`, or merges it into the row sharing its `on_conflict`
    /// columns.
    async fn upsert(
        &self,
        table: Table,
        row: Row,
        on_conflict: &[&str],
    ) -> Result<Row, StoreError>;
}

/// Reads the `id` column of a row.
///
/// # Errors
///
/// Returns [`StoreError::MalformedRow`] if the id is missing or not a UUID.
pub fn row_id(table: Table, row: &Row) -> Result<Uuid, StoreError> {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| StoreError::MalformedRow {
            table: table.name(),
            reason: "missing or invalid id".to_string(),
        })
}

/// Deserializes a row into a typed record.
///
/// # Errors
///
/// Returns [`StoreError::MalformedRow`] if the row does not match `T`.
pub fn from_row<T: DeserializeOwned>(table: Table, row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::MalformedRow {
        table: table.name(),
        reason: e.to_string(),
    })
}
