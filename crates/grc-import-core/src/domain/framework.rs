use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::domain::candidate::lenient_string;

/// A framework as supplied by an import source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkRow {
    /// Unique, human-chosen identifier, e.g. `ISO27001-2022`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    /// Display name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Version of the standard.
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,
    /// Issuing authority.
    #[serde(default, deserialize_with = "lenient_string")]
    pub authority: Option<String>,
    /// Free-form category.
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    /// Free-form description.
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    /// Raw active flag.
    #[serde(default, deserialize_with = "lenient_string")]
    pub is_active: Option<String>,
}

impl FrameworkRow {
    /// Creates a row with just a code and a name.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// A framework row that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameworkRecord {
    /// Normalized code (see [`normalize_code`]).
    pub code: NonEmptyString,
    /// Display name.
    pub name: NonEmptyString,
    /// Version of the standard.
    pub version: Option<String>,
    /// Issuing authority.
    pub authority: Option<String>,
    /// Free-form category.
    pub category: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Active flag, passed through only when supplied.
    pub is_active: Option<bool>,
}

impl FrameworkRecord {
    /// The row inserted when the framework does not exist yet.
    #[must_use]
    pub fn to_insert_row(&self) -> Map<String, Value> {
        let mut row = self.to_update_row();
        row.insert("code".into(), json!(self.code.as_str()));
        row.entry("is_active").or_insert(json!(true));
        row
    }

    /// The patch applied to an existing framework.
    ///
    /// Optional fields that were not supplied are left out so that stored
    /// values survive a re-import.
    #[must_use]
    pub fn to_update_row(&self) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("name".into(), json!(self.name.as_str()));
        let optional = [
            ("version", &self.version),
            ("authority", &self.authority),
            ("category", &self.category),
            ("description", &self.description),
        ];
        for (column, value) in optional {
            if let Some(value) = value {
                row.insert(column.into(), json!(value));
            }
        }
        if let Some(is_active) = self.is_active {
            row.insert("is_active".into(), json!(is_active));
        }
        row
    }
}

/// A framework as stored by the persistence service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framework {
    /// Row id.
    pub id: Uuid,
    /// Globally unique code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Version of the standard.
    #[serde(default)]
    pub version: Option<String>,
    /// Issuing authority.
    #[serde(default)]
    pub authority: Option<String>,
    /// Free-form category.
    #[serde(default)]
    pub category: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the framework is active.
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// A section of a framework as supplied by a JSON bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRow {
    /// Section code, unique within the framework.
    #[serde(default, alias = "section_code", deserialize_with = "lenient_string")]
    pub code: Option<String>,
    /// Section title.
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    /// Free-form description.
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
}

impl SectionRow {
    /// The row upserted into `compliance_sections`, or `None` when the
    /// section has no code.
    #[must_use]
    pub fn to_row(&self, framework_id: Uuid) -> Option<Map<String, Value>> {
        let code = self.code.as_deref()?;
        let mut row = Map::new();
        row.insert("framework_id".into(), json!(framework_id));
        row.insert("code".into(), json!(code));
        row.insert(
            "title".into(),
            json!(self.title.as_deref().unwrap_or(code)),
        );
        row.insert("description".into(), json!(self.description));
        Some(row)
    }
}

/// A framework section as stored by the persistence service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Row id.
    pub id: Uuid,
    /// Owning framework.
    pub framework_id: Uuid,
    /// Section code.
    pub code: String,
    /// Section title.
    pub title: String,
}

/// Normalizes a framework code before lookup or storage.
///
/// Leading and trailing whitespace is removed and inner runs of whitespace
/// collapse to one space. Case is preserved; lookups compare
/// case-insensitively.
#[must_use]
pub fn normalize_code(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
