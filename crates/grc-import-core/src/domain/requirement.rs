use std::{fmt, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// How urgently a requirement must be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority; also the fallback for unrecognised values.
    Medium,
    /// High priority.
    High,
    /// Critical priority.
    Critical,
}

impl Priority {
    /// Normalizes a raw priority.
    ///
    /// Matching is case-insensitive. A blank or absent value yields `None`;
    /// any other unrecognised value falls back to [`Priority::Medium`].
    ///
    /// ```
    /// use grc_import_core::Priority;
    ///
    /// assert_eq!(Priority::normalize(Some("CRITICAL")), Some(Priority::Critical));
    /// assert_eq!(Priority::normalize(Some("urgent")), Some(Priority::Medium));
    /// assert_eq!(Priority::normalize(None), None);
    /// ```
    #[must_use]
    pub fn normalize(raw: Option<&str>) -> Option<Self> {
        let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
        Some(raw.parse().unwrap_or(Self::Medium))
    }

    /// The lowercase name stored by the persistence service.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the known priorities.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown priority '{0}': expected one of low, medium, high, critical")]
pub struct UnknownPriority(String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Low, Self::Medium, Self::High, Self::Critical]
            .into_iter()
            .find(|priority| priority.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPriority(s.to_string()))
    }
}

/// A requirement candidate that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementRecord {
    /// Code, unique within the owning framework.
    pub requirement_code: NonEmptyString,
    /// Short title.
    pub title: NonEmptyString,
    /// Full body text.
    pub text: NonEmptyString,
    /// Optional implementation guidance.
    pub guidance: Option<String>,
    /// Normalized priority; `None` when none was supplied.
    pub priority: Option<Priority>,
    /// Whether the requirement is active.
    pub is_active: bool,
    /// Code of the owning section, resolved to an id at commit time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_code: Option<String>,
}

impl RequirementRecord {
    /// Builds the row upserted into `compliance_requirements`.
    ///
    /// Every mutable column is present (including nulls) so that an upsert
    /// overwrites stale values on conflict.
    #[must_use]
    pub fn to_row(&self, framework_id: Uuid, section_id: Option<Uuid>) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("framework_id".into(), json!(framework_id));
        row.insert(
            "requirement_code".into(),
            json!(self.requirement_code.as_str()),
        );
        row.insert("title".into(), json!(self.title.as_str()));
        row.insert("text".into(), json!(self.text.as_str()));
        row.insert("guidance".into(), json!(self.guidance));
        row.insert("priority".into(), json!(self.priority));
        row.insert("is_active".into(), json!(self.is_active));
        row.insert("section_id".into(), json!(section_id));
        row
    }
}

/// A requirement as stored by the persistence service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Row id.
    pub id: Uuid,
    /// Owning framework.
    pub framework_id: Uuid,
    /// Owning section, if any.
    #[serde(default)]
    pub section_id: Option<Uuid>,
    /// Code, unique within the framework.
    pub requirement_code: String,
    /// Short title.
    pub title: String,
    /// Full body text.
    pub text: String,
    /// Optional implementation guidance.
    #[serde(default)]
    pub guidance: Option<String>,
    /// Priority, if one was recorded.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Whether the requirement is active.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}
