use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};

/// The result of validating one row.
///
/// A row is either valid with data, or invalid with the first violated rule;
/// it is never partially valid. Serializes as `{ "ok": true, "data": .. }` or
/// `{ "ok": false, "error": ".." }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewRow<T> {
    /// The row passed validation.
    Valid(T),
    /// The row failed validation.
    Invalid {
        /// The first missing field or violated rule.
        error: String,
    },
}

impl<T> PreviewRow<T> {
    /// Whether the row passed validation.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The validated data, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Valid(data) => Some(data),
            Self::Invalid { .. } => None,
        }
    }

    /// The validation error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid { error } => Some(error),
        }
    }

    pub(crate) fn invalid(error: impl Into<String>) -> Self {
        Self::Invalid {
            error: error.into(),
        }
    }
}

impl<T: Serialize> Serialize for PreviewRow<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PreviewRow", 2)?;
        match self {
            Self::Valid(data) => {
                state.serialize_field("ok", &true)?;
                state.serialize_field("data", data)?;
            }
            Self::Invalid { error } => {
                state.serialize_field("ok", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

/// Ok/error counts reported by a dry run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunSummary {
    /// Valid framework rows.
    pub framework_ok: usize,
    /// Invalid framework rows.
    pub framework_err: usize,
    /// Valid requirement rows.
    pub req_ok: usize,
    /// Invalid requirement rows.
    pub req_err: usize,
}

impl DryRunSummary {
    /// Counts the valid and invalid rows of both previews.
    #[must_use]
    pub fn from_previews<F, R>(frameworks: &[PreviewRow<F>], requirements: &[PreviewRow<R>]) -> Self {
        let framework_ok = frameworks.iter().filter(|row| row.is_ok()).count();
        let req_ok = requirements.iter().filter(|row| row.is_ok()).count();
        Self {
            framework_ok,
            framework_err: frameworks.len() - framework_ok,
            req_ok,
            req_err: requirements.len() - req_ok,
        }
    }

    /// Whether any row failed validation.
    #[must_use]
    pub const fn has_errors(&self) -> bool {
        self.framework_err > 0 || self.req_err > 0
    }
}

/// How an import reacts to invalid rows and commit-time failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strictness {
    /// Any invalid row blocks the commit, and the first commit-time error
    /// aborts it.
    #[default]
    AllOrNothing,
    /// Valid rows are committed; failures are reported per row.
    BestEffort,
}

impl Strictness {
    /// The kebab-case name used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllOrNothing => "all-or-nothing",
            Self::BestEffort => "best-effort",
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all-or-nothing" | "strict" => Ok(Self::AllOrNothing),
            "best-effort" | "lenient" => Ok(Self::BestEffort),
            other => Err(format!(
                "unknown strictness '{other}': expected 'all-or-nothing' or 'best-effort'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DryRunSummary, PreviewRow};

    #[test]
    fn serializes_valid_row_with_data() {
        let row: PreviewRow<&str> = PreviewRow::Valid("R1");
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({ "ok": true, "data": "R1" })
        );
    }

    #[test]
    fn serializes_invalid_row_without_data() {
        let row: PreviewRow<&str> = PreviewRow::invalid("Missing required field: title");
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({ "ok": false, "error": "Missing required field: title" })
        );
    }

    #[test]
    fn summary_counts_both_kinds() {
        let frameworks: Vec<PreviewRow<()>> = vec![PreviewRow::Valid(())];
        let requirements: Vec<PreviewRow<()>> =
            vec![PreviewRow::Valid(()), PreviewRow::invalid("x")];

        let summary = DryRunSummary::from_previews(&frameworks, &requirements);

        assert_eq!(
            serde_json::to_value(summary).unwrap(),
            json!({ "frameworkOk": 1, "frameworkErr": 0, "reqOk": 1, "reqErr": 1 })
        );
        assert!(summary.has_errors());
    }
}
