use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A requirement staged for review before it is committed.
///
/// Candidates come either from tabular rows (one row, one candidate) or from
/// segmenting a block of text. Fields hold exactly what was read; nothing is
/// checked until the candidate passes through [`crate::validate`].
///
/// The `include` flag and the link ids are edited during review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementCandidate {
    /// Code identifying the requirement within its framework.
    #[serde(default, deserialize_with = "lenient_required")]
    pub requirement_code: String,
    /// Short title.
    #[serde(default, deserialize_with = "lenient_required")]
    pub title: String,
    /// Full body text.
    #[serde(default, deserialize_with = "lenient_required")]
    pub text: String,
    /// Optional implementation guidance.
    #[serde(default, deserialize_with = "lenient_string")]
    pub guidance: Option<String>,
    /// Raw priority, normalized at validation time.
    #[serde(default, deserialize_with = "lenient_string")]
    pub priority: Option<String>,
    /// Raw active flag; anything other than `false` counts as active.
    #[serde(default, deserialize_with = "lenient_string")]
    pub is_active: Option<String>,
    /// Code of the section the requirement belongs to, if any.
    #[serde(default, deserialize_with = "lenient_string")]
    pub section_code: Option<String>,
    /// Whether this candidate should be committed.
    #[serde(default = "default_include")]
    pub include: bool,
    /// Control to map the requirement to once it is persisted.
    #[serde(default)]
    pub linked_control_id: Option<Uuid>,
    /// Risk to map the requirement to once it is persisted.
    #[serde(default)]
    pub linked_risk_id: Option<Uuid>,
    /// Code of the owning framework, resolved at commit time.
    #[serde(default, deserialize_with = "lenient_string")]
    pub framework_code: Option<String>,
    /// Id of the owning framework; preferred over `framework_code`.
    #[serde(default)]
    pub framework_id: Option<Uuid>,
}

const fn default_include() -> bool {
    true
}

impl Default for RequirementCandidate {
    fn default() -> Self {
        Self {
            requirement_code: String::new(),
            title: String::new(),
            text: String::new(),
            guidance: None,
            priority: None,
            is_active: None,
            section_code: None,
            include: true,
            linked_control_id: None,
            linked_risk_id: None,
            framework_code: None,
            framework_id: None,
        }
    }
}

impl RequirementCandidate {
    /// Creates an included, unlinked candidate from a code, title and body.
    #[must_use]
    pub fn new(
        requirement_code: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            requirement_code: requirement_code.into(),
            title: title.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Whether a link of the given kind is still missing.
    #[must_use]
    pub const fn is_unlinked(&self, kind: crate::link::EntityKind) -> bool {
        match kind {
            crate::link::EntityKind::Control => self.linked_control_id.is_none(),
            crate::link::EntityKind::Risk => self.linked_risk_id.is_none(),
        }
    }
}

/// Accepts strings, numbers and booleans, rendering the latter two as
/// strings. `null` and blank strings become `None`.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_json::Number),
        Flag(bool),
    }

    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value
        .map(|scalar| match scalar {
            Scalar::Text(text) => text,
            Scalar::Number(number) => number.to_string(),
            Scalar::Flag(flag) => flag.to_string(),
        })
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty()))
}

fn lenient_required<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::RequirementCandidate;

    #[test]
    fn json_defaults_fill_missing_fields() {
        let candidate: RequirementCandidate =
            serde_json::from_str(r#"{"requirement_code": "A.5.1", "title": "Policies"}"#).unwrap();

        assert_eq!(candidate.requirement_code, "A.5.1");
        assert_eq!(candidate.text, "");
        assert!(candidate.include);
        assert!(candidate.linked_control_id.is_none());
    }

    #[test]
    fn json_scalars_are_rendered_as_strings() {
        let candidate: RequirementCandidate = serde_json::from_str(
            r#"{"requirement_code": 12, "title": "T", "text": "X", "is_active": false, "priority": "  "}"#,
        )
        .unwrap();

        assert_eq!(candidate.requirement_code, "12");
        assert_eq!(candidate.is_active.as_deref(), Some("false"));
        assert_eq!(candidate.priority, None);
    }
}
