//! JSON import bundles.

use std::{io::Read, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{FrameworkRow, RequirementCandidate, framework::SectionRow},
    source::SourceError,
};

/// One framework together with its sections and requirements.
///
/// A bundle file holds either a single bundle object or an array of them.
/// `framework` and `requirements` are required; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportBundle {
    /// The framework the requirements belong to.
    pub framework: FrameworkRow,
    /// Sections of the framework.
    #[serde(default)]
    pub sections: Vec<SectionRow>,
    /// Requirements of the framework.
    pub requirements: Vec<RequirementCandidate>,
}

/// Reads a bundle file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold bundles.
pub fn read_bundle_file(path: &Path) -> Result<Vec<ImportBundle>, SourceError> {
    let file = std::fs::File::open(path)?;
    read_bundles(std::io::BufReader::new(file))
}

/// Reads one bundle or an array of bundles.
///
/// # Errors
///
/// Returns [`SourceError::Json`] if the input is not JSON or its shape does
/// not match a bundle.
pub fn read_bundles<R: Read>(input: R) -> Result<Vec<ImportBundle>, SourceError> {
    let value: Value = serde_json::from_reader(input)?;
    let bundles = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(bundles)
}

#[cfg(test)]
mod tests {
    use super::read_bundles;
    use crate::source::SourceError;

    #[test]
    fn single_object_is_one_bundle() {
        let input = r#"{
            "framework": { "code": "ISO27001-2022", "name": "ISO 27001" },
            "sections": [{ "section_code": "A.5", "title": "Organizational controls" }],
            "requirements": [{ "requirement_code": "A.5.1", "title": "Policies", "text": "Define policies" }]
        }"#;

        let bundles = read_bundles(input.as_bytes()).unwrap();

        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].framework.code.as_deref(), Some("ISO27001-2022"));
        assert_eq!(bundles[0].sections[0].code.as_deref(), Some("A.5"));
        assert_eq!(bundles[0].requirements[0].requirement_code, "A.5.1");
    }

    #[test]
    fn array_holds_many_bundles() {
        let input = r#"[
            { "framework": { "code": "A", "name": "First" }, "requirements": [] },
            { "framework": { "code": "B", "name": "Second" }, "requirements": [] }
        ]"#;

        let bundles = read_bundles(input.as_bytes()).unwrap();

        assert_eq!(bundles.len(), 2);
        assert!(bundles[0].requirements.is_empty());
    }

    #[test]
    fn wrong_shape_is_an_error() {
        assert!(read_bundles(r#"{ "requirements": 3 }"#.as_bytes()).is_err());
    }

    #[test]
    fn bare_requirement_array_is_rejected() {
        let input = r#"[{ "requirement_code": "R1", "title": "A", "text": "B" }]"#;

        let error = read_bundles(input.as_bytes()).unwrap_err();

        assert!(matches!(error, SourceError::Json(_)));
    }

    #[test]
    fn misspelled_requirements_key_is_rejected() {
        let input = r#"{
            "framework": { "code": "A", "name": "First" },
            "requirement": [{ "requirement_code": "R1", "title": "A", "text": "B" }]
        }"#;

        let error = read_bundles(input.as_bytes()).unwrap_err();

        assert!(error.to_string().contains("requirement"));
    }

    #[test]
    fn sections_may_be_omitted() {
        let input = r#"{ "framework": { "code": "A", "name": "First" }, "requirements": [] }"#;

        let bundles = read_bundles(input.as_bytes()).unwrap();

        assert!(bundles[0].sections.is_empty());
    }
}
