//! Row validation and dry-run previews.
//!
//! Each row is checked independently and reports the first rule it breaks.
//! Requirement rows are additionally checked for duplicate codes within the
//! same framework, since a second row with the same code would silently
//! overwrite the first at commit time.

use std::collections::HashSet;

use non_empty_string::NonEmptyString;

use crate::domain::{
    DryRunSummary, FrameworkRecord, FrameworkRow, PreviewRow, Priority, RequirementCandidate,
    RequirementRecord, framework::normalize_code,
};

/// The error reported for a missing or blank required field.
#[must_use]
pub fn missing(field: &str) -> String {
    format!("Missing required field: {field}")
}

fn required(value: Option<&str>, field: &str) -> Result<NonEmptyString, String> {
    value
        .map(str::trim)
        .and_then(|value| NonEmptyString::new(value.to_string()).ok())
        .ok_or_else(|| missing(field))
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Anything other than a case-insensitive `false` counts as active.
fn active_flag(raw: Option<&str>) -> bool {
    !raw.is_some_and(|raw| raw.trim().eq_ignore_ascii_case("false"))
}

/// Validates one framework row.
///
/// `code` and `name` are required; the code is normalized.
#[must_use]
pub fn validate_framework(row: &FrameworkRow) -> PreviewRow<FrameworkRecord> {
    let checked = (|| {
        let code = required(row.code.as_deref().map(normalize_code).as_deref(), "code")?;
        let name = required(row.name.as_deref(), "name")?;
        Ok::<_, String>(FrameworkRecord {
            code,
            name,
            version: optional(row.version.as_deref()),
            authority: optional(row.authority.as_deref()),
            category: optional(row.category.as_deref()),
            description: optional(row.description.as_deref()),
            is_active: row.is_active.as_deref().map(|raw| active_flag(Some(raw))),
        })
    })();

    checked.map_or_else(PreviewRow::invalid, PreviewRow::Valid)
}

/// Validates one requirement candidate.
///
/// `requirement_code`, `title` and `text` are required, checked in that
/// order. The priority is normalized.
#[must_use]
pub fn validate_requirement(candidate: &RequirementCandidate) -> PreviewRow<RequirementRecord> {
    let checked = (|| {
        let requirement_code = required(Some(&candidate.requirement_code), "requirement_code")?;
        let title = required(Some(&candidate.title), "title")?;
        let text = required(Some(&candidate.text), "text")?;
        Ok::<_, String>(RequirementRecord {
            requirement_code,
            title,
            text,
            guidance: optional(candidate.guidance.as_deref()),
            priority: Priority::normalize(candidate.priority.as_deref()),
            is_active: active_flag(candidate.is_active.as_deref()),
            section_code: optional(candidate.section_code.as_deref()),
        })
    })();

    checked.map_or_else(PreviewRow::invalid, PreviewRow::Valid)
}

/// Validates every framework row.
#[must_use]
pub fn preview_frameworks(rows: &[FrameworkRow]) -> Vec<PreviewRow<FrameworkRecord>> {
    rows.iter().map(validate_framework).collect()
}

/// Validates requirement candidates, flagging duplicate codes.
///
/// Two candidates collide when they share a code and name the same framework
/// (by id, else by case-insensitive code). The first one keeps its result;
/// later ones are reported invalid.
#[must_use]
pub fn preview_requirements<'a, I>(candidates: I) -> Vec<PreviewRow<RequirementRecord>>
where
    I: IntoIterator<Item = &'a RequirementCandidate>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|candidate| {
            let preview = validate_requirement(candidate);
            let Some(record) = preview.data() else {
                return preview;
            };
            let key = (framework_key(candidate), record.requirement_code.to_string());
            if seen.insert(key) {
                preview
            } else {
                PreviewRow::invalid(format!(
                    "Duplicate requirement_code: {}",
                    record.requirement_code
                ))
            }
        })
        .collect()
}

fn framework_key(candidate: &RequirementCandidate) -> String {
    candidate.framework_id.map_or_else(
        || {
            candidate
                .framework_code
                .as_deref()
                .map(|code| normalize_code(code).to_lowercase())
                .unwrap_or_default()
        },
        |id| id.to_string(),
    )
}

/// Previews both kinds of rows and counts the results.
#[must_use]
pub fn dry_run(
    frameworks: &[FrameworkRow],
    candidates: &[RequirementCandidate],
) -> (
    Vec<PreviewRow<FrameworkRecord>>,
    Vec<PreviewRow<RequirementRecord>>,
    DryRunSummary,
) {
    let framework_preview = preview_frameworks(frameworks);
    let requirement_preview = preview_requirements(candidates);
    let summary = DryRunSummary::from_previews(&framework_preview, &requirement_preview);
    (framework_preview, requirement_preview, summary)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{dry_run, preview_requirements, validate_framework, validate_requirement};
    use crate::domain::{FrameworkRow, Priority, RequirementCandidate};

    #[test]
    fn framework_needs_code_then_name() {
        let no_code = validate_framework(&FrameworkRow {
            name: Some("ISO".into()),
            ..FrameworkRow::default()
        });
        let no_name = validate_framework(&FrameworkRow {
            code: Some("ISO".into()),
            ..FrameworkRow::default()
        });

        assert_eq!(no_code.error(), Some("Missing required field: code"));
        assert_eq!(no_name.error(), Some("Missing required field: name"));
    }

    #[test]
    fn framework_code_is_normalized() {
        let preview = validate_framework(&FrameworkRow::new("  ISO  27001 ", "ISO 27001"));
        assert_eq!(preview.data().unwrap().code.as_str(), "ISO 27001");
    }

    #[test_case("", "T", "X", "requirement_code"; "code first")]
    #[test_case("A", "  ", "", "title"; "title before text")]
    #[test_case("A", "T", "\n", "text"; "blank text")]
    fn requirement_reports_first_missing_field(code: &str, title: &str, text: &str, field: &str) {
        let preview = validate_requirement(&RequirementCandidate::new(code, title, text));
        assert_eq!(preview.error(), Some(format!("Missing required field: {field}").as_str()));
    }

    #[test_case(None, true; "absent")]
    #[test_case(Some("FALSE"), false; "uppercase false")]
    #[test_case(Some("no"), true; "anything else")]
    fn active_flag(raw: Option<&str>, expected: bool) {
        let candidate = RequirementCandidate {
            is_active: raw.map(ToString::to_string),
            priority: Some("HIGH".into()),
            ..RequirementCandidate::new("A", "T", "X")
        };

        let record = validate_requirement(&candidate).data().cloned().unwrap();

        assert_eq!(record.is_active, expected);
        assert_eq!(record.priority, Some(Priority::High));
    }

    #[test]
    fn duplicates_within_a_framework_are_flagged() {
        let first = RequirementCandidate {
            framework_code: Some("ISO".into()),
            ..RequirementCandidate::new("A.1", "T", "X")
        };
        let same_framework = RequirementCandidate {
            framework_code: Some("iso".into()),
            ..first.clone()
        };
        let other_framework = RequirementCandidate {
            framework_code: Some("NIST".into()),
            ..first.clone()
        };

        let preview = preview_requirements([&first, &same_framework, &other_framework]);

        assert!(preview[0].is_ok());
        assert_eq!(preview[1].error(), Some("Duplicate requirement_code: A.1"));
        assert!(preview[2].is_ok());
    }

    #[test]
    fn dry_run_counts() {
        let (_, _, summary) = dry_run(
            &[FrameworkRow::new("ISO", "ISO 27001")],
            &[
                RequirementCandidate::new("A.1", "T", "X"),
                RequirementCandidate::new("A.2", "", "X"),
            ],
        );

        assert_eq!(summary.framework_ok, 1);
        assert_eq!(summary.req_ok, 1);
        assert_eq!(summary.req_err, 1);
    }
}
