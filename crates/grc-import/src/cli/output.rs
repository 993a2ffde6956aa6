//! Rendering of previews, segments and commit reports.

use grc_import_core::{
    DryRunSummary, ImportSession, RequirementCandidate, reconcile::CommitReport,
};

use crate::cli::terminal::{self, Colorize};

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Prints every framework and included candidate with its validation result.
pub fn print_preview(session: &ImportSession) {
    let preview = session.preview();
    let width = terminal::width();

    if !preview.frameworks.is_empty() {
        println!("{}", "Frameworks".info());
        for (entry, row) in session.frameworks().iter().zip(&preview.frameworks) {
            let code = entry.row.code.as_deref().unwrap_or("(no code)");
            match row.error() {
                None => println!("  {} {code}", "✓".success()),
                Some(error) => println!("  {} {code}  {}", "✗".failure(), error.failure()),
            }
        }
        println!();
    }

    println!("{}", "Requirements".info());
    for requirement in &preview.requirements {
        let candidate = &session.candidates()[requirement.index];
        let code = if candidate.requirement_code.trim().is_empty() {
            "(no code)"
        } else {
            candidate.requirement_code.as_str()
        };
        match requirement.row.error() {
            None => {
                let title = terminal::truncate(&candidate.title, width.saturating_sub(code.len() + 8));
                println!("  {} {code}  {}", "✓".success(), title.dim());
            }
            Some(error) => println!("  {} {code}  {}", "✗".failure(), error.failure()),
        }
    }

    let excluded = session.candidates().len() - preview.requirements.len();
    if excluded > 0 {
        println!("  {}", format!("{excluded} excluded").dim());
    }
    println!();
    print_summary(preview.summary);
}

pub fn print_summary(summary: DryRunSummary) {
    let line = format!(
        "Frameworks: {} ok, {} invalid. Requirements: {} ok, {} invalid.",
        summary.framework_ok, summary.framework_err, summary.req_ok, summary.req_err
    );
    if summary.has_errors() {
        println!("{}", line.warning());
    } else {
        println!("{}", line.success());
    }
}

/// Prints segmented candidates, one block per candidate.
pub fn print_candidates(candidates: &[RequirementCandidate], title: Option<&str>) {
    let width = terminal::width();
    if let Some(title) = title {
        println!("{}\n", title.info());
    }
    for candidate in candidates {
        println!("{}", candidate.title);
        for line in candidate.text.lines().take(3) {
            println!("  {}", terminal::truncate(line, width.saturating_sub(2)).dim());
        }
        if candidate.text.lines().count() > 3 {
            println!("  {}", "…".dim());
        }
        println!();
    }
    println!("{} segments", candidates.len());
}

/// Prints the outcome of a commit.
pub fn print_report(report: &CommitReport) {
    for framework in &report.frameworks {
        let verb = if framework.created { "Created" } else { "Updated" };
        println!(
            "{} framework {} {}",
            verb.success(),
            framework.code,
            framework.id.to_string().dim()
        );
    }
    if report.sections > 0 {
        println!("{} {} sections", "Upserted".success(), report.sections);
    }
    println!(
        "{} {} requirements, {} mappings",
        "Upserted".success(),
        report.requirements.len(),
        report.mappings
    );

    if !report.failures.is_empty() {
        println!("\n{}", format!("{} rows failed:", report.failures.len()).failure());
        for failure in &report.failures {
            println!("  {}  {}", failure.code, failure.message.dim());
        }
    }
    if !report.mapping_failures.is_empty() {
        println!(
            "\n{}",
            format!("{} mappings failed:", report.mapping_failures.len()).warning()
        );
        for failure in &report.mapping_failures {
            println!(
                "  {} → {} {}  {}",
                failure.requirement_code,
                failure.kind,
                failure.target_id,
                failure.message.dim()
            );
        }
    }
}

/// Pretty-prints a value as JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
