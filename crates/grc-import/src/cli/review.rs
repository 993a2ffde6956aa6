//! Interactive review of segmented candidates before commit.

use dialoguer::{Input, Select};
use grc_import_core::{
    Config, ImportSession, RequirementCandidate, Store,
    enrich::enrich_targets,
    link::{EntityKind, Linker},
};

use crate::cli::terminal::{self, Colorize};

const ACTIONS: &[&str] = &[
    "Toggle include",
    "Edit code",
    "Edit title",
    "Link risk",
    "Link control",
    "Clear links",
    "Back",
];

/// Walks the candidates until the user picks "Done".
pub async fn run<S: Store>(
    session: &mut ImportSession,
    store: &S,
    config: &Config,
) -> anyhow::Result<()> {
    let linker = Linker::new(store, config);

    loop {
        let mut items: Vec<String> = session.candidates().iter().map(label).collect();
        let count = items.len();
        items.extend([
            "+ Create risk".to_string(),
            "+ Create control".to_string(),
            "Done".to_string(),
        ]);

        let choice = Select::new()
            .with_prompt("Review candidates")
            .items(&items)
            .default(count + 2)
            .interact()?;

        match choice.checked_sub(count) {
            None => edit(session, &linker, store, choice).await?,
            Some(0) => create_risk(session, &linker).await?,
            Some(1) => create_control(session, &linker).await?,
            Some(_) => return Ok(()),
        }
    }
}

fn label(candidate: &RequirementCandidate) -> String {
    let mark = if candidate.include { "[x]" } else { "[ ]" };
    let mut links = Vec::new();
    if candidate.linked_risk_id.is_some() {
        links.push("risk");
    }
    if candidate.linked_control_id.is_some() {
        links.push("control");
    }
    let title = terminal::truncate(&candidate.title, terminal::width().saturating_sub(24));
    if links.is_empty() {
        format!("{mark} {title}")
    } else {
        format!("{mark} {title} ({})", links.join(", "))
    }
}

async fn edit<S: Store>(
    session: &mut ImportSession,
    linker: &Linker<'_, S>,
    store: &S,
    index: usize,
) -> anyhow::Result<()> {
    let candidate = &session.candidates()[index];
    println!("\n{}", candidate.title.info());
    for line in candidate.text.lines().take(8) {
        println!("  {}", line.dim());
    }
    println!();

    let action = Select::new()
        .with_prompt("Action")
        .items(ACTIONS)
        .default(ACTIONS.len() - 1)
        .interact()?;

    match action {
        0 => {
            let include = !session.candidates()[index].include;
            session.set_include(index, include)?;
        }
        1 => {
            let code: String = Input::new()
                .with_prompt("Code")
                .with_initial_text(session.candidates()[index].requirement_code.clone())
                .interact_text()?;
            session.edit(index, |candidate| candidate.requirement_code = code)?;
        }
        2 => {
            let title: String = Input::new()
                .with_prompt("Title")
                .with_initial_text(session.candidates()[index].title.clone())
                .interact_text()?;
            session.edit(index, |candidate| candidate.title = title)?;
        }
        3 => link(session, linker, store, index, EntityKind::Risk).await?,
        4 => link(session, linker, store, index, EntityKind::Control).await?,
        5 => {
            session.link(index, EntityKind::Risk, None)?;
            session.link(index, EntityKind::Control, None)?;
        }
        _ => {}
    }
    Ok(())
}

async fn link<S: Store>(
    session: &mut ImportSession,
    linker: &Linker<'_, S>,
    store: &S,
    index: usize,
    kind: EntityKind,
) -> anyhow::Result<()> {
    let query: String = Input::new()
        .with_prompt(format!("Search {kind} titles"))
        .interact_text()?;

    let targets = linker.search(kind, &query).await?;
    if targets.is_empty() {
        println!("{}", format!("No {kind} matched '{query}'").warning());
        return Ok(());
    }

    let results = enrich_targets(store, targets).await;
    let labels: Vec<String> = results
        .iter()
        .map(|result| {
            format!(
                "{}  {}",
                result.target.title,
                format!("{} / {}", result.business_unit, result.owner).dim()
            )
        })
        .collect();

    let Some(choice) = Select::new()
        .with_prompt(format!("Link to {kind}"))
        .items(&labels)
        .interact_opt()?
    else {
        return Ok(());
    };
    session.link(index, kind, Some(results[choice].target.id))?;
    Ok(())
}

async fn create_risk<S: Store>(
    session: &mut ImportSession,
    linker: &Linker<'_, S>,
) -> anyhow::Result<()> {
    let title: String = Input::new().with_prompt("Risk title").interact_text()?;
    let risk = linker.create_risk(&title).await?;
    report_attached(session, EntityKind::Risk, &risk.title, risk.id)
}

async fn create_control<S: Store>(
    session: &mut ImportSession,
    linker: &Linker<'_, S>,
) -> anyhow::Result<()> {
    let code: String = Input::new().with_prompt("Control code").interact_text()?;
    let title: String = Input::new().with_prompt("Control title").interact_text()?;
    let description: String = Input::new()
        .with_prompt("Description")
        .allow_empty(true)
        .interact_text()?;

    let control = linker
        .create_control(&code, &title, Some(&description))
        .await?;
    report_attached(session, EntityKind::Control, &control.title, control.id)
}

fn report_attached(
    session: &mut ImportSession,
    kind: EntityKind,
    title: &str,
    id: uuid::Uuid,
) -> anyhow::Result<()> {
    match session.attach(kind, id)? {
        Some(index) => println!(
            "{}",
            format!(
                "Created {kind} '{title}' and linked it to {}",
                session.candidates()[index].requirement_code
            )
            .success()
        ),
        None => println!(
            "{}",
            format!("Created {kind} '{title}'; every included candidate already has one").warning()
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use grc_import_core::RequirementCandidate;
    use uuid::Uuid;

    use super::label;

    #[test]
    fn label_marks_exclusion_and_links() {
        let candidate = RequirementCandidate {
            include: false,
            linked_risk_id: Some(Uuid::new_v4()),
            ..RequirementCandidate::new("MADDE 1", "MADDE 1: Amaç", "Bu Kanunun amacı")
        };

        assert_eq!(label(&candidate), "[ ] MADDE 1: Amaç (risk)");
    }
}
