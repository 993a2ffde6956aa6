use std::path::Path;

use grc_import_core::{
    enrich::enrich_targets,
    link::{EntityKind, Linker},
};
use tracing::instrument;

use crate::cli::{
    load_config, open_store,
    output::{self, OutputFormat},
    terminal::Colorize,
};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// What to search
    kind: Kind,

    /// Case-insensitive substring of the title
    query: String,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Kind {
    Risk,
    Control,
}

impl From<Kind> for EntityKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Risk => Self::Risk,
            Kind::Control => Self::Control,
        }
    }
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = load_config(root);
        let store = open_store(&config)?;
        let kind = EntityKind::from(self.kind);

        let targets = Linker::new(&store, &config).search(kind, &self.query).await?;
        let results = enrich_targets(&store, targets).await;

        match self.output {
            OutputFormat::Json => output::print_json(&results)?,
            OutputFormat::Table => {
                if results.is_empty() {
                    println!("No {kind} matched '{}'.", self.query);
                }
                for result in &results {
                    let label = result.target.code.as_deref().map_or_else(
                        || result.target.title.clone(),
                        |code| format!("{code}  {}", result.target.title),
                    );
                    println!("{label}");
                    println!(
                        "  {}",
                        format!(
                            "{}  {} / {}",
                            result.target.id, result.business_unit, result.owner
                        )
                        .dim()
                    );
                }
            }
        }
        Ok(())
    }
}
