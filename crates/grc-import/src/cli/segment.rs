use std::path::Path;

use grc_import_core::importer::read_rich;
use tracing::instrument;

use crate::cli::{
    SourceArgs, load_config,
    output::{self, OutputFormat},
};

#[derive(Debug, clap::Parser)]
pub struct Command {
    #[command(flatten)]
    source: SourceArgs,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = load_config(root);
        let loaded = read_rich(&self.source.into_source()?, &config).await?;

        match self.output {
            OutputFormat::Table => {
                output::print_candidates(&loaded.candidates, loaded.title.as_deref());
            }
            OutputFormat::Json => output::print_json(&loaded.candidates)?,
        }
        Ok(())
    }
}
