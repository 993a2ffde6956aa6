use std::path::{Path, PathBuf};

use grc_import_core::{ImportSession, importer::read_bulk};
use tracing::instrument;

use crate::cli::{
    FrameworkArgs, load_config,
    output::{self, OutputFormat},
};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// CSV or JSON file to validate
    file: PathBuf,

    #[command(flatten)]
    framework: FrameworkArgs,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = load_config(root);
        let mut loaded = read_bulk(&self.file)?;
        self.framework.apply(&mut loaded);

        let mut session = ImportSession::new(config.bulk_strictness());
        session.load(loaded)?;

        match self.output {
            OutputFormat::Table => output::print_preview(&session),
            OutputFormat::Json => output::print_json(&session.preview())?,
        }

        if session.summary().has_errors() {
            std::process::exit(2);
        }
        Ok(())
    }
}
