use std::path::{Path, PathBuf};

use grc_import_core::{ImportSession, SessionError, Strictness, importer::read_bulk};
use tracing::instrument;

use crate::cli::{
    FrameworkArgs, commit_session, confirm, load_config, open_store, output,
    terminal::Colorize,
};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// CSV or JSON file to import
    file: PathBuf,

    #[command(flatten)]
    framework: FrameworkArgs,

    /// Override the configured `bulk_strictness`
    #[arg(long, value_name = "MODE")]
    strictness: Option<Strictness>,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = load_config(root);
        let store = open_store(&config)?;

        let mut loaded = read_bulk(&self.file)?;
        self.framework.apply(&mut loaded);

        let mut session =
            ImportSession::new(self.strictness.unwrap_or_else(|| config.bulk_strictness()));
        session.load(loaded)?;
        output::print_preview(&session);

        if !session.can_commit() {
            let reason = if session.plan().is_empty() {
                SessionError::NothingToCommit.to_string()
            } else {
                "Invalid rows block an all-or-nothing import \
                 (rerun with --strictness best-effort to import the valid rows)"
                    .to_string()
            };
            eprintln!("\n{}", reason.failure());
            std::process::exit(2);
        }

        if !self.yes {
            confirm("Commit these rows?")?;
        }
        commit_session(&mut session, &store).await
    }
}
