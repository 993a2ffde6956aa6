use std::{io::IsTerminal, path::Path};

use grc_import_core::{ImportSession, Strictness, importer::read_rich};
use tracing::instrument;

use crate::cli::{
    FrameworkArgs, SourceArgs, commit_session, confirm, load_config, open_store, output, review,
    terminal::Colorize,
};

#[derive(Debug, clap::Parser)]
pub struct Command {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    framework: FrameworkArgs,

    /// Override the configured `rich_strictness`
    #[arg(long, value_name = "MODE")]
    strictness: Option<Strictness>,

    /// Commit without reviewing or confirming
    #[arg(long, short)]
    yes: bool,
}

impl Command {
    #[instrument]
    pub async fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = load_config(root);
        let store = open_store(&config)?;

        let mut loaded = read_rich(&self.source.into_source()?, &config).await?;
        self.framework.apply(&mut loaded);
        if let Some(title) = &loaded.title {
            println!("{}", title.info());
        }

        let mut session =
            ImportSession::new(self.strictness.unwrap_or_else(|| config.rich_strictness()));
        session.load(loaded)?;

        if !self.yes && std::io::stdin().is_terminal() {
            review::run(&mut session, &store, &config).await?;
        }

        output::print_preview(&session);
        if !session.can_commit() {
            eprintln!(
                "\n{}",
                "Nothing can be committed; fix or exclude the invalid rows".failure()
            );
            std::process::exit(2);
        }

        if !self.yes {
            confirm("Commit these requirements?")?;
        }
        commit_session(&mut session, &store).await
    }
}
