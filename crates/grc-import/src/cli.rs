use std::path::{Path, PathBuf};

mod config;
mod import;
mod ingest;
mod init;
mod output;
mod preview;
mod review;
mod search;
mod segment;
mod terminal;

use anyhow::Context;
use clap::ArgAction;
use grc_import_core::{
    Config, FrameworkRow, ImportSession, Loaded, RestStore, RichSource,
    reconcile::CommitProgress,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cli::terminal::Colorize;

/// Location of the configuration file below the project root.
const CONFIG_FILE: &str = ".grc/config.toml";

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The project root holding `.grc/config.toml`
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command.run(self.root).await
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Create `.grc/config.toml` with default settings
    Init(init::Command),

    /// Show or modify configuration settings
    Config(config::Command),

    /// Validate a CSV or JSON file without writing anything
    ///
    /// Exits with code 2 if any row is invalid.
    Preview(preview::Command),

    /// Import a CSV or JSON file of discrete requirements
    Import(import::Command),

    /// Split a document, web page or pasted text into requirements and print
    /// them
    Segment(segment::Command),

    /// Import a workbook, document, web page or pasted text, with interactive
    /// review
    Ingest(ingest::Command),

    /// Search risks or controls to link requirements to
    Search(search::Command),
}

impl Command {
    async fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Init(command) => command.run(&root)?,
            Self::Config(command) => command.run(&root)?,
            Self::Preview(command) => command.run(&root)?,
            Self::Import(command) => command.run(&root).await?,
            Self::Segment(command) => command.run(&root).await?,
            Self::Ingest(command) => command.run(&root).await?,
            Self::Search(command) => command.run(&root).await?,
        }
        Ok(())
    }
}

fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

fn load_config(root: &Path) -> Config {
    Config::load_or_default(&config_path(root))
}

fn open_store(config: &Config) -> anyhow::Result<RestStore> {
    RestStore::from_config(config).context(
        "No persistence service configured; run `grc-import config set store_url <URL>`",
    )
}

/// Which framework owns rows that do not name one.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct FrameworkArgs {
    /// Code of the framework to create or update for rows that name none
    #[arg(long = "framework", value_name = "CODE", requires = "framework_name")]
    framework_code: Option<String>,

    /// Display name of that framework
    #[arg(long, value_name = "NAME", requires = "framework_code")]
    framework_name: Option<String>,

    /// Version of that framework
    #[arg(long, value_name = "VERSION", requires = "framework_code")]
    framework_version: Option<String>,

    /// Issuing authority of that framework
    #[arg(long, value_name = "AUTHORITY", requires = "framework_code")]
    authority: Option<String>,

    /// Id of an existing framework for rows that name none
    #[arg(long, value_name = "UUID", conflicts_with = "framework_code")]
    framework_id: Option<Uuid>,
}

impl FrameworkArgs {
    fn apply(self, loaded: &mut Loaded) {
        if let Some(id) = self.framework_id {
            loaded.assign_framework_id(id);
        } else if let (Some(code), Some(name)) = (self.framework_code, self.framework_name) {
            loaded.assign_framework(FrameworkRow {
                version: self.framework_version,
                authority: self.authority,
                ..FrameworkRow::new(code, name)
            });
        }
    }
}

/// Where a rich import reads from.
#[derive(Debug, Clone, clap::Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Workbook (.xlsx, .xls) or Word document (.docx)
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Web page to fetch; `https://` is assumed when no scheme is given
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Text or HTML to segment; `-` reads standard input
    #[arg(long, value_name = "TEXT")]
    paste: Option<String>,
}

impl SourceArgs {
    fn into_source(self) -> anyhow::Result<RichSource> {
        if let Some(path) = self.file {
            return Ok(RichSource::File(path));
        }
        if let Some(url) = self.url {
            return Ok(RichSource::Url(url));
        }
        match self.paste.as_deref() {
            Some("-") => {
                let text = std::io::read_to_string(std::io::stdin())
                    .context("Failed to read standard input")?;
                Ok(RichSource::Paste(text))
            }
            Some(text) => Ok(RichSource::Paste(text.to_string())),
            None => anyhow::bail!("No input selected"),
        }
    }
}

/// Cancels the returned token on Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "Interrupted; stopping after the current row".warning());
            trigger.cancel();
        }
    });
    token
}

/// Commits the session with a progress bar, then prints the report.
///
/// Exits with code 2 if any row or mapping failed.
async fn commit_session(session: &mut ImportSession, store: &RestStore) -> anyhow::Result<()> {
    let progress = ProgressBar::new(0);
    progress.set_style(ProgressStyle::with_template(
        "{spinner} {bar:40} {pos}/{len} rows",
    )?);

    let bar = progress.clone();
    let result = session
        .commit_with_progress(store, cancel_on_interrupt(), move |step: CommitProgress| {
            bar.set_length(step.total as u64);
            bar.set_position(step.done as u64);
        })
        .await;
    progress.finish_and_clear();

    let report = result?;
    output::print_report(report);
    if !report.is_complete() {
        std::process::exit(2);
    }
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<()> {
    let proceed = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    if !proceed {
        println!("Cancelled");
        std::process::exit(130);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use grc_import_core::{Loaded, RequirementCandidate, RichSource};
    use uuid::Uuid;

    use super::Cli;

    #[test]
    fn framework_name_requires_code() {
        let result = Cli::try_parse_from([
            "grc-import",
            "preview",
            "rows.csv",
            "--framework-name",
            "ISO 27001",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn rich_sources_are_exclusive() {
        let result = Cli::try_parse_from([
            "grc-import",
            "segment",
            "--url",
            "example.com",
            "--paste",
            "MADDE 1 text",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn framework_flags_fill_unowned_rows() {
        let args = super::FrameworkArgs {
            framework_code: Some("KVKK".to_string()),
            framework_name: Some("Data Protection Law".to_string()),
            framework_version: Some("2016".to_string()),
            ..super::FrameworkArgs::default()
        };
        let mut loaded = Loaded {
            candidates: vec![RequirementCandidate::new("MADDE 1", "T", "X")],
            ..Loaded::default()
        };

        args.apply(&mut loaded);

        assert_eq!(loaded.frameworks[0].row.version.as_deref(), Some("2016"));
        assert_eq!(loaded.candidates[0].framework_code.as_deref(), Some("KVKK"));
    }

    #[test]
    fn framework_id_wins() {
        let id = Uuid::new_v4();
        let args = super::FrameworkArgs {
            framework_id: Some(id),
            ..super::FrameworkArgs::default()
        };
        let mut loaded = Loaded {
            candidates: vec![RequirementCandidate::new("A", "T", "X")],
            ..Loaded::default()
        };

        args.apply(&mut loaded);

        assert!(loaded.frameworks.is_empty());
        assert_eq!(loaded.candidates[0].framework_id, Some(id));
    }

    #[test]
    fn inline_paste_is_taken_verbatim() {
        let args = super::SourceArgs {
            file: None,
            url: None,
            paste: Some("Article 1. Scope of this law".to_string()),
        };

        assert_eq!(
            args.into_source().unwrap(),
            RichSource::Paste("Article 1. Scope of this law".to_string())
        );
    }
}
