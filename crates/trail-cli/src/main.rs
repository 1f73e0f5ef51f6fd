//! `trail`: announces directory changes to a chat channel.
//!
//! # Usage
//!
//! ```
//! trail init users          # seed the store without announcing
//! trail run users           # one reconciliation run
//! trail --dry-run run emojis
//! trail test images baby goat
//! ```

mod driver;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use driver::TracingReporter;
use settings::Settings;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use trail_core::{
  Reconciler,
  announce::{Attachment, Message},
  entity::{Emoji, Employee, User},
  hierarchy,
  store::{LogNotifier, Notifier},
};
use trail_remote::{images::ImageSearch, slack::SlackClient, ultipro::UltiproClient};
use trail_store_sqlite::SqliteStore;

const MAX_IMAGES: usize = 5;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "trail", author, version, about = "Announce directory changes to a chat channel")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "trail.toml")]
  config: PathBuf,

  /// Log at debug level.
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Log messages instead of posting them.
  #[arg(long, global = true)]
  dry_run: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Populate an empty store without announcing anything.
  Init { domain: Domain },
  /// Reconcile once and announce every change.
  Run { domain: Domain },
  /// Manual checks of the outer collaborators.
  #[command(subcommand)]
  Test(TestCommand),
}

#[derive(Subcommand, Debug)]
enum TestCommand {
  /// Print `noop` and exit.
  Noop,
  /// Post a test message to the channel.
  Slack,
  /// Post the top image-search thumbnails for a query.
  Images { query: Vec<String> },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Domain {
  Users,
  Emojis,
  Employees,
}

#[derive(Clone, Copy, Debug)]
enum Mode {
  Init,
  Run,
}

// ─── Notifier selection ───────────────────────────────────────────────────────

/// The channel, or the log when `--dry-run` is set.
enum Announcements {
  Slack(SlackClient),
  Log(LogNotifier),
}

impl Announcements {
  fn from_settings(settings: &Settings, dry_run: bool) -> Result<Self> {
    if dry_run {
      return Ok(Self::Log(LogNotifier));
    }
    Ok(Self::Slack(SlackClient::new(settings.slack()?.clone())?))
  }
}

impl Notifier for Announcements {
  type Error = trail_remote::Error;

  async fn notify(&self, message: &Message) -> trail_remote::Result<()> {
    match self {
      Self::Slack(client) => client.notify(message).await,
      Self::Log(log) => log.notify(message).await.map_err(|never| match never {}),
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy(),
    )
    .init();

  if let Command::Test(TestCommand::Noop) = cli.command {
    println!("noop");
    return Ok(());
  }

  let settings = Settings::load(&cli.config)?;

  match cli.command {
    Command::Init { domain } => {
      let label = format!("init {domain:?}").to_lowercase();
      let work = reconcile(settings, domain, Mode::Init, cli.dry_run);
      driver::iteration(&label, &TracingReporter, work).await
    }
    Command::Run { domain } => {
      let label = format!("run {domain:?}").to_lowercase();
      let work = reconcile(settings, domain, Mode::Run, cli.dry_run);
      driver::iteration(&label, &TracingReporter, work).await
    }
    Command::Test(TestCommand::Noop) => Ok(()),
    Command::Test(TestCommand::Slack) => {
      let notifier = Announcements::from_settings(&settings, cli.dry_run)?;
      notifier
        .notify(&Message::new("Testing, testing, 123...", ":rip:"))
        .await
        .context("failed to post test message")
    }
    Command::Test(TestCommand::Images { query }) => {
      post_images(&settings, &query.join(" "), cli.dry_run).await
    }
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn reconcile(settings: Settings, domain: Domain, mode: Mode, dry_run: bool) -> Result<()> {
  let store = SqliteStore::open(&settings.database_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.database_path))?;
  let notifier = Announcements::from_settings(&settings, dry_run)?;
  let reconciler = Reconciler::new(store, notifier, Arc::new(settings.policy()));

  match (mode, domain) {
    (Mode::Init, Domain::Users) => {
      let slack = SlackClient::new(settings.slack()?.clone())?;
      let count = reconciler.initialize::<User, _>(&slack).await?;
      info!(count, "seeded users");
    }
    (Mode::Init, Domain::Emojis) => {
      let slack = SlackClient::new(settings.slack()?.clone())?;
      let count = reconciler.initialize::<Emoji, _>(&slack).await?;
      info!(count, "seeded emojis");
    }
    (Mode::Init, Domain::Employees) => {
      reconciler.ensure_empty::<Employee>().await?;
      let employees = org_chart(&settings).await?;
      let count = reconciler.seed(employees).await?;
      info!(count, "seeded employees");
    }
    (Mode::Run, Domain::Users) => {
      let slack = SlackClient::new(settings.slack()?.clone())?;
      reconciler.run::<User, _>(&slack).await?;
    }
    (Mode::Run, Domain::Emojis) => {
      let slack = SlackClient::new(settings.slack()?.clone())?;
      reconciler.run::<Emoji, _>(&slack).await?;
    }
    (Mode::Run, Domain::Employees) => {
      let employees = org_chart(&settings).await?;
      reconciler.run_observed(employees).await?;
    }
  }

  Ok(())
}

/// Log in to the HR system and flatten the org chart from the configured root.
async fn org_chart(settings: &Settings) -> Result<Vec<Employee>> {
  let client = UltiproClient::connect(settings.ultipro()?.clone())
    .await
    .context("failed to log in to the org chart")?;
  let employees = hierarchy::flatten(&client, client.root_id()).await?;
  info!(count = employees.len(), "flattened org chart");
  Ok(employees)
}

async fn post_images(settings: &Settings, query: &str, dry_run: bool) -> Result<()> {
  if query.trim().is_empty() {
    bail!("`test images` needs a search query");
  }

  let search = ImageSearch::new(settings.google()?.clone())?;
  let links = search.search(query).await.context("image search failed")?;

  let message = links
    .into_iter()
    .take(MAX_IMAGES)
    .fold(
      Message::new("Are any of these the new baby amountee?!?", ":frame_with_picture:"),
      |message, link| message.with_attachment(Attachment::image(link)),
    );

  Announcements::from_settings(settings, dry_run)?
    .notify(&message)
    .await
    .context("failed to post images")
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn cli_is_well_formed() { Cli::command().debug_assert(); }

  #[test]
  fn parses_run_with_global_flags() {
    let cli = Cli::try_parse_from(["trail", "run", "emojis", "--dry-run", "-v"]).unwrap();
    assert!(cli.dry_run);
    assert!(cli.verbose);
    assert!(matches!(cli.command, Command::Run { domain: Domain::Emojis }));
  }

  #[test]
  fn parses_image_query_words() {
    let cli = Cli::try_parse_from(["trail", "test", "images", "baby", "goat"]).unwrap();
    match cli.command {
      Command::Test(TestCommand::Images { query }) => assert_eq!(query, vec!["baby", "goat"]),
      other => panic!("unexpected command: {other:?}"),
    }
  }

  #[test]
  fn unknown_domain_is_rejected() {
    assert!(Cli::try_parse_from(["trail", "init", "groups"]).is_err());
  }

  #[tokio::test]
  async fn images_need_a_query() {
    let settings = Settings::load(std::path::Path::new("/nonexistent/trail.toml")).unwrap();
    let err = post_images(&settings, "  ", true).await.unwrap_err();
    assert!(err.to_string().contains("needs a search query"));
  }
}
