use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wikisync::{
    load_entities, open_database, resolve_all, EntityUpdater, MediaWikiPublisher,
};

/// Automatic wiki synchronization of game entity prototypes.
#[derive(Parser)]
#[command(name = "wikisync", version)]
struct Cli {
    /// Path to the root of the game content repository
    project_path: PathBuf,

    /// Edit summary given for every modified page
    edit_summary: String,

    /// SQLite database tracking published segment fingerprints
    #[arg(long, env = "WIKISYNC_DB", default_value = "wikisync.db")]
    database: PathBuf,

    /// MediaWiki api.php endpoint
    #[arg(long, env = "WIKISYNC_API_URL")]
    api_url: String,

    /// Bot account name (anonymous edits when omitted)
    #[arg(long, env = "WIKISYNC_BOT_USER")]
    bot_user: Option<String>,

    #[arg(long, env = "WIKISYNC_BOT_PASSWORD", hide_env_values = true)]
    bot_password: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Loading entity prototypes...");
    let mut entities = load_entities(&cli.project_path)?;
    info!("Loaded {} entity prototypes", entities.len());

    info!("Resolving entity inheritance trees...");
    let resolve_report = resolve_all(&mut entities)?;
    if resolve_report.missing_ancestors > 0 {
        warn!(
            "{} dangling parent references across the prototype set",
            resolve_report.missing_ancestors
        );
    }
    info!("Resolved {} entity prototypes", resolve_report.resolved);

    let mut conn = open_database(&cli.database)?;

    let mut publisher = MediaWikiPublisher::new(&cli.api_url)?;
    if let (Some(user), Some(password)) = (&cli.bot_user, &cli.bot_password) {
        publisher.login(user, password)?;
    }

    info!("Updating entity pages...");
    let report = EntityUpdater::new(&mut conn, &mut publisher, &cli.edit_summary).run(&entities);
    info!(
        "Done: {} pages updated, {} unchanged, {} failed",
        report.updated,
        report.skipped,
        report.failures.len()
    );
    for failure in &report.failures {
        warn!(entity = %failure.entity_id, error = %failure.error, "entity was not published");
    }

    Ok(())
}
