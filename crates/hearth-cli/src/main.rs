//! Hearth
//!
//! Scans the installed game stores, persists the merged library and fetches
//! artwork for it.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use hearth_artwork::{ArtworkPipeline, GridClient};
use hearth_config::{ArtKind, HearthConfig};
use hearth_library::{ArtworkLayout, GameDatabase, GameRecord, LibraryScanner, ScanOptions};

/// Game library discovery and artwork
#[derive(Parser)]
#[command(name = "hearth", version)]
#[command(about = "Discover installed games across stores and fetch their artwork")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the library database and artwork
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan every enabled source and replace the stored library
    Scan {
        /// Source bitmask: 1 native, 2 shortcuts, 4 launcher A, 8 launcher B
        #[arg(long)]
        sources: Option<u8>,

        /// Keep records whose names collide
        #[arg(long)]
        no_dedup: bool,

        /// Print the library as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch missing artwork for the stored library
    Artwork,

    /// List the stored library
    List {
        /// Only titles containing TEXT
        #[arg(long, value_name = "TEXT")]
        search: Option<String>,
    },

    /// Show which stores are installed on this machine
    Stores,

    /// Manage the artwork blacklist
    Blacklist {
        #[command(subcommand)]
        command: BlacklistCommand,
    },
}

#[derive(Subcommand)]
enum BlacklistCommand {
    /// Forget blacklisted titles so they are looked up again
    Reset {
        /// Only this kind (boxart, hero or logo)
        #[arg(long)]
        kind: Option<ArtKind>,
    },
}

/// Resolved locations for one invocation
struct Session {
    config_path: PathBuf,
    data_dir: PathBuf,
    config: HearthConfig,
}

impl Session {
    fn load(cli: &Cli) -> Result<Self> {
        let config_path = match &cli.config {
            Some(path) => path.clone(),
            None => hearth_config::default_config_path()?,
        };
        let data_dir = match &cli.data_dir {
            Some(path) => path.clone(),
            None => hearth_config::default_data_dir()?,
        };
        let config = HearthConfig::load_or_default(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;

        Ok(Self {
            config_path,
            data_dir,
            config,
        })
    }

    fn database(&self) -> Result<GameDatabase> {
        let path = self.data_dir.join("library.db");
        GameDatabase::open(&path).with_context(|| format!("Failed to open {}", path.display()))
    }

    fn artwork_layout(&self) -> ArtworkLayout {
        ArtworkLayout::new(self.data_dir.join("artwork"))
    }

    fn save_config(&self) -> Result<()> {
        self.config
            .save(&self.config_path)
            .with_context(|| format!("Failed to save {}", self.config_path.display()))
    }
}

/// Setup logging to stderr so stdout stays machine-readable
fn setup_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut ctx = Session::load(&cli)?;

    match cli.command {
        Commands::Scan {
            sources,
            no_dedup,
            json,
        } => scan(&ctx, sources, no_dedup, json),
        Commands::Artwork => artwork(&mut ctx).await,
        Commands::List { search } => list(&ctx, search.as_deref()),
        Commands::Stores => stores(&ctx),
        Commands::Blacklist {
            command: BlacklistCommand::Reset { kind },
        } => reset_blacklist(&mut ctx, kind),
    }
}

fn scan(ctx: &Session, sources: Option<u8>, no_dedup: bool, json: bool) -> Result<()> {
    let options = ScanOptions::from_config(sources.unwrap_or(ctx.config.library.sources));
    let scanner = LibraryScanner::new(&ctx.config.library)
        .skip_duplicates(ctx.config.library.skip_duplicates && !no_dedup)
        .with_artwork_layout(ctx.artwork_layout());

    let mut db = ctx.database()?;
    let outcome = scanner
        .scan_and_store(options, &mut db)
        .context("Failed to store library")?;

    if json {
        let out = serde_json::to_string_pretty(&outcome.library)?;
        println!("{out}");
    } else {
        print_records(outcome.library.iter());
        println!();
        println!(
            "{} games, {} conflicts, {} duplicates removed in {}ms",
            outcome.library.len(),
            outcome.conflicts.len(),
            outcome.duplicates_removed.len(),
            outcome.duration_ms
        );
    }
    Ok(())
}

async fn artwork(ctx: &mut Session) -> Result<()> {
    if ctx.config.artwork.api_key.is_empty() {
        bail!(
            "artwork.api_key is not set in {}",
            ctx.config_path.display()
        );
    }

    let library = ctx.database()?.load_all().context("Failed to load library")?;
    if library.is_empty() {
        warn!("Library is empty, run `hearth scan` first");
        return Ok(());
    }

    let client = GridClient::new(&ctx.config.artwork)?;
    let pipeline = ArtworkPipeline::new(
        Arc::new(client),
        ctx.artwork_layout(),
        ctx.config.artwork.clone(),
    );

    let mut blacklist = ctx.config.blacklist.clone();
    let mut snapshot_config = ctx.config.clone();
    let config_path = ctx.config_path.clone();

    let report = pipeline
        .resolve(&library, &mut blacklist, |progress, current| {
            info!(
                "Artwork {}/{} ({}%)",
                progress.completed,
                progress.total,
                progress.percent()
            );
            snapshot_config.blacklist = current.clone();
            if let Err(e) = snapshot_config.save(&config_path) {
                warn!("Failed to save blacklist: {}", e);
            }
        })
        .await;

    ctx.config.blacklist = blacklist;
    ctx.save_config()?;

    println!(
        "{} downloaded, {} blacklisted, {} failed, {} unresolved, {} up to date",
        report.downloaded.len(),
        report.newly_blacklisted.len(),
        report.failed.len(),
        report.unresolved.len(),
        report.skipped
    );
    Ok(())
}

fn list(ctx: &Session, search: Option<&str>) -> Result<()> {
    let db = ctx.database()?;
    let records = match search {
        Some(query) => db.search_games(query)?,
        None => db.load_all()?.into_records(),
    };

    print_records(records.iter());
    println!();
    println!("{} of {} games", records.len(), db.game_count()?);
    Ok(())
}

fn stores(ctx: &Session) -> Result<()> {
    let scanner = LibraryScanner::new(&ctx.config.library);
    for status in scanner.stores() {
        println!(
            "{:<16} {:<20} {:?}",
            status.source.as_str(),
            status.variant.as_str(),
            status.state
        );
        for location in &status.locations {
            println!("  {}", location.display());
        }
    }
    Ok(())
}

fn reset_blacklist(ctx: &mut Session, kind: Option<ArtKind>) -> Result<()> {
    let before: usize = ArtKind::ALL
        .into_iter()
        .map(|k| ctx.config.blacklist.len(k))
        .sum();
    ctx.config.blacklist.reset(kind);
    let after: usize = ArtKind::ALL
        .into_iter()
        .map(|k| ctx.config.blacklist.len(k))
        .sum();
    ctx.save_config()?;

    info!("Removed {} blacklist entries", before - after);
    Ok(())
}

fn print_records<'a>(records: impl Iterator<Item = &'a GameRecord>) {
    for record in records {
        println!(
            "{:<20} {:<16} {:<20} {}",
            record.app_id,
            record.source.as_str(),
            record.platform_variant.as_str(),
            record.name
        );
    }
}
