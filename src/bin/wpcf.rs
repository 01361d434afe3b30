//! wpcf CLI: operator interface to the WordPress to Contentful migration.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use wpcf_migrate::config::{Config, ContentfulConfig, Settings, WordPressConfig};
use wpcf_migrate::source::{COLLECTIONS, WordPressClient};
use wpcf_migrate::stages::{Layout, Migration, Stage};
use wpcf_migrate::store::{ContentfulClient, MemoryStore, RecordService};
use wpcf_migrate::telemetry::{TelemetryConfig, init_telemetry};
use wpcf_migrate::transform;

#[derive(Parser)]
#[command(name = "wpcf", about = "Migrate a WordPress site into Contentful")]
struct Cli {
    /// Pipeline settings file (TOML). Falls back to MIGRATE_SETTINGS.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download source collections into the build directory
    Download {
        /// Collections to fetch (default: all)
        #[arg(long, value_delimiter = ',')]
        collections: Vec<String>,
    },
    /// Turn downloaded pages into upload inputs
    Transform,
    /// Run one upload stage
    Upload {
        stage: StageArg,
        /// Reprocess only the stage's previously failed items
        #[arg(long)]
        retry_failed: bool,
        #[command(flatten)]
        target: Target,
    },
    /// Run every upload stage in order
    Run {
        #[command(flatten)]
        target: Target,
    },
    /// Point the first link of an array field at a fixed entry
    Relink {
        #[arg(long)]
        content_type: String,
        #[arg(long)]
        field: String,
        /// Entry ID to link to
        #[arg(long)]
        entry: String,
        #[command(flatten)]
        target: Target,
    },
    /// Delete every entry of the given content types
    Purge {
        #[arg(long = "content-type", required = true)]
        content_types: Vec<String>,
        /// Only entries created by this user ID
        #[arg(long)]
        created_by: Option<String>,
        #[command(flatten)]
        target: Target,
    },
}

#[derive(clap::Args)]
struct Target {
    /// Run against an in-memory store instead of the destination
    #[arg(long)]
    dry_run: bool,
    /// Override the configured concurrency for every stage
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    Assets,
    Authors,
    Topics,
    PostReferences,
    Posts,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Assets => Stage::Assets,
            StageArg::Authors => Stage::Authors,
            StageArg::Topics => Stage::Topics,
            StageArg::PostReferences => Stage::PostReferences,
            StageArg::Posts => Stage::Posts,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env();

    let _guard = init_telemetry(TelemetryConfig::from_config(&config, "wpcf"))?;

    let settings_path = cli.settings.or_else(|| config.settings_path.clone());
    let settings = Settings::load(settings_path.as_deref())?;
    let layout = Layout::new(&config.build_dir);

    match cli.command {
        Command::Download { collections } => cmd_download(&layout, collections).await,
        Command::Transform => {
            let summary = transform::run(&layout).await?;
            println!("Transformed: {summary}");
            Ok(())
        }
        Command::Upload {
            stage,
            retry_failed,
            target,
        } => {
            let stage = Stage::from(stage);
            let migration = migration(&config, settings, layout, &target)?;
            let summary = migration.run_stage(stage, retry_failed).await?;
            println!("{stage}: {summary}");
            Ok(())
        }
        Command::Run { target } => {
            let migration = migration(&config, settings, layout, &target)?;
            for (stage, summary) in migration.run_all().await? {
                println!("{stage}: {summary}");
            }
            Ok(())
        }
        Command::Relink {
            content_type,
            field,
            entry,
            target,
        } => {
            let migration = migration(&config, settings, layout, &target)?;
            let summary = migration.relink(&content_type, &field, &entry).await?;
            println!("relink {content_type}: {summary}");
            Ok(())
        }
        Command::Purge {
            content_types,
            created_by,
            target,
        } => {
            let migration = migration(&config, settings, layout, &target)?;
            for (content_type, summary) in migration
                .purge(&content_types, created_by.as_deref())
                .await?
            {
                println!("purge {content_type}: {summary}");
            }
            Ok(())
        }
    }
}

fn migration(
    config: &Config,
    settings: Settings,
    layout: Layout,
    target: &Target,
) -> anyhow::Result<Migration> {
    let (service, layout) = if target.dry_run {
        tracing::info!("dry run: writing to an in-memory store");
        let store: Arc<dyn RecordService> = Arc::new(MemoryStore::new());
        (store, layout.with_results_in("dry-run"))
    } else {
        let client: Arc<dyn RecordService> =
            Arc::new(ContentfulClient::new(&ContentfulConfig::from_env()?)?);
        (client, layout)
    };
    Ok(Migration::new(service, settings, config.locale.clone(), layout)
        .with_concurrency(target.concurrency))
}

async fn cmd_download(layout: &Layout, collections: Vec<String>) -> anyhow::Result<()> {
    let client = WordPressClient::new(&WordPressConfig::from_env()?)?;
    let collections = if collections.is_empty() {
        COLLECTIONS.iter().map(|c| c.to_string()).collect()
    } else {
        collections
    };

    for collection in &collections {
        let count = client
            .download(collection, &layout.source_dir(collection))
            .await?;
        println!("{collection}: {count} item(s)");
    }
    Ok(())
}
