use clap::{Parser, Subcommand};
use smm_cli::{logging, AppConfig};
use smm_client::SmmClient;
use smm_sync::{
    BatchOutcome, Category, FileCursorStore, LoggingScanner, NoteBuffer, SyncManager,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Exit status asking the scheduler to run the command again later
const EXIT_RETRY_LATER: u8 = 75;

#[derive(Parser)]
#[command(name = "smm")]
#[command(about = "Sync playlists and songs with a Stephe's Music Manager server", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./smm.toml when present)
    #[arg(short, long, global = true, env = "SMM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a batch of songs and append them to the playlist
    Download {
        category: String,

        /// Songs to request; defaults to download.count
        #[arg(short = 'n', long)]
        count: Option<u32>,

        /// Fixed server-side random seed
        #[arg(long)]
        seed: Option<u32>,
    },

    /// Upload buffered notes
    SendNotes { category: String },

    /// Drop playlist lines before the last played song
    CleanPlaylist { category: String },

    /// Delete song files the playlist no longer mentions
    CleanSongs { category: String },

    /// Run a full sync cycle (all configured categories when none given)
    Sync { categories: Vec<String> },

    /// Print where playback would resume
    Resume { category: String },

    /// Buffer a note about a song for the next upload
    Note {
        category: String,
        song: String,
        text: String,
    },

    /// Sync every configured category periodically
    Daemon,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    logging::init(&config);

    tracing::debug!("Loaded configuration: {:?}", config);

    match cli.command {
        Commands::Download {
            category,
            count,
            seed,
        } => {
            let category = Category::new(category)?;
            let manager = build_manager(&config)?;
            let count = count.unwrap_or(config.download.count);
            let seed = seed.or(config.download.seed);

            let outcome = manager.download_batch(&category, count, seed).await;
            println!("{}: {} songs downloaded", category, outcome.downloaded());
            if outcome.should_retry() {
                return Ok(ExitCode::from(EXIT_RETRY_LATER));
            }
            if let BatchOutcome::Abandoned { .. } = outcome {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::SendNotes { category } => {
            let category = Category::new(category)?;
            let manager = build_manager(&config)?;
            if !manager.send_notes(&category).await {
                return Ok(ExitCode::from(EXIT_RETRY_LATER));
            }
        }

        Commands::CleanPlaylist { category } => {
            let category = Category::new(category)?;
            let manager = local_manager(&config)?;
            let dropped = manager.clean_playlist(&category)?;
            println!("{}: {} songs deleted from playlist", category, dropped);
        }

        Commands::CleanSongs { category } => {
            let category = Category::new(category)?;
            let manager = local_manager(&config)?;
            let deleted = manager.clean_songs(&category)?;
            println!("{}: {} files deleted", category, deleted);
        }

        Commands::Sync { categories } => {
            let categories = if categories.is_empty() {
                config.categories()?
            } else {
                categories
                    .into_iter()
                    .map(Category::new)
                    .collect::<smm_sync::Result<Vec<_>>>()?
            };

            let manager = build_manager(&config)?;
            let errors = sync_all(&manager, &config, &categories).await;
            if errors > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Resume { category } => {
            let category = Category::new(category)?;
            let store = FileCursorStore::new(config.layout(), config.position_cache_path());
            let point = store.load_resume_point(&category)?;
            match point.path {
                Some(path) => println!(
                    "{}: song {} ({}) at {} ms",
                    category,
                    point.start_at + 1,
                    path,
                    point.position_ms
                ),
                None => println!("{}: playlist is empty", category),
            }
        }

        Commands::Note {
            category,
            song,
            text,
        } => {
            let category = Category::new(category)?;
            NoteBuffer::new(config.layout().smm_root()).append(&category, &song, &text)?;
        }

        Commands::Daemon => {
            run_daemon(&config).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn build_manager(config: &AppConfig) -> anyhow::Result<SyncManager> {
    let client = SmmClient::new(config.server_config()?)?;
    Ok(SyncManager::new(client, config.layout()).with_scanner(Arc::new(LoggingScanner)))
}

/// Manager for file-only operations, which never touch the server
fn local_manager(config: &AppConfig) -> anyhow::Result<SyncManager> {
    let server = config
        .server_config()
        .unwrap_or_else(|_| smm_client::ServerConfig::from_address("localhost"));
    Ok(SyncManager::new(SmmClient::new(server)?, config.layout()))
}

/// Sync each category in turn; returns the number of steps that failed
async fn sync_all(manager: &SyncManager, config: &AppConfig, categories: &[Category]) -> usize {
    let plan = config.download_plan();
    let mut errors = 0;

    for category in categories {
        let summary = manager.sync_category(category, &plan).await;
        errors += summary.errors_encountered;

        match serde_json::to_string(&summary) {
            Ok(json) => tracing::info!(category = %category, "Sync summary: {}", json),
            Err(e) => tracing::warn!("Failed to encode sync summary: {}", e),
        }
    }

    errors
}

async fn run_daemon(config: &AppConfig) -> anyhow::Result<()> {
    let categories = config.categories()?;
    let manager = build_manager(config)?;
    let mut ticker = tokio::time::interval(config.sync_interval());

    tracing::info!(
        "Daemon started: {} categories every {} hours",
        categories.len(),
        config.download.interval_hours
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let errors = sync_all(&manager, config, &categories).await;
                if errors > 0 {
                    tracing::warn!("Sync cycle finished with {} errors", errors);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                return Ok(());
            }
        }
    }
}
