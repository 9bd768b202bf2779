use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use cpick_catalog::{DirectoryCache, HttpCatalog};
use cpick_engine::{
    roll_from_directory, sync_from_directory, PickError, PickOutcome, SelectionEngine,
};
use cpick_storage::MovieStore;
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod config;
mod prompt;
mod report;

use config::{load_config, Command, Config, GlobalArgs};
use prompt::TerminalPrompt;
use report::Report;

#[derive(Parser, Debug)]
#[command(name = "cpick")]
#[command(about = "Pick something unwatched from the Criterion Channel", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Option<Command>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli.global);
    init_logging(&config);

    let report = Report::new(config.color && io::stdout().is_terminal());
    match cli.command.unwrap_or(Command::Pick) {
        Command::Pick => pick(&config, report),
        Command::History { json, limit } => history(&config, report, json, limit),
        Command::Watch => resolve_current(&config, report, true),
        Command::Unselect => resolve_current(&config, report, false),
        Command::Sync { refresh } => sync(&config, refresh),
        Command::List { json } => list(&config, report, json),
        Command::Roll => roll(&config, report),
    }
}

fn init_logging(config: &Config) {
    let level = if config.debug {
        "debug".to_string()
    } else if let Ok(level) = std::env::var("CPICK_LOG_LEVEL") {
        level
    } else {
        "warn".to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("logging already initialized");
    }
}

fn open_store(config: &Config) -> Result<MovieStore> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
    let path = config.db_path();
    tracing::debug!(path = %path.display(), "opening movie store");
    MovieStore::open(&path).with_context(|| format!("Failed to open {}", path.display()))
}

fn directory_cache(config: &Config) -> DirectoryCache {
    DirectoryCache::new(config.cache_path(), config.cache_max_age)
}

fn pick(config: &Config, report: Report) -> Result<ExitCode> {
    let store = open_store(config)?;
    let catalog = HttpCatalog::new(config.catalog.clone());
    sync_from_directory(&store, &directory_cache(config), &catalog, Utc::now())
        .context("Failed to sync the film directory")?;

    let stdin = io::stdin();
    let mut prompt = TerminalPrompt::new(stdin.lock(), io::stdout(), report);
    let mut engine = SelectionEngine::new(&store, &catalog);
    match engine.select_movie_to_watch(&mut prompt) {
        Ok(PickOutcome::Picked { movie, resolved }) => {
            if let Some(resolved) = resolved {
                println!(
                    "{} -> {}",
                    resolved.movie.display_title(),
                    resolved.choice
                );
            }
            println!("{}", report.render(&movie));
            Ok(ExitCode::SUCCESS)
        }
        Ok(PickOutcome::Aborted { leftover }) => {
            println!("Keeping {} selected.", leftover.display_title());
            Ok(ExitCode::SUCCESS)
        }
        Err(PickError::EmptyPool) => {
            println!("Everything has been watched.");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Err(err).context("Failed to pick a movie"),
    }
}

fn resolve_current(config: &Config, report: Report, watched: bool) -> Result<ExitCode> {
    let store = open_store(config)?;
    let catalog = HttpCatalog::new(config.catalog.clone());
    let engine = SelectionEngine::new(&store, &catalog);
    let result = if watched {
        engine.mark_selected_watched()
    } else {
        engine.unselect_current()
    };
    match result {
        Ok(movie) => {
            let verb = if watched { "Watched" } else { "Unselected" };
            println!("{verb}: {}", report.render(&movie));
            Ok(ExitCode::SUCCESS)
        }
        Err(PickError::NothingSelected) => {
            println!("Nothing is selected.");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err).context("Failed to update the selection"),
    }
}

fn history(config: &Config, report: Report, json: bool, limit: Option<usize>) -> Result<ExitCode> {
    let store = open_store(config)?;
    let mut movies = store.history().context("Failed to load watch history")?;
    if let Some(limit) = limit {
        movies.truncate(limit);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&movies)?);
    } else {
        println!("{}", report.render_history(&movies));
    }
    Ok(ExitCode::SUCCESS)
}

fn sync(config: &Config, refresh: bool) -> Result<ExitCode> {
    let store = open_store(config)?;
    let catalog = HttpCatalog::new(config.catalog.clone());
    let cache = directory_cache(config);
    if refresh {
        cache
            .invalidate()
            .context("Failed to drop the cached directory")?;
    }
    let summary = sync_from_directory(&store, &cache, &catalog, Utc::now())
        .context("Failed to sync the film directory")?;
    println!(
        "{} films in directory, {} new",
        summary.discovered, summary.inserted
    );
    Ok(ExitCode::SUCCESS)
}

fn list(config: &Config, report: Report, json: bool) -> Result<ExitCode> {
    let store = open_store(config)?;
    let movies = store.all().context("Failed to load movies")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&movies)?);
    } else if movies.is_empty() {
        println!("No movies tracked yet; run `cpick sync`.");
    } else {
        println!("{}", report.render_listing(&movies));
    }
    Ok(ExitCode::SUCCESS)
}

fn roll(config: &Config, report: Report) -> Result<ExitCode> {
    let catalog = HttpCatalog::new(config.catalog.clone());
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
    let (tag, detail) =
        roll_from_directory(&directory_cache(config), &catalog, &mut rand::thread_rng())
            .context("Failed to roll a film")?;
    tracing::debug!(tag = %tag, "rolled");
    println!("{}", report.render_detail(&detail));
    Ok(ExitCode::SUCCESS)
}
