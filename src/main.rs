//! isnad CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use isnad::{
    commands::{
        cmd_categorize, cmd_import, cmd_init, cmd_reindex, cmd_search, cmd_status, cmd_suggest,
        print_categorize_stats, print_import_reports, print_init_report, print_reindex_stats,
        print_search_page, print_status, print_suggestions,
    },
    config::Config,
    error::{Error, Result},
    import::ImportOptions,
    meta::MetaDb,
    normalize::Grade,
    progress::LogWriterFactory,
    search::{SearchLanguage, SearchRequest},
    source::{CorpusSource, SunnahApiSource},
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "isnad")]
#[command(version, about = "Import, categorize and search hadith collections", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize isnad configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Import (or resume importing) collections from the upstream API
    Import {
        /// Collection keys to import (defaults to all configured collections)
        #[arg(long = "collection")]
        collections: Vec<String>,

        /// Fetch at most this many pending entries per collection
        #[arg(long)]
        limit: Option<usize>,

        /// Delete stored entries of the collection before importing
        #[arg(long)]
        clear_first: bool,
    },

    /// Show import progress and corpus statistics
    Status,

    /// Search stored entries
    Search {
        /// The search query (empty lists everything matching the filters)
        query: String,

        /// Text to search: ar, en or any
        #[arg(short, long, default_value = "en")]
        language: SearchLanguage,

        /// Only this collection key
        #[arg(long)]
        collection: Option<String>,

        /// Only this book number
        #[arg(long)]
        book: Option<u32>,

        /// Only this grade (sahih, hasan, da'if, mawdu', unknown)
        #[arg(long)]
        grade: Option<Grade>,

        /// Only entries tagged with this category
        #[arg(long)]
        category: Option<String>,

        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: u32,

        /// Results per page (defaults to the configured page size)
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Suggest search words starting with a prefix
    Suggest {
        /// Word prefix, at least two characters
        prefix: String,

        /// Text to draw words from: ar or en
        #[arg(short, long, default_value = "en")]
        language: SearchLanguage,

        /// Maximum number of suggestions
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Re-run the categorizer over stored entries
    Categorize {
        /// Only this collection key
        #[arg(long)]
        collection: Option<String>,
    },

    /// Rebuild full-text indexes and stored counts
    Reindex,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.as_deref().map(base_dir_for);
        let report = cmd_init(base_dir, force).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_init_report(&report);
        }
        return Ok(());
    }

    // Handle completions command (doesn't need config/db)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "isnad", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let db = MetaDb::new(&config.paths.db_file).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Import {
            collections,
            limit,
            clear_first,
        } => {
            let source: Arc<dyn CorpusSource> = Arc::new(SunnahApiSource::new(&config.api)?);
            let options = ImportOptions { limit, clear_first };
            let cancel = install_interrupt_handler();
            let show_progress = !cli.json && std::io::stderr().is_terminal();

            let reports = cmd_import(
                &config,
                &db,
                source,
                &collections,
                &options,
                cancel,
                show_progress,
            )
            .await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                print_import_reports(&reports);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Search {
            query,
            language,
            collection,
            book,
            grade,
            category,
            page,
            per_page,
        } => {
            let request = SearchRequest {
                query,
                language,
                collection,
                book,
                grade,
                category,
                page,
                per_page: per_page.unwrap_or(0),
            };

            let results = cmd_search(&config, &db, &request).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_search_page(&results);
            }
        }

        Commands::Suggest {
            prefix,
            language,
            limit,
        } => {
            let suggestions = cmd_suggest(&config, &db, &prefix, language, limit).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&suggestions)?);
            } else {
                print_suggestions(&suggestions);
            }
        }

        Commands::Categorize { collection } => {
            let stats = cmd_categorize(&config, &db, collection.as_deref()).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_categorize_stats(&stats);
            }
        }

        Commands::Reindex => {
            let stats = cmd_reindex(&db).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_reindex_stats(&stats);
            }
        }
    }

    Ok(())
}

/// Base directory for `--config`: the parent of a .toml file, or the directory itself
fn base_dir_for(path: &std::path::Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == "toml") {
        path.parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir)
    } else {
        path.to_path_buf()
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) if p.extension().is_some_and(|e| e == "toml") => p.to_path_buf(),
        Some(dir) => dir.join("config.toml"),
        None => Config::default_config_path(),
    };

    if !config_path.exists() {
        eprintln!("Config file not found: {}", config_path.display());
        return Err(Error::NotInitialized);
    }

    Config::load(&config_path)
}

/// Cancel the returned token on Ctrl-C; in-flight entries still finish and are stored
fn install_interrupt_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight entries");
            token.cancel();
        }
    });
    cancel
}
