//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::{Collection, MetaDb};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// What `init` created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitReport {
    pub base_dir: String,
    pub config_path: String,
    pub db_path: String,
    pub collections: Vec<String>,
}

/// Initialize isnad configuration and database
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<InitReport> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::AlreadyInitialized(
            config.paths.base_dir.display().to_string(),
        ));
    }

    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.validate()?;
    config.save()?;

    let db = MetaDb::connect(&config).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    let seeded = seed_collections(&config, &db).await?;

    Ok(InitReport {
        base_dir: config.paths.base_dir.display().to_string(),
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        collections: seeded.into_iter().map(|c| c.collection_key).collect(),
    })
}

/// Register every configured collection, refreshing expected counts of known ones
pub async fn seed_collections(config: &Config, db: &MetaDb) -> Result<Vec<Collection>> {
    let mut seeded = Vec::with_capacity(config.collections.len());
    for collection in &config.collections {
        seeded.push(db.upsert_collection(collection).await?);
    }
    info!("Seeded {} collections", seeded.len());
    Ok(seeded)
}

/// Print init summary to console
pub fn print_init_report(report: &InitReport) {
    println!("✓ Initialized isnad at {}", report.base_dir);
    println!("\nConfiguration: {}", report.config_path);
    println!("Database: {}", report.db_path);
    println!("Collections: {}", report.collections.join(", "));
    println!("\nNext steps:");
    println!("  export SUNNAH_API_KEY=...              # Upstream API key");
    println!("  isnad import --collection bukhari      # Import one collection");
    println!("  isnad search \"seeking knowledge\"       # Search the corpus");
}
