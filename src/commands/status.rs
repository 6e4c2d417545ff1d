//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::meta::{CollectionStatus, GradeCount, MetaDb};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub api_base_url: String,
    pub api_key_env: String,
    pub api_key_present: bool,
    pub collections: Vec<CollectionStatus>,
    pub total_entries: i64,
    pub grades: Vec<GradeCount>,
}

/// Get system status
pub async fn cmd_status(config: &Config, db: &MetaDb) -> Result<StatusInfo> {
    info!("Getting status");

    let collections = db.collection_statuses().await?;
    let total_entries = db.count_entries(None).await?;
    let grades = db.grade_distribution(None).await?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        api_base_url: config.api.base_url.clone(),
        api_key_env: config.api.api_key_env.clone(),
        api_key_present: config.api.api_key().is_some(),
        collections,
        total_entries,
        grades,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 isnad Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nUpstream API:");
    println!("  URL: {}", status.api_base_url);
    let key_status = if status.api_key_present {
        "✓ Set".to_string()
    } else {
        format!("✗ Missing (export {})", status.api_key_env)
    };
    println!("  API key: {}", key_status);

    println!("\nCollections:");
    if status.collections.is_empty() {
        println!("  None registered. Run 'isnad import' to start.");
    }
    for collection in &status.collections {
        println!(
            "  • {} [{}]: {}/{} entries ({:.1}%), {}/{} books",
            collection.display_name,
            collection.collection_key,
            collection.imported_entries,
            collection.total_expected_entries,
            collection.percent_complete(),
            collection.imported_books,
            collection.total_expected_books,
        );
        if let Some(run_status) = &collection.last_run_status {
            println!(
                "      Last run: {} {}",
                run_status,
                collection.last_run_at.as_deref().unwrap_or("(in progress)")
            );
        }
    }

    println!("\nEntries: {}", status.total_entries);
    if !status.grades.is_empty() {
        println!("Grades:");
        for grade in &status.grades {
            println!("  {}: {}", grade.grade, grade.count);
        }
    }
}
