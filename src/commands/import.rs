//! Import command implementation

use super::init::seed_collections;
use crate::categorize::Categorizer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::import::{ImportOptions, ImportOrchestrator, ImportReport};
use crate::meta::{MetaDb, RunStatus};
use crate::normalize::Normalizer;
use crate::source::CorpusSource;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Import the given collections (all configured ones when `keys` is empty), one after another.
///
/// Unknown keys are rejected before anything is fetched. Cancellation stops
/// the current collection after its in-flight entries and skips the rest.
pub async fn cmd_import(
    config: &Config,
    db: &MetaDb,
    source: Arc<dyn CorpusSource>,
    keys: &[String],
    options: &ImportOptions,
    cancel: CancellationToken,
    show_progress: bool,
) -> Result<Vec<ImportReport>> {
    seed_collections(config, db).await?;

    let keys: Vec<String> = if keys.is_empty() {
        config.collections.iter().map(|c| c.key.clone()).collect()
    } else {
        keys.to_vec()
    };
    if let Some(unknown) = keys.iter().find(|key| config.collection(key).is_none()) {
        return Err(Error::CollectionNotFound(unknown.clone()));
    }

    let normalizer = Normalizer::new(&config.normalize);
    let categorizer = Categorizer::from_config(&config.categorize)?;
    info!(
        source = source.name(),
        collections = keys.len(),
        taxonomy_version = categorizer.taxonomy_version(),
        "Starting import"
    );

    let mut orchestrator = ImportOrchestrator::new(
        db.clone(),
        source,
        normalizer,
        categorizer,
        config.import.clone(),
    )
    .with_cancellation(cancel.clone())
    .with_progress(show_progress);

    let mut reports = Vec::with_capacity(keys.len());
    for key in &keys {
        if cancel.is_cancelled() {
            warn!(collection = %key, "Import cancelled, skipping remaining collections");
            break;
        }
        reports.push(orchestrator.run(key, options).await?);
    }

    Ok(reports)
}

/// Print import results to console
pub fn print_import_reports(reports: &[ImportReport]) {
    if reports.is_empty() {
        println!("Nothing imported.");
        return;
    }

    for report in reports {
        let marker = match report.status {
            RunStatus::Completed => "✓",
            RunStatus::Partial => "⚠",
            RunStatus::Running | RunStatus::Failed => "✗",
        };
        let stats = &report.stats;
        println!("\n{} {} ({})", marker, report.collection, report.status);
        println!("  Imported: {}", stats.imported);
        println!("  Skipped: {}", stats.skipped);
        println!("  Failed: {} ({} rejected)", stats.failed, stats.rejected);
        println!("  Missing upstream: {}", stats.missing);
        println!("  Total processed: {}", stats.total_processed);
        if report.interrupted {
            println!("  Interrupted: rerun the import to resume");
        }
        for error in stats.errors.iter().take(5) {
            println!("  - {}", error);
        }
        if stats.errors.len() > 5 {
            println!("  ... and {} more", stats.errors.len() - 5);
        }
    }
}
