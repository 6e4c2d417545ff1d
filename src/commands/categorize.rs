//! Categorize command - re-run the categorizer over stored entries

use crate::categorize::Categorizer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Entries read per page
const CATEGORIZE_PAGE_SIZE: i64 = 500;

/// Categorize statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorizeStats {
    pub taxonomy_version: u32,
    pub processed: usize,
    /// Entries that ended up with at least one category
    pub categorized: usize,
    /// Entries whose stored categories changed
    pub updated: u64,
}

/// Recompute categories for every stored entry, or one collection's.
///
/// Only rows whose category list changes are written.
pub async fn cmd_categorize(
    config: &Config,
    db: &MetaDb,
    collection_key: Option<&str>,
) -> Result<CategorizeStats> {
    let collection_id = match collection_key {
        Some(key) => Some(
            db.get_collection(key)
                .await?
                .ok_or_else(|| Error::CollectionNotFound(key.to_string()))?
                .id,
        ),
        None => None,
    };

    let categorizer = Categorizer::from_config(&config.categorize)?;
    recategorize(db, &categorizer, collection_id).await
}

/// Page through entries by id and store changed category lists
pub async fn recategorize(
    db: &MetaDb,
    categorizer: &Categorizer,
    collection_id: Option<i64>,
) -> Result<CategorizeStats> {
    info!(
        taxonomy_version = categorizer.taxonomy_version(),
        collection_id, "Recategorizing entries"
    );

    let mut stats = CategorizeStats {
        taxonomy_version: categorizer.taxonomy_version(),
        ..CategorizeStats::default()
    };
    let mut after_id = 0;

    loop {
        let rows = db
            .entries_for_categorization(collection_id, after_id, CATEGORIZE_PAGE_SIZE)
            .await?;
        let Some(last) = rows.last() else {
            break;
        };
        after_id = last.id;

        let mut updates = Vec::new();
        for row in rows {
            let text = row.secondary_text.as_deref().unwrap_or_default();
            let categories = categorizer.categorize(text, &row.book_name);
            let current: Vec<String> = serde_json::from_str(&row.categories_json).unwrap_or_default();

            stats.processed += 1;
            if !categories.is_empty() {
                stats.categorized += 1;
            }
            if categories != current {
                updates.push((row.id, categories));
            }
        }

        if !updates.is_empty() {
            stats.updated += db.update_categories(&updates).await?;
        }
        debug!(after_id, processed = stats.processed, "Categorized page");
    }

    info!(
        processed = stats.processed,
        categorized = stats.categorized,
        updated = stats.updated,
        "Recategorization complete"
    );
    Ok(stats)
}

/// Print categorize statistics
pub fn print_categorize_stats(stats: &CategorizeStats) {
    println!("\n✓ Categorization complete (taxonomy v{})", stats.taxonomy_version);
    println!("  Entries processed: {}", stats.processed);
    println!("  With categories: {}", stats.categorized);
    println!("  Updated: {}", stats.updated);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategorizeConfig;
    use crate::meta::tests::{collection_config, sample_entry, setup_test_db};
    use crate::meta::BatchWriter;

    #[tokio::test]
    async fn test_recategorize_updates_only_changed_rows() {
        let (db, _tmp) = setup_test_db().await;
        let collection = db.upsert_collection(&collection_config("bukhari", 10)).await.unwrap();
        let entries: Vec<_> = [(1, "Seeking knowledge is a duty."), (2, "zzz")]
            .into_iter()
            .map(|(number, text)| {
                let mut entry = sample_entry(collection.id, number, text);
                entry.book_name = "Book 1".to_string();
                entry
            })
            .collect();
        let mut writer = BatchWriter::new(db.clone(), 10, 2);
        writer.write(entries).await.unwrap();

        let categorizer = Categorizer::from_config(&CategorizeConfig::default()).unwrap();
        let first = recategorize(&db, &categorizer, None).await.unwrap();
        assert_eq!(first.processed, 2);
        assert_eq!(first.categorized, 1);
        assert_eq!(first.updated, 1);

        let stored: String =
            sqlx::query_scalar("SELECT categories_json FROM entries WHERE entry_number = 1")
                .fetch_one(db.pool())
                .await
                .unwrap();
        let stored: Vec<String> = serde_json::from_str(&stored).unwrap();
        assert!(stored.contains(&"knowledge".to_string()));

        let second = recategorize(&db, &categorizer, None).await.unwrap();
        assert_eq!(second.processed, 2);
        assert_eq!(second.updated, 0);
    }

    #[tokio::test]
    async fn test_unknown_collection_is_an_error() {
        let (db, _tmp) = setup_test_db().await;
        let err = cmd_categorize(&Config::default(), &db, Some("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(_)));
    }
}
