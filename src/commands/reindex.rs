//! Reindex command - rebuild search indexes and stored counts

use crate::error::Result;
use crate::meta::MetaDb;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Reindex statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReindexStats {
    pub collections: usize,
    pub entries: i64,
}

/// Rebuild both full-text indexes and recompute book and collection counts
pub async fn cmd_reindex(db: &MetaDb) -> Result<ReindexStats> {
    info!("Starting reindex operation");

    let mut stats = ReindexStats::default();
    for collection in db.list_collections().await? {
        stats.entries += db.refresh_counts(collection.id).await?;
        stats.collections += 1;
    }
    db.rebuild_search_indexes().await?;

    info!(
        collections = stats.collections,
        entries = stats.entries,
        "Reindex complete"
    );
    Ok(stats)
}

/// Print reindex statistics
pub fn print_reindex_stats(stats: &ReindexStats) {
    println!("\n✓ Reindex complete");
    println!("  Collections: {}", stats.collections);
    println!("  Entries indexed: {}", stats.entries);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::tests::{collection_config, sample_entry, setup_test_db};
    use crate::meta::BatchWriter;
    use crate::search::{SearchRequest, SearchService};
    use crate::config::SearchConfig;

    #[tokio::test]
    async fn test_reindex_keeps_search_working() {
        let (db, _tmp) = setup_test_db().await;
        let collection = db.upsert_collection(&collection_config("bukhari", 10)).await.unwrap();
        let mut writer = BatchWriter::new(db.clone(), 10, 2);
        writer
            .write(vec![
                sample_entry(collection.id, 1, "The reward of deeds depends on intentions"),
                sample_entry(collection.id, 2, "Faith consists of more than sixty branches"),
            ])
            .await
            .unwrap();

        let stats = cmd_reindex(&db).await.unwrap();
        assert_eq!(stats.collections, 1);
        assert_eq!(stats.entries, 2);

        let service = SearchService::new(db.clone(), &SearchConfig::default());
        let page = service
            .search(&SearchRequest {
                query: "intentions".to_string(),
                ..SearchRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].entry_number, 1);
    }
}
