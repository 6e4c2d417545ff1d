//! Corpus storage using SQLite
//!
//! This module owns everything persisted locally:
//! - Collections (seeded from configuration)
//! - Books (created lazily as entries arrive)
//! - Entries (canonical records plus their full-text indexes)
//! - Import runs (history and stats)

mod schema;
pub mod writer;

pub use schema::*;
pub use writer::{BatchWriter, FailedEntry, WriteReport};

use crate::config::{CollectionConfig, Config};
use crate::error::{Error, Result};
use crate::import::ImportStats;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Import run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished, but some entries failed or the run was cancelled
    Partial,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "partial" => Ok(RunStatus::Partial),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(Error::Config(format!("Unknown run status: {}", s))),
        }
    }
}

/// A stored collection
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub collection_key: String,
    pub display_name: String,
    pub api_name: String,
    pub total_expected_entries: i64,
    pub total_expected_books: i64,
    pub total_entries: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored book
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub collection_id: i64,
    pub book_number: i64,
    pub name: String,
    pub entry_count: i64,
}

/// An import run record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: String,
    pub collection_id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub imported: i64,
    pub skipped: i64,
    pub failed: i64,
    pub missing: i64,
    pub total_processed: i64,
    pub errors_json: Option<String>,
}

impl ImportRun {
    pub fn new(collection_id: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            collection_id,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
            status: RunStatus::Running.to_string(),
            imported: 0,
            skipped: 0,
            failed: 0,
            missing: 0,
            total_processed: 0,
            errors_json: None,
        }
    }

    pub fn get_status(&self) -> Result<RunStatus> {
        self.status.parse()
    }
}

/// Per-collection progress summary
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub collection_key: String,
    pub display_name: String,
    pub total_expected_entries: i64,
    pub total_expected_books: i64,
    pub imported_entries: i64,
    pub imported_books: i64,
    pub last_run_status: Option<String>,
    pub last_run_at: Option<String>,
}

impl CollectionStatus {
    /// Imported share of the expected entries, in percent
    pub fn percent_complete(&self) -> f64 {
        if self.total_expected_entries <= 0 {
            return 0.0;
        }
        self.imported_entries as f64 * 100.0 / self.total_expected_entries as f64
    }
}

/// Number of entries per grade bucket
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GradeCount {
    pub grade: String,
    pub count: i64,
}

/// The fields the categorizer reads from a stored entry
#[derive(Debug, Clone, FromRow)]
pub struct CategorizationRow {
    pub id: i64,
    pub book_name: String,
    pub secondary_text: Option<String>,
    pub categories_json: String,
}

/// Corpus database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the corpus database named in the configuration
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file).await
    }

    /// Open a database by path, creating the schema if needed
    pub async fn new(db_path: &Path) -> Result<Self> {
        let db = Self::open(db_path).await?;
        if !db.is_initialized().await? {
            db.init_schema().await?;
        }
        Ok(db)
    }

    async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='entries'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Collection Operations =====

    /// Insert a collection or refresh its configured metadata
    pub async fn upsert_collection(&self, config: &CollectionConfig) -> Result<Collection> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO collections (collection_key, display_name, api_name, total_expected_entries,
                                     total_expected_books, total_entries, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            ON CONFLICT(collection_key) DO UPDATE SET
                display_name = excluded.display_name,
                api_name = excluded.api_name,
                total_expected_entries = excluded.total_expected_entries,
                total_expected_books = excluded.total_expected_books,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&config.key)
        .bind(&config.display_name)
        .bind(config.api_name())
        .bind(config.total_entries as i64)
        .bind(config.total_books as i64)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_collection(&config.key)
            .await?
            .ok_or_else(|| Error::CollectionNotFound(config.key.clone()))
    }

    /// Get a collection by key
    pub async fn get_collection(&self, key: &str) -> Result<Option<Collection>> {
        let collection =
            sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE collection_key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(collection)
    }

    /// List all collections
    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        let collections = sqlx::query_as::<_, Collection>("SELECT * FROM collections ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(collections)
    }

    /// Delete every entry and book of a collection
    pub async fn clear_collection(&self, collection_id: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM entries WHERE collection_id = ?")
            .bind(collection_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM books WHERE collection_id = ?")
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE collections SET total_entries = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(collection_id, removed, "Cleared collection");
        Ok(removed)
    }

    /// Recompute book and collection entry counts from stored entries
    pub async fn refresh_counts(&self, collection_id: i64) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE books SET entry_count = (
                SELECT COUNT(*) FROM entries e WHERE e.book_id = books.id
            )
            WHERE collection_id = ?
            "#,
        )
        .bind(collection_id)
        .execute(&mut *tx)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection_id = ?")
            .bind(collection_id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE collections SET total_entries = ?, updated_at = ? WHERE id = ?")
            .bind(total)
            .bind(Utc::now().to_rfc3339())
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(collection_id, total, "Refreshed entry counts");
        Ok(total)
    }

    // ===== Book Operations =====

    /// List books of a collection
    pub async fn list_books(&self, collection_id: i64) -> Result<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE collection_id = ? ORDER BY book_number",
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    // ===== Entry Operations =====

    /// Entry numbers already stored for a collection; the import checkpoint
    pub async fn imported_entry_numbers(&self, collection_id: i64) -> Result<HashSet<u32>> {
        let numbers: Vec<i64> =
            sqlx::query_scalar("SELECT entry_number FROM entries WHERE collection_id = ?")
                .bind(collection_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(numbers
            .into_iter()
            .filter_map(|n| u32::try_from(n).ok())
            .collect())
    }

    /// Count stored entries, optionally for one collection
    pub async fn count_entries(&self, collection_id: Option<i64>) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE (? IS NULL OR collection_id = ?)")
                .bind(collection_id)
                .bind(collection_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Page through entries by id for re-categorization
    pub async fn entries_for_categorization(
        &self,
        collection_id: Option<i64>,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<CategorizationRow>> {
        let rows = sqlx::query_as::<_, CategorizationRow>(
            r#"
            SELECT e.id, b.name AS book_name, e.secondary_text, e.categories_json
            FROM entries e
            JOIN books b ON b.id = e.book_id
            WHERE e.id > ? AND (? IS NULL OR e.collection_id = ?)
            ORDER BY e.id
            LIMIT ?
            "#,
        )
        .bind(after_id)
        .bind(collection_id)
        .bind(collection_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Replace the categories of several entries in one transaction
    pub async fn update_categories(&self, updates: &[(i64, Vec<String>)]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let mut updated = 0;

        for (id, categories) in updates {
            updated += sqlx::query("UPDATE entries SET categories_json = ?, updated_at = ? WHERE id = ?")
                .bind(serde_json::to_string(categories)?)
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Rebuild both full-text indexes from the entries table
    pub async fn rebuild_search_indexes(&self) -> Result<()> {
        info!("Rebuilding full-text indexes");
        sqlx::query(
            r#"
            INSERT INTO entry_search_ar(entry_search_ar) VALUES ('rebuild');
            INSERT INTO entry_search_en(entry_search_en) VALUES ('rebuild');
            INSERT INTO entry_search_ar(entry_search_ar) VALUES ('optimize');
            INSERT INTO entry_search_en(entry_search_en) VALUES ('optimize');
            ANALYZE;
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Import Run Operations =====

    /// Start a new import run
    pub async fn start_import_run(&self, collection_id: i64) -> Result<ImportRun> {
        let run = ImportRun::new(collection_id);
        sqlx::query(
            r#"
            INSERT INTO import_runs (id, collection_id, started_at, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(run.collection_id)
        .bind(&run.started_at)
        .bind(&run.status)
        .execute(&self.pool)
        .await?;
        Ok(run)
    }

    /// Complete an import run
    pub async fn complete_import_run(
        &self,
        id: &str,
        status: RunStatus,
        stats: &ImportStats,
    ) -> Result<()> {
        let errors_json = if stats.errors.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&stats.errors)?)
        };
        sqlx::query(
            r#"
            UPDATE import_runs SET
                completed_at = ?,
                status = ?,
                imported = ?,
                skipped = ?,
                failed = ?,
                missing = ?,
                total_processed = ?,
                errors_json = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(status.to_string())
        .bind(stats.imported as i64)
        .bind(stats.skipped as i64)
        .bind(stats.failed as i64)
        .bind(stats.missing as i64)
        .bind(stats.total_processed as i64)
        .bind(errors_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get latest import run for a collection
    pub async fn get_latest_run(&self, collection_id: i64) -> Result<Option<ImportRun>> {
        let run = sqlx::query_as::<_, ImportRun>(
            "SELECT * FROM import_runs WHERE collection_id = ? ORDER BY started_at DESC, rowid DESC LIMIT 1",
        )
        .bind(collection_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    // ===== Statistics =====

    /// Progress of every collection
    pub async fn collection_statuses(&self) -> Result<Vec<CollectionStatus>> {
        let statuses = sqlx::query_as::<_, CollectionStatus>(
            r#"
            SELECT
                c.collection_key,
                c.display_name,
                c.total_expected_entries,
                c.total_expected_books,
                (SELECT COUNT(*) FROM entries e WHERE e.collection_id = c.id) AS imported_entries,
                (SELECT COUNT(*) FROM books b WHERE b.collection_id = c.id) AS imported_books,
                (SELECT r.status FROM import_runs r WHERE r.collection_id = c.id
                    ORDER BY r.started_at DESC, r.rowid DESC LIMIT 1) AS last_run_status,
                (SELECT r.completed_at FROM import_runs r WHERE r.collection_id = c.id
                    ORDER BY r.started_at DESC, r.rowid DESC LIMIT 1) AS last_run_at
            FROM collections c
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(statuses)
    }

    /// Entry counts per grade, optionally for one collection
    pub async fn grade_distribution(&self, collection_id: Option<i64>) -> Result<Vec<GradeCount>> {
        let counts = sqlx::query_as::<_, GradeCount>(
            r#"
            SELECT grade, COUNT(*) AS count
            FROM entries
            WHERE (? IS NULL OR collection_id = ?)
            GROUP BY grade
            ORDER BY count DESC, grade
            "#,
        )
        .bind(collection_id)
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }
}
