//! Batched, idempotent entry persistence

use super::MetaDb;
use crate::error::Result;
use crate::normalize::{fold_arabic, CanonicalEntry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// An entry that could not be persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub entry_number: u32,
    pub reason: String,
}

/// Outcome of writing a set of entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    /// Newly stored entry numbers
    pub inserted: Vec<u32>,
    /// Entry numbers already present, left untouched
    pub ignored: Vec<u32>,
    pub failed: Vec<FailedEntry>,
}

impl WriteReport {
    /// Whether some entries of the write could not be stored
    pub fn is_partial_failure(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn merge(&mut self, other: WriteReport) {
        self.inserted.extend(other.inserted);
        self.ignored.extend(other.ignored);
        self.failed.extend(other.failed);
    }
}

/// Buffers canonical entries and stores them in transactional batches.
///
/// Inserts never overwrite: an entry whose (collection, number) already
/// exists is reported as ignored. When a batch fails it is retried in
/// smaller chunks and only the chunks that still fail are reported.
pub struct BatchWriter {
    db: MetaDb,
    batch_size: usize,
    retry_batch_size: usize,
    buffer: Vec<CanonicalEntry>,
    book_ids: HashMap<(i64, u32), i64>,
}

impl BatchWriter {
    pub fn new(db: MetaDb, batch_size: usize, retry_batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            db,
            batch_size,
            retry_batch_size: retry_batch_size.clamp(1, batch_size),
            buffer: Vec::with_capacity(batch_size),
            book_ids: HashMap::new(),
        }
    }

    /// Entries waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Queue an entry, flushing when the buffer reaches the batch size
    pub async fn push(&mut self, entry: CanonicalEntry) -> Result<Option<WriteReport>> {
        self.buffer.push(entry);
        if self.buffer.len() >= self.batch_size {
            return self.flush().await.map(Some);
        }
        Ok(None)
    }

    /// Store everything buffered
    pub async fn flush(&mut self) -> Result<WriteReport> {
        if self.buffer.is_empty() {
            return Ok(WriteReport::default());
        }
        let batch = std::mem::take(&mut self.buffer);
        self.write(batch).await
    }

    /// Store `entries` directly, in batches of the configured size
    pub async fn write(&mut self, entries: Vec<CanonicalEntry>) -> Result<WriteReport> {
        let mut report = WriteReport::default();
        for batch in entries.chunks(self.batch_size) {
            report.merge(self.write_with_retry(batch).await?);
        }
        Ok(report)
    }

    async fn write_with_retry(&mut self, batch: &[CanonicalEntry]) -> Result<WriteReport> {
        match self.write_batch(batch).await {
            Ok(report) => return Ok(report),
            Err(e) if is_fatal(&e) => return Err(abandon(batch, e)),
            Err(e) => {
                warn!(
                    size = batch.len(),
                    retry_size = self.retry_batch_size,
                    error = %e,
                    "Batch write failed, retrying in smaller batches"
                );
            }
        }

        let mut report = WriteReport::default();
        for (i, chunk) in batch.chunks(self.retry_batch_size).enumerate() {
            match self.write_batch(chunk).await {
                Ok(chunk_report) => report.merge(chunk_report),
                Err(e) if is_fatal(&e) => {
                    let unwritten = &batch[i * self.retry_batch_size..];
                    return Err(abandon(unwritten, e));
                }
                Err(e) => {
                    let reason = e.to_string();
                    for entry in chunk {
                        warn!(
                            collection_id = entry.collection_id,
                            entry_number = entry.entry_number,
                            error = %reason,
                            "Entry could not be stored"
                        );
                        report.failed.push(FailedEntry {
                            entry_number: entry.entry_number,
                            reason: reason.clone(),
                        });
                    }
                }
            }
        }
        Ok(report)
    }

    /// One all-or-nothing transaction
    async fn write_batch(&mut self, batch: &[CanonicalEntry]) -> std::result::Result<WriteReport, sqlx::Error> {
        let mut tx = self.db.pool().begin().await?;
        let mut new_books = HashMap::new();
        let mut report = WriteReport::default();
        let now = Utc::now().to_rfc3339();

        for entry in batch {
            let key = (entry.collection_id, entry.book_number);
            let cached = self.book_ids.get(&key).or_else(|| new_books.get(&key)).copied();
            let book_id = match cached {
                Some(id) => id,
                None => {
                    let id = ensure_book(&mut tx, entry).await?;
                    new_books.insert(key, id);
                    id
                }
            };

            let categories = serde_json::to_string(&entry.categories)
                .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

            let affected = sqlx::query(
                r#"
                INSERT INTO entries (collection_id, book_id, entry_number, primary_text, primary_search, secondary_text,
                                     tertiary_text, narrator_chain, grade, grade_raw, reference_label,
                                     categories_json, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection_id, entry_number) DO NOTHING
                "#,
            )
            .bind(entry.collection_id)
            .bind(book_id)
            .bind(entry.entry_number as i64)
            .bind(&entry.primary_text)
            .bind(fold_arabic(&entry.primary_text))
            .bind(&entry.secondary_text)
            .bind(&entry.tertiary_text)
            .bind(&entry.narrator_chain)
            .bind(entry.grade.as_str())
            .bind(&entry.grade_raw)
            .bind(&entry.reference_label)
            .bind(categories)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if affected > 0 {
                report.inserted.push(entry.entry_number);
            } else {
                report.ignored.push(entry.entry_number);
            }
        }

        tx.commit().await?;
        // Book ids only become valid once the transaction has committed
        self.book_ids.extend(new_books);
        debug!(
            inserted = report.inserted.len(),
            ignored = report.ignored.len(),
            "Committed batch"
        );
        Ok(report)
    }
}

async fn ensure_book(
    tx: &mut Transaction<'_, Sqlite>,
    entry: &CanonicalEntry,
) -> std::result::Result<i64, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO books (collection_id, book_number, name, entry_count)
        VALUES (?, ?, ?, 0)
        ON CONFLICT(collection_id, book_number) DO NOTHING
        "#,
    )
    .bind(entry.collection_id)
    .bind(entry.book_number as i64)
    .bind(&entry.book_name)
    .execute(&mut **tx)
    .await?;

    sqlx::query_scalar("SELECT id FROM books WHERE collection_id = ? AND book_number = ?")
        .bind(entry.collection_id)
        .bind(entry.book_number as i64)
        .fetch_one(&mut **tx)
        .await
}

/// Errors that mean the store itself is unusable, as opposed to bad rows
fn is_fatal(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_)
    )
}

fn abandon(unwritten: &[CanonicalEntry], err: sqlx::Error) -> crate::error::Error {
    let numbers: Vec<u32> = unwritten.iter().map(|e| e.entry_number).collect();
    error!(
        count = numbers.len(),
        entries = ?numbers,
        error = %err,
        "Storage unavailable, batch not written"
    );
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::tests::{collection_config, sample_entry, setup_test_db};

    #[tokio::test]
    async fn test_push_flushes_at_batch_size() {
        let (db, _tmp) = setup_test_db().await;
        let collection = db.upsert_collection(&collection_config("bukhari", 10)).await.unwrap();
        let mut writer = BatchWriter::new(db.clone(), 2, 1);

        assert!(writer.push(sample_entry(collection.id, 1, "a")).await.unwrap().is_none());
        assert_eq!(writer.pending(), 1);

        let report = writer.push(sample_entry(collection.id, 2, "b")).await.unwrap().unwrap();
        assert_eq!(report.inserted, vec![1, 2]);
        assert_eq!(writer.pending(), 0);

        writer.push(sample_entry(collection.id, 3, "c")).await.unwrap();
        let report = writer.flush().await.unwrap();
        assert_eq!(report.inserted, vec![3]);
        assert_eq!(db.count_entries(Some(collection.id)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicates_are_ignored_not_overwritten() {
        let (db, _tmp) = setup_test_db().await;
        let collection = db.upsert_collection(&collection_config("muslim", 10)).await.unwrap();
        let mut writer = BatchWriter::new(db.clone(), 10, 2);

        writer.write(vec![sample_entry(collection.id, 1, "original")]).await.unwrap();
        let report = writer
            .write(vec![
                sample_entry(collection.id, 1, "replacement"),
                sample_entry(collection.id, 2, "new"),
            ])
            .await
            .unwrap();

        assert_eq!(report.inserted, vec![2]);
        assert_eq!(report.ignored, vec![1]);
        assert!(!report.is_partial_failure());

        let text: String = sqlx::query_scalar(
            "SELECT secondary_text FROM entries WHERE collection_id = ? AND entry_number = 1",
        )
        .bind(collection.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(text, "original");
    }

    #[tokio::test]
    async fn test_bad_entry_only_fails_its_chunk() {
        let (db, _tmp) = setup_test_db().await;
        let collection = db.upsert_collection(&collection_config("abudawud", 10)).await.unwrap();
        let mut writer = BatchWriter::new(db.clone(), 10, 2);

        // entry_number 0 violates the CHECK constraint
        let entries = vec![
            sample_entry(collection.id, 1, "a"),
            sample_entry(collection.id, 2, "b"),
            sample_entry(collection.id, 0, "bad"),
            sample_entry(collection.id, 4, "d"),
            sample_entry(collection.id, 5, "e"),
        ];
        let report = writer.write(entries).await.unwrap();

        assert!(report.is_partial_failure());
        assert_eq!(report.inserted, vec![1, 2, 5]);
        let failed: Vec<u32> = report.failed.iter().map(|f| f.entry_number).collect();
        assert_eq!(failed, vec![0, 4]);
        assert_eq!(db.count_entries(Some(collection.id)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_books_are_created_once() {
        let (db, _tmp) = setup_test_db().await;
        let collection = db.upsert_collection(&collection_config("ibnmajah", 10)).await.unwrap();
        let mut writer = BatchWriter::new(db.clone(), 1, 1);

        let mut other_book = sample_entry(collection.id, 3, "c");
        other_book.book_number = 2;
        other_book.book_name = "Belief".to_string();
        writer
            .write(vec![
                sample_entry(collection.id, 1, "a"),
                sample_entry(collection.id, 2, "b"),
                other_book,
            ])
            .await
            .unwrap();

        let books = db.list_books(collection.id).await.unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[1].name, "Belief");
    }
}
