//! Ranked full-text search over stored entries
//!
//! Arabic and English queries run against their own FTS5 index and are ranked
//! with bm25. `Any` has no shared index, so it falls back to substring
//! matching across every text column. Results are paginated and ordered
//! deterministically: rank first, then entry number, collection and id.

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::normalize::{fold_arabic, Grade};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Rows scanned when collecting suggestion words
const SUGGESTION_SCAN_LIMIT: i64 = 500;

/// Shortest prefix that produces suggestions
const MIN_SUGGESTION_PREFIX: usize = 2;

/// Which text a query is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchLanguage {
    /// Primary (Arabic) body
    Arabic,
    /// Secondary (English) body, narrator and reference
    #[default]
    English,
    /// Every text column, unranked
    Any,
}

impl SearchLanguage {
    fn fts_table(&self) -> Option<&'static str> {
        match self {
            SearchLanguage::Arabic => Some("entry_search_ar"),
            SearchLanguage::English => Some("entry_search_en"),
            SearchLanguage::Any => None,
        }
    }
}

impl fmt::Display for SearchLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchLanguage::Arabic => write!(f, "ar"),
            SearchLanguage::English => write!(f, "en"),
            SearchLanguage::Any => write!(f, "any"),
        }
    }
}

impl FromStr for SearchLanguage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ar" | "arabic" => Ok(SearchLanguage::Arabic),
            "en" | "english" => Ok(SearchLanguage::English),
            "any" | "all" => Ok(SearchLanguage::Any),
            _ => Err(Error::Search(format!("Unknown search language: {}", s))),
        }
    }
}

/// A search query with filters and paging
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Free text; empty lists everything matching the filters
    pub query: String,
    pub language: SearchLanguage,
    pub collection: Option<String>,
    pub book: Option<u32>,
    pub grade: Option<Grade>,
    pub category: Option<String>,
    /// 1-based page number
    pub page: u32,
    /// Page size; 0 means the configured default
    pub per_page: u32,
}

/// One matching entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub collection: String,
    pub book_number: i64,
    pub book_name: String,
    pub entry_number: i64,
    pub primary_text: String,
    pub secondary_text: Option<String>,
    pub tertiary_text: Option<String>,
    pub narrator_chain: Option<String>,
    pub grade: Grade,
    pub grade_raw: Option<String>,
    pub reference_label: String,
    pub categories: Vec<String>,
    /// bm25 score, lower is better; absent for unranked queries
    pub rank: Option<f64>,
}

/// A page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<SearchHit>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u32,
}

impl SearchPage {
    fn empty(page: u32, per_page: u32) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page,
            per_page,
            pages: 0,
        }
    }
}

#[derive(FromRow)]
struct HitRow {
    id: i64,
    collection_key: String,
    book_number: i64,
    book_name: String,
    entry_number: i64,
    primary_text: String,
    secondary_text: Option<String>,
    tertiary_text: Option<String>,
    narrator_chain: Option<String>,
    grade: String,
    grade_raw: Option<String>,
    reference_label: String,
    categories_json: String,
    rank: Option<f64>,
}

impl From<HitRow> for SearchHit {
    fn from(row: HitRow) -> Self {
        Self {
            id: row.id,
            collection: row.collection_key,
            book_number: row.book_number,
            book_name: row.book_name,
            entry_number: row.entry_number,
            primary_text: row.primary_text,
            secondary_text: row.secondary_text,
            tertiary_text: row.tertiary_text,
            narrator_chain: row.narrator_chain,
            grade: row.grade.parse().unwrap_or(Grade::Unknown),
            grade_raw: row.grade_raw,
            reference_label: row.reference_label,
            categories: serde_json::from_str(&row.categories_json).unwrap_or_default(),
            rank: row.rank,
        }
    }
}

/// How the text part of a request is matched
enum TextMatch {
    All,
    Fts { table: &'static str, expression: String },
    Substring(String),
}

/// Search service over the corpus database
pub struct SearchService {
    db: MetaDb,
    default_per_page: u32,
    max_per_page: u32,
}

impl SearchService {
    pub fn new(db: MetaDb, config: &SearchConfig) -> Self {
        Self {
            db,
            default_per_page: config.default_per_page.max(1),
            max_per_page: config.max_per_page.max(1),
        }
    }

    /// Run a search and return one page of results
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let page = request.page.max(1);
        let per_page = match request.per_page {
            0 => self.default_per_page,
            n => n,
        }
        .clamp(1, self.max_per_page);

        // Stored Arabic is indexed without vowel marks, so the query must match
        let raw_query = request.query.trim();
        let folded = fold_arabic(raw_query);
        let query = folded.trim();
        if query.is_empty() && !raw_query.is_empty() {
            return Ok(SearchPage::empty(page, per_page));
        }
        let text = if query.is_empty() {
            TextMatch::All
        } else {
            match request.language.fts_table() {
                Some(table) => match fts_expression(query) {
                    Some(expression) => TextMatch::Fts { table, expression },
                    // Only punctuation: nothing can match
                    None => return Ok(SearchPage::empty(page, per_page)),
                },
                None => TextMatch::Substring(like_pattern(query)),
            }
        };

        debug!(
            query,
            language = %request.language,
            page,
            per_page,
            "Searching"
        );

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        push_from_where(&mut count, &text, request);
        let total: i64 = count.build_query_scalar().fetch_one(self.db.pool()).await?;

        let pages = if total == 0 {
            0
        } else {
            u32::try_from((total + per_page as i64 - 1) / per_page as i64).unwrap_or(u32::MAX)
        };
        if total == 0 || page > pages {
            return Ok(SearchPage {
                total,
                pages,
                ..SearchPage::empty(page, per_page)
            });
        }

        let mut select = QueryBuilder::<Sqlite>::new(
            r#"SELECT e.id, c.collection_key, b.book_number, b.name AS book_name, e.entry_number,
                   e.primary_text, e.secondary_text, e.tertiary_text, e.narrator_chain,
                   e.grade, e.grade_raw, e.reference_label, e.categories_json, "#,
        );
        match &text {
            TextMatch::Fts { table, .. } => select.push(format!("bm25({}) AS rank", table)),
            _ => select.push("NULL AS rank"),
        };
        push_from_where(&mut select, &text, request);
        match &text {
            TextMatch::Fts { table, .. } => select.push(format!(
                " ORDER BY bm25({}), e.entry_number, e.collection_id, e.id",
                table
            )),
            _ => select.push(" ORDER BY e.collection_id, e.entry_number, e.id"),
        };
        select.push(" LIMIT ");
        select.push_bind(per_page as i64);
        select.push(" OFFSET ");
        select.push_bind((page as i64 - 1) * per_page as i64);

        let rows: Vec<HitRow> = select.build_query_as().fetch_all(self.db.pool()).await?;

        Ok(SearchPage {
            items: rows.into_iter().map(SearchHit::from).collect(),
            total,
            page,
            per_page,
            pages,
        })
    }

    /// Words from stored text that start with `prefix`, most frequent first
    pub async fn suggest(&self, prefix: &str, language: SearchLanguage, limit: usize) -> Result<Vec<String>> {
        let prefix = fold_arabic(prefix.trim()).to_lowercase();
        if prefix.chars().count() < MIN_SUGGESTION_PREFIX || limit == 0 {
            return Ok(Vec::new());
        }

        let column = match language {
            SearchLanguage::Arabic => "primary_search",
            SearchLanguage::English | SearchLanguage::Any => "secondary_text",
        };
        let sql = format!(
            "SELECT {col} FROM entries WHERE lower({col}) LIKE ? ESCAPE '\\' LIMIT ?",
            col = column
        );
        let texts: Vec<Option<String>> = sqlx::query_scalar(&sql)
            .bind(like_pattern(&prefix))
            .bind(SUGGESTION_SCAN_LIMIT)
            .fetch_all(self.db.pool())
            .await?;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for text in texts.iter().flatten() {
            for word in words(text) {
                let word = word.to_lowercase();
                if word.starts_with(&prefix) && word.chars().count() > prefix.chars().count() {
                    *counts.entry(word).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked.into_iter().take(limit).map(|(word, _)| word).collect())
    }
}

fn push_from_where(builder: &mut QueryBuilder<'_, Sqlite>, text: &TextMatch, request: &SearchRequest) {
    builder.push(
        r#" FROM entries e
            JOIN collections c ON c.id = e.collection_id
            JOIN books b ON b.id = e.book_id"#,
    );
    if let TextMatch::Fts { table, .. } = text {
        builder.push(format!(" JOIN {table} ON {table}.rowid = e.id", table = table));
    }
    builder.push(" WHERE 1 = 1");

    match text {
        TextMatch::All => {}
        TextMatch::Fts { table, expression } => {
            builder.push(format!(" AND {} MATCH ", table));
            builder.push_bind(expression.clone());
        }
        TextMatch::Substring(pattern) => {
            builder.push(" AND (");
            for (i, column) in [
                "e.primary_search",
                "e.secondary_text",
                "e.tertiary_text",
                "e.narrator_chain",
                "e.reference_label",
            ]
            .iter()
            .enumerate()
            {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder.push(format!("{} LIKE ", column));
                builder.push_bind(pattern.clone());
                builder.push(" ESCAPE '\\'");
            }
            builder.push(")");
        }
    }

    if let Some(collection) = &request.collection {
        builder.push(" AND c.collection_key = ");
        builder.push_bind(collection.clone());
    }
    if let Some(book) = request.book {
        builder.push(" AND b.book_number = ");
        builder.push_bind(book as i64);
    }
    if let Some(grade) = request.grade {
        builder.push(" AND e.grade = ");
        builder.push_bind(grade.as_str());
    }
    if let Some(category) = &request.category {
        builder.push(" AND EXISTS (SELECT 1 FROM json_each(e.categories_json) WHERE json_each.value = ");
        builder.push_bind(category.clone());
        builder.push(")");
    }
}

/// Quote every word so user input cannot use FTS5 query syntax.
///
/// Words are ANDed. Returns `None` when the query has no words.
fn fts_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = words(query).map(|w| format!("\"{}\"", w)).collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
}

/// `%query%` with LIKE wildcards escaped
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::tests::{collection_config, sample_entry, setup_test_db};
    use crate::meta::BatchWriter;
    use crate::normalize::CanonicalEntry;
    use tempfile::TempDir;

    async fn seeded(entries: impl FnOnce(i64, i64) -> Vec<CanonicalEntry>) -> (SearchService, TempDir) {
        let (db, tmp) = setup_test_db().await;
        let first = db.upsert_collection(&collection_config("bukhari", 100)).await.unwrap();
        let second = db.upsert_collection(&collection_config("muslim", 100)).await.unwrap();
        let mut writer = BatchWriter::new(db.clone(), 50, 5);
        writer.write(entries(first.id, second.id)).await.unwrap();
        (SearchService::new(db, &SearchConfig::default()), tmp)
    }

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            page: 1,
            per_page: 5,
            ..SearchRequest::default()
        }
    }

    #[tokio::test]
    async fn test_pagination_covers_all_matches() {
        let (service, _tmp) = seeded(|id, _| {
            (1..=13)
                .map(|n| sample_entry(id, n, &format!("Narrated about prayer number {}", n)))
                .collect()
        })
        .await;

        let mut seen = Vec::new();
        for page in 1..=3 {
            let result = service
                .search(&SearchRequest {
                    page,
                    ..request("prayer")
                })
                .await
                .unwrap();
            assert_eq!(result.total, 13);
            assert_eq!(result.pages, 3);
            seen.extend(result.items.into_iter().map(|h| h.entry_number));
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=13).collect::<Vec<i64>>());

        let beyond = service
            .search(&SearchRequest {
                page: 4,
                ..request("prayer")
            })
            .await
            .unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 13);
    }

    #[tokio::test]
    async fn test_ranking_is_stable_and_relevant() {
        let (service, _tmp) = seeded(|id, _| {
            vec![
                sample_entry(id, 1, "Charity given in secret"),
                sample_entry(id, 2, "Charity charity charity extinguishes sin"),
                sample_entry(id, 3, "Fasting in Ramadan"),
                sample_entry(id, 4, "Ablution before prayer"),
                sample_entry(id, 5, "Kindness to parents"),
                sample_entry(id, 6, "The virtue of patience"),
            ]
        })
        .await;

        let first = service.search(&request("charity")).await.unwrap();
        let second = service.search(&request("charity")).await.unwrap();

        let order: Vec<i64> = first.items.iter().map(|h| h.entry_number).collect();
        assert_eq!(order, second.items.iter().map(|h| h.entry_number).collect::<Vec<_>>());
        assert_eq!(order, vec![2, 1]);
        assert!(first.items[0].rank.is_some());
    }

    #[tokio::test]
    async fn test_english_search_stems_words() {
        let (service, _tmp) = seeded(|id, _| vec![sample_entry(id, 1, "He was praying at night")]).await;
        let result = service.search(&request("prayed")).await.unwrap();
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn test_filters_narrow_results() {
        let (service, _tmp) = seeded(|first, second| {
            let mut weak = sample_entry(first, 2, "knowledge is light");
            weak.grade = Grade::Daif;
            weak.categories = vec!["knowledge".to_string()];
            let mut other_book = sample_entry(first, 3, "knowledge and deeds");
            other_book.book_number = 2;
            other_book.book_name = "Deeds".to_string();
            vec![
                sample_entry(first, 1, "knowledge of the unseen"),
                weak,
                other_book,
                sample_entry(second, 1, "knowledge elsewhere"),
            ]
        })
        .await;

        let by_collection = service
            .search(&SearchRequest {
                collection: Some("muslim".to_string()),
                ..request("knowledge")
            })
            .await
            .unwrap();
        assert_eq!(by_collection.total, 1);
        assert_eq!(by_collection.items[0].collection, "muslim");

        let by_grade = service
            .search(&SearchRequest {
                grade: Some(Grade::Daif),
                ..request("knowledge")
            })
            .await
            .unwrap();
        assert_eq!(by_grade.total, 1);
        assert_eq!(by_grade.items[0].grade, Grade::Daif);

        let by_category = service
            .search(&SearchRequest {
                category: Some("knowledge".to_string()),
                ..request("")
            })
            .await
            .unwrap();
        assert_eq!(by_category.total, 1);
        assert_eq!(by_category.items[0].categories, vec!["knowledge"]);

        let by_book = service
            .search(&SearchRequest {
                book: Some(2),
                ..request("knowledge")
            })
            .await
            .unwrap();
        assert_eq!(by_book.total, 1);
        assert_eq!(by_book.items[0].book_name, "Deeds");
    }

    #[tokio::test]
    async fn test_empty_query_orders_by_collection_then_number() {
        let (service, _tmp) = seeded(|first, second| {
            vec![
                sample_entry(second, 1, "b"),
                sample_entry(first, 2, "a"),
                sample_entry(first, 1, "c"),
            ]
        })
        .await;

        let result = service.search(&request("")).await.unwrap();
        let order: Vec<(String, i64)> = result
            .items
            .iter()
            .map(|h| (h.collection.clone(), h.entry_number))
            .collect();
        assert_eq!(
            order,
            vec![
                ("bukhari".to_string(), 1),
                ("bukhari".to_string(), 2),
                ("muslim".to_string(), 1)
            ]
        );
        assert!(result.items[0].rank.is_none());
    }

    #[tokio::test]
    async fn test_arabic_and_any_languages() {
        let (service, _tmp) = seeded(|id, _| {
            let mut entry = sample_entry(id, 1, "english text");
            entry.primary_text = "إنما الأعمال بالنيات".to_string();
            vec![entry]
        })
        .await;

        let arabic = service
            .search(&SearchRequest {
                language: SearchLanguage::Arabic,
                ..request("الأعمال")
            })
            .await
            .unwrap();
        assert_eq!(arabic.total, 1);

        let any = service
            .search(&SearchRequest {
                language: SearchLanguage::Any,
                ..request("NGLISH")
            })
            .await
            .unwrap();
        assert_eq!(any.total, 1);
    }

    #[tokio::test]
    async fn test_bare_arabic_query_matches_vowelled_text() {
        let (service, _tmp) = seeded(|id, _| {
            let mut vowelled = sample_entry(id, 1, "english text");
            vowelled.primary_text = "حَدَّثَنَا الْحُمَيْدِيُّ عَبْدُ اللَّهِ بْنُ الزُّبَيْرِ".to_string();
            let mut other = sample_entry(id, 2, "other text");
            other.primary_text = "إنما الأعمال بالنيات".to_string();
            vec![vowelled, other]
        })
        .await;

        for query in ["حدثنا", "الحميدي", "حَدَّثَنَا", "حدثنا الزبير"] {
            let result = service
                .search(&SearchRequest {
                    language: SearchLanguage::Arabic,
                    ..request(query)
                })
                .await
                .unwrap();
            assert_eq!(result.total, 1, "query {}", query);
            assert_eq!(result.items[0].entry_number, 1);
            // The stored text keeps its marks
            assert!(result.items[0].primary_text.contains('\u{064E}'));
        }

        let any = service
            .search(&SearchRequest {
                language: SearchLanguage::Any,
                ..request("الحميدي")
            })
            .await
            .unwrap();
        assert_eq!(any.total, 1);

        let suggestions = service.suggest("الح", SearchLanguage::Arabic, 5).await.unwrap();
        assert_eq!(suggestions, vec!["الحميدي"]);
    }

    #[tokio::test]
    async fn test_punctuation_only_query_matches_nothing() {
        let (service, _tmp) = seeded(|id, _| vec![sample_entry(id, 1, "text")]).await;
        let result = service.search(&request("\"*:()")).await.unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.pages, 0);
    }

    #[tokio::test]
    async fn test_page_size_is_clamped() {
        let (service, _tmp) = seeded(|id, _| vec![sample_entry(id, 1, "text")]).await;
        let result = service
            .search(&SearchRequest {
                per_page: 10_000,
                page: 0,
                ..request("")
            })
            .await
            .unwrap();
        assert_eq!(result.per_page, 100);
        assert_eq!(result.page, 1);
    }

    #[tokio::test]
    async fn test_suggestions() {
        let (service, _tmp) = seeded(|id, _| {
            vec![
                sample_entry(id, 1, "Prayer at dawn, prayer at dusk"),
                sample_entry(id, 2, "The prayers of the traveler"),
                sample_entry(id, 3, "He prayed"),
            ]
        })
        .await;

        let suggestions = service.suggest("pra", SearchLanguage::English, 10).await.unwrap();
        assert_eq!(suggestions, vec!["prayer", "prayed", "prayers"]);

        assert!(service.suggest("p", SearchLanguage::English, 10).await.unwrap().is_empty());
    }

    #[test]
    fn test_fts_expression_quotes_words() {
        assert_eq!(fts_expression("seeking  knowledge!").as_deref(), Some("\"seeking\" \"knowledge\""));
        assert_eq!(fts_expression("NEAR(a b)").as_deref(), Some("\"NEAR\" \"a\" \"b\""));
        assert_eq!(fts_expression("\"*"), None);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("AR".parse::<SearchLanguage>().unwrap(), SearchLanguage::Arabic);
        assert_eq!("any".parse::<SearchLanguage>().unwrap(), SearchLanguage::Any);
        assert!("de".parse::<SearchLanguage>().is_err());
    }
}
