//! Default values for configuration

use super::CollectionConfig;

/// Default upstream API base URL
pub fn default_api_base_url() -> String {
    std::env::var("ISNAD_API_URL").unwrap_or_else(|_| "https://api.sunnah.com/v1".to_string())
}

/// Default environment variable name for the upstream API key
pub fn default_api_key_env() -> String {
    "SUNNAH_API_KEY".to_string()
}

/// Default user agent
pub fn default_api_user_agent() -> String {
    format!("isnad/{}", env!("CARGO_PKG_VERSION"))
}

/// Default request timeout in seconds
pub fn default_api_timeout() -> u64 {
    30
}

/// Default requests per second shared by all workers of one import
pub fn default_api_requests_per_second() -> f64 {
    10.0
}

/// Default maximum retries for transient failures
pub fn default_api_max_retries() -> u32 {
    3
}

/// Default base retry delay in milliseconds (multiplied by the attempt number)
pub fn default_api_retry_delay_ms() -> u64 {
    5000
}

/// Default number of concurrent fetch workers
pub fn default_import_workers() -> usize {
    10
}

/// Default number of entries per bulk upsert
pub fn default_import_batch_size() -> usize {
    100
}

/// Default sub-batch size when a failed batch is retried
pub fn default_import_retry_batch_size() -> usize {
    10
}

/// Use the upstream book listing to group work by book
pub fn default_import_use_book_listing() -> bool {
    true
}

/// Default language tag of the primary body
pub fn default_primary_lang() -> String {
    "ar".to_string()
}

/// Default language tag of the secondary body
pub fn default_secondary_lang() -> String {
    "en".to_string()
}

/// Default language tag of the tertiary body
pub fn default_tertiary_lang() -> String {
    "fr".to_string()
}

/// Entry numbers above this are treated as concatenation artifacts
pub fn default_number_sanity_bound() -> u64 {
    10_000
}

/// Leading digits kept when an entry number is truncated
pub fn default_number_keep_digits() -> usize {
    4
}

/// Strip HTML markup from upstream bodies
pub fn default_strip_markup() -> bool {
    true
}

/// Minimum category score to be assigned
pub fn default_categorize_min_score() -> i32 {
    2
}

/// Maximum categories per entry
pub fn default_categorize_max_categories() -> usize {
    3
}

/// Default page size for search
pub fn default_search_per_page() -> u32 {
    20
}

/// Maximum page size for search
pub fn default_search_max_per_page() -> u32 {
    100
}

/// Default number of suggestions
pub fn default_search_suggestions() -> usize {
    10
}

/// The six canonical collections
pub fn default_collections() -> Vec<CollectionConfig> {
    [
        ("bukhari", "Sahih al-Bukhari", 7563, 97),
        ("muslim", "Sahih Muslim", 7453, 56),
        ("abudawud", "Sunan Abu Dawud", 5274, 43),
        ("tirmidhi", "Jami' at-Tirmidhi", 3956, 49),
        ("nasai", "Sunan an-Nasa'i", 5758, 51),
        ("ibnmajah", "Sunan Ibn Majah", 4341, 37),
    ]
    .into_iter()
    .map(|(key, name, entries, books)| CollectionConfig {
        key: key.to_string(),
        display_name: name.to_string(),
        api_name: None,
        total_entries: entries,
        total_books: books,
    })
    .collect()
}
