//! Search and suggest commands

use crate::config::Config;
use crate::error::Result;
use crate::meta::MetaDb;
use crate::search::{SearchLanguage, SearchPage, SearchRequest, SearchService};
use tracing::info;

/// Characters of entry text shown per hit
const SNIPPET_CHARS: usize = 240;

/// Execute a search request
pub async fn cmd_search(config: &Config, db: &MetaDb, request: &SearchRequest) -> Result<SearchPage> {
    info!(query = %request.query, language = %request.language, "Searching");
    let service = SearchService::new(db.clone(), &config.search);
    service.search(request).await
}

/// Suggest completions for a prefix; `limit` falls back to the configured count
pub async fn cmd_suggest(
    config: &Config,
    db: &MetaDb,
    prefix: &str,
    language: SearchLanguage,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    let service = SearchService::new(db.clone(), &config.search);
    service
        .suggest(prefix, language, limit.unwrap_or(config.search.suggestions))
        .await
}

/// Print search results to console
pub fn print_search_page(page: &SearchPage) {
    if page.items.is_empty() {
        if page.total > 0 {
            println!("No results on page {} ({} matches over {} pages).", page.page, page.total, page.pages);
        } else {
            println!("No results found.");
        }
        return;
    }

    println!(
        "\n🔍 {} matches (page {}/{})\n",
        page.total, page.page, page.pages
    );

    for (i, hit) in page.items.iter().enumerate() {
        let position = (page.page as usize - 1) * page.per_page as usize + i + 1;
        println!("{}. {} [{}]", position, hit.reference_label, hit.grade);
        println!("   Book {}: {}", hit.book_number, hit.book_name);
        if let Some(narrator) = &hit.narrator_chain {
            println!("   {}", snippet(narrator, 80));
        }
        let text = hit.secondary_text.as_deref().unwrap_or(&hit.primary_text);
        println!("   {}", snippet(text, SNIPPET_CHARS));
        if !hit.categories.is_empty() {
            println!("   Categories: {}", hit.categories.join(", "));
        }
        println!();
    }
}

/// Print suggestions, one per line
pub fn print_suggestions(suggestions: &[String]) {
    if suggestions.is_empty() {
        println!("No suggestions.");
        return;
    }
    for suggestion in suggestions {
        println!("{}", suggestion);
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("  abcdef ", 3), "abc...");
        assert_eq!(snippet("بسم الله", 3), "بسم...");
    }
}
