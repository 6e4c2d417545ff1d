//! Keyword-scored topical categorization

pub mod taxonomy;

pub use taxonomy::{CategoryRule, Taxonomy};

use crate::config::CategorizeConfig;
use crate::error::{Error, Result};
use regex::Regex;

struct Keyword {
    text: String,
    whole_word: Regex,
}

struct CompiledRule {
    id: String,
    keywords: Vec<Keyword>,
    exclude: Vec<String>,
}

/// Assigns up to `max_categories` category ids to an entry.
///
/// A keyword found as a whole word scores 2, found only inside another word
/// scores 1. Each exclusion present costs 1. Scores are floored at zero and
/// only categories reaching `min_score` are kept, highest first.
pub struct Categorizer {
    rules: Vec<CompiledRule>,
    version: u32,
    min_score: i32,
    max_categories: usize,
}

impl Categorizer {
    pub fn new(taxonomy: &Taxonomy, config: &CategorizeConfig) -> Result<Self> {
        taxonomy.validate()?;

        let rules = taxonomy
            .categories
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            version: taxonomy.version,
            min_score: config.min_score,
            max_categories: config.max_categories,
        })
    }

    /// Build from configuration, loading the taxonomy file when one is set
    pub fn from_config(config: &CategorizeConfig) -> Result<Self> {
        let taxonomy = Taxonomy::load_or_default(config.taxonomy_file.as_deref())?;
        Self::new(&taxonomy, config)
    }

    pub fn taxonomy_version(&self) -> u32 {
        self.version
    }

    /// Categories for an entry's translated text and book name
    pub fn categorize(&self, text: &str, book_name: &str) -> Vec<String> {
        let haystack = format!("{}\n{}", book_name, text).to_lowercase();

        let mut scored: Vec<(&str, i32)> = self
            .rules
            .iter()
            .map(|rule| (rule.id.as_str(), score(rule, &haystack)))
            .filter(|(_, score)| *score > 0 && *score >= self.min_score)
            .collect();

        // Stable sort keeps taxonomy order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        scored
            .into_iter()
            .take(self.max_categories)
            .map(|(id, _)| id.to_string())
            .collect()
    }
}

fn compile_rule(rule: &CategoryRule) -> Result<CompiledRule> {
    let keywords = rule
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .map(|text| {
            let whole_word = Regex::new(&format!(r"\b{}\b", regex::escape(&text))).map_err(|e| {
                Error::Taxonomy(format!("bad keyword '{}' in '{}': {}", text, rule.id, e))
            })?;
            Ok(Keyword { text, whole_word })
        })
        .collect::<Result<Vec<_>>>()?;

    let exclude = rule
        .exclude
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    Ok(CompiledRule {
        id: rule.id.trim().to_string(),
        keywords,
        exclude,
    })
}

fn score(rule: &CompiledRule, haystack: &str) -> i32 {
    let positive: i32 = rule
        .keywords
        .iter()
        .filter(|k| haystack.contains(&k.text))
        .map(|k| if k.whole_word.is_match(haystack) { 2 } else { 1 })
        .sum();
    let negative = rule.exclude.iter().filter(|e| haystack.contains(e.as_str())).count() as i32;

    (positive - negative).max(0)
}
