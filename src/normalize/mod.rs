//! Turning raw upstream payloads into canonical entries

pub mod arabic;
pub mod grade;
pub mod number;
pub mod payload;

pub use arabic::fold_arabic;
pub use grade::Grade;
pub use number::{resolve_entry_number, NumberPolicy};
pub use payload::{RawBody, RawEntry, RawGrade, RawNumber};

use crate::config::NormalizeConfig;
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A validated entry ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntry {
    pub collection_id: i64,
    pub book_number: u32,
    pub book_name: String,
    pub entry_number: u32,
    /// Arabic body; empty when the upstream only supplied a translation
    pub primary_text: String,
    pub secondary_text: Option<String>,
    pub tertiary_text: Option<String>,
    pub narrator_chain: Option<String>,
    pub grade: Grade,
    /// The upstream label the grade was derived from
    pub grade_raw: Option<String>,
    pub reference_label: String,
    pub categories: Vec<String>,
}

/// Where an entry is being imported into
#[derive(Debug, Clone, Copy)]
pub struct EntryContext<'a> {
    pub collection_id: i64,
    pub display_name: &'a str,
    pub book_number: u32,
    pub book_name: &'a str,
    /// The number the entry was requested under
    pub requested_number: u32,
}

/// Stateless payload normalizer
#[derive(Debug, Clone)]
pub struct Normalizer {
    primary_lang: String,
    secondary_lang: String,
    tertiary_lang: String,
    policy: NumberPolicy,
    strip_markup: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizeConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: &NormalizeConfig) -> Self {
        Self {
            primary_lang: config.primary_lang.clone(),
            secondary_lang: config.secondary_lang.clone(),
            tertiary_lang: config.tertiary_lang.clone(),
            policy: NumberPolicy::from(config),
            strip_markup: config.strip_markup,
        }
    }

    /// Normalize one raw payload.
    ///
    /// Returns [`Error::Rejected`] when the payload cannot be decoded, has
    /// neither a primary nor a secondary body, or carries an unusable number.
    /// Categories are left empty.
    pub fn normalize(&self, payload: &serde_json::Value, ctx: &EntryContext<'_>) -> Result<CanonicalEntry> {
        let raw: RawEntry = serde_json::from_value(payload.clone()).map_err(|e| {
            Error::Rejected(format!(
                "{} #{}: undecodable payload: {}",
                ctx.display_name, ctx.requested_number, e
            ))
        })?;
        self.normalize_raw(&raw, ctx)
    }

    pub fn normalize_raw(&self, raw: &RawEntry, ctx: &EntryContext<'_>) -> Result<CanonicalEntry> {
        let entry_number = match &raw.hadith_number {
            Some(number) => resolve_entry_number(number, &self.policy).map_err(|e| match e {
                Error::Rejected(reason) => {
                    Error::Rejected(format!("{} #{}: {}", ctx.display_name, ctx.requested_number, reason))
                }
                other => other,
            })?,
            None => ctx.requested_number,
        };

        let primary = self.body(raw, &self.primary_lang);
        let secondary = self.body(raw, &self.secondary_lang);
        let tertiary = self.body(raw, &self.tertiary_lang);

        let primary_text = primary.and_then(RawBody::text).map(|t| self.clean(t));
        let secondary_text = secondary.and_then(RawBody::text).map(|t| self.clean(t));
        if primary_text.is_none() && secondary_text.is_none() {
            return Err(Error::Rejected(format!(
                "{} #{}: no {} or {} body",
                ctx.display_name, entry_number, self.primary_lang, self.secondary_lang
            )));
        }
        let tertiary_text = tertiary.and_then(RawBody::text).map(|t| self.clean(t));

        let narrator_chain = [secondary, primary]
            .into_iter()
            .flatten()
            .filter_map(|b| b.narrator.as_deref())
            .map(|n| self.clean(n))
            .find(|n| !n.is_empty());

        let grade_raw = first_grade_label(&raw.grades)
            .or_else(|| secondary.and_then(|b| first_grade_label(&b.grades)))
            .or_else(|| primary.and_then(|b| first_grade_label(&b.grades)));
        let grade = grade_raw.as_deref().map(Grade::classify).unwrap_or(Grade::Unknown);

        let reference_label = reference_label(raw, ctx, entry_number);

        Ok(CanonicalEntry {
            collection_id: ctx.collection_id,
            book_number: ctx.book_number,
            book_name: ctx.book_name.to_string(),
            entry_number,
            primary_text: primary_text.unwrap_or_default(),
            secondary_text,
            tertiary_text,
            narrator_chain,
            grade,
            grade_raw,
            reference_label,
            categories: Vec::new(),
        })
    }

    /// First body in `lang` that has text, else the first body in `lang`
    fn body<'r>(&self, raw: &'r RawEntry, lang: &str) -> Option<&'r RawBody> {
        let mut bodies = raw.hadith.iter().filter(|b| lang_matches(&b.lang, lang));
        let first = bodies.next()?;
        if first.text().is_some() {
            return Some(first);
        }
        bodies.find(|b| b.text().is_some()).or(Some(first))
    }

    fn clean(&self, text: &str) -> String {
        if self.strip_markup {
            strip_markup(text)
        } else {
            text.trim().to_string()
        }
    }
}

fn lang_matches(tag: &str, wanted: &str) -> bool {
    let tag = tag.trim();
    tag.eq_ignore_ascii_case(wanted)
        || tag
            .split(['-', '_'])
            .next()
            .is_some_and(|primary| primary.eq_ignore_ascii_case(wanted))
}

fn first_grade_label(grades: &[RawGrade]) -> Option<String> {
    grades
        .iter()
        .filter_map(|g| g.grade.as_deref())
        .map(str::trim)
        .find(|g| !g.is_empty())
        .map(str::to_string)
}

/// "<collection> <book>:<entry>", preferring upstream reference numbers
fn reference_label(raw: &RawEntry, ctx: &EntryContext<'_>, entry_number: u32) -> String {
    let reference = raw.reference.as_ref();
    let book = reference
        .and_then(|r| r.book.as_ref())
        .and_then(RawNumber::label)
        .or_else(|| raw.book_number.as_ref().and_then(RawNumber::label))
        .unwrap_or_else(|| ctx.book_number.to_string());
    let entry = reference
        .and_then(|r| r.hadith.as_ref())
        .and_then(RawNumber::label)
        .unwrap_or_else(|| entry_number.to_string());
    format!("{} {}:{}", ctx.display_name, book, entry)
}

/// Remove HTML tags, decode the common entities and collapse whitespace
pub fn strip_markup(text: &str) -> String {
    static TAG_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let without_tags = match TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").ok()) {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.to_string(),
    };
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
