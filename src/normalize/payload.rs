//! Lenient shapes of upstream entry payloads
//!
//! Upstream payloads vary in field presence and in whether numbers arrive
//! as integers or strings, so every field here is optional.

use serde::Deserialize;
use std::fmt;

/// A number that may arrive as an integer or as a string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Int(i64),
    Text(String),
}

impl RawNumber {
    /// The value as written upstream, or `None` when blank
    pub fn label(&self) -> Option<String> {
        match self {
            RawNumber::Int(n) => Some(n.to_string()),
            RawNumber::Text(s) if s.trim().is_empty() => None,
            RawNumber::Text(s) => Some(s.trim().to_string()),
        }
    }
}

impl fmt::Display for RawNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawNumber::Int(n) => write!(f, "{}", n),
            RawNumber::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// One entry as returned by the upstream
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    #[serde(default, alias = "number", alias = "hadith_number")]
    pub hadith_number: Option<RawNumber>,

    #[serde(default, alias = "book_number")]
    pub book_number: Option<RawNumber>,

    /// Per-language bodies
    #[serde(default, alias = "bodies")]
    pub hadith: Vec<RawBody>,

    /// Grades attached to the entry as a whole
    #[serde(default)]
    pub grades: Vec<RawGrade>,

    #[serde(default)]
    pub reference: Option<RawReference>,
}

/// The text of an entry in one language
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBody {
    #[serde(default)]
    pub lang: String,

    #[serde(default, alias = "text")]
    pub body: Option<String>,

    #[serde(default)]
    pub narrator: Option<String>,

    #[serde(default, alias = "chapter_title")]
    pub chapter_title: Option<String>,

    #[serde(default)]
    pub grades: Vec<RawGrade>,
}

impl RawBody {
    /// Body text, `None` when missing or blank
    pub fn text(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGrade {
    #[serde(default, alias = "label")]
    pub grade: Option<String>,

    #[serde(default, alias = "graded_by")]
    pub graded_by: Option<String>,
}

/// Upstream reference numbers, used for the human-readable label
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReference {
    #[serde(default)]
    pub book: Option<RawNumber>,

    #[serde(default, alias = "hadithNumber")]
    pub hadith: Option<RawNumber>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_accept_int_and_string() {
        let entry: RawEntry = serde_json::from_value(json!({
            "hadithNumber": 12,
            "bookNumber": "3",
        }))
        .unwrap();
        assert_eq!(entry.hadith_number, Some(RawNumber::Int(12)));
        assert_eq!(entry.book_number, Some(RawNumber::Text("3".to_string())));
        assert!(entry.hadith.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let entry: RawEntry = serde_json::from_value(json!({
            "collection": "bukhari",
            "chapterId": "1.00",
            "hadith": [{"lang": "en", "body": "text", "urn": 10}]
        }))
        .unwrap();
        assert_eq!(entry.hadith[0].text(), Some("text"));
    }

    #[test]
    fn test_blank_body_has_no_text() {
        let body = RawBody {
            body: Some("   ".to_string()),
            ..RawBody::default()
        };
        assert_eq!(body.text(), None);
    }

    #[test]
    fn test_label_trims_and_drops_blank() {
        assert_eq!(RawNumber::Text(" 12a ".into()).label(), Some("12a".to_string()));
        assert_eq!(RawNumber::Text("".into()).label(), None);
        assert_eq!(RawNumber::Int(4).label(), Some("4".to_string()));
    }
}
