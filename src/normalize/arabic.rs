//! Folding Arabic text for indexing and matching

/// Whether `c` is a Quranic annotation sign, harakah, superscript alef or tatweel
fn is_arabic_mark(c: char) -> bool {
    matches!(
        c,
        '\u{0610}'..='\u{061A}' | '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{0640}'
    )
}

/// Drop Arabic vowel marks and tatweel so vowelled and bare spellings compare equal.
///
/// FTS5's `unicode61` tokenizer treats these marks as separators, so both
/// the indexed text and the query must be folded.
pub fn fold_arabic(text: &str) -> String {
    text.chars().filter(|&c| !is_arabic_mark(c)).collect()
}
