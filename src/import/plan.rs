//! Grouping pending entry numbers by book

use crate::source::BookListing;

/// Book used when the upstream listing is unavailable or leaves numbers uncovered.
///
/// Upstream books start at 1, so 0 never collides with a listed book.
pub const PLACEHOLDER_BOOK_NUMBER: u32 = 0;
pub const PLACEHOLDER_BOOK_NAME: &str = "Default Book";

/// Entry numbers to fetch for one book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookWork {
    pub book_number: u32,
    pub name: String,
    pub numbers: Vec<u32>,
}

impl BookWork {
    fn placeholder(numbers: Vec<u32>) -> Self {
        Self {
            book_number: PLACEHOLDER_BOOK_NUMBER,
            name: PLACEHOLDER_BOOK_NAME.to_string(),
            numbers,
        }
    }
}

/// Assign each pending number to the first listed book whose range covers it.
///
/// Without a listing everything goes to the placeholder book. Numbers no book
/// covers are also sent there, after the listed books.
pub fn plan_books(pending: &[u32], listing: Option<&[BookListing]>) -> Vec<BookWork> {
    let books = match listing {
        Some(books) if !books.is_empty() => books,
        _ => {
            if pending.is_empty() {
                return Vec::new();
            }
            return vec![BookWork::placeholder(pending.to_vec())];
        }
    };

    let mut plan: Vec<BookWork> = books
        .iter()
        .map(|book| BookWork {
            book_number: book.book_number,
            name: book.name.clone(),
            numbers: Vec::new(),
        })
        .collect();
    let mut uncovered = Vec::new();

    for &number in pending {
        match books.iter().position(|book| book.covers(number)) {
            Some(idx) => plan[idx].numbers.push(number),
            None => uncovered.push(number),
        }
    }

    plan.retain(|work| !work.numbers.is_empty());
    if !uncovered.is_empty() {
        plan.push(BookWork::placeholder(uncovered));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(number: u32, name: &str, range: Option<(u32, u32)>) -> BookListing {
        BookListing {
            book_number: number,
            name: name.to_string(),
            first_entry: range.map(|r| r.0),
            last_entry: range.map(|r| r.1),
        }
    }

    #[test]
    fn test_flat_plan_without_listing() {
        let plan = plan_books(&[1, 2, 3], None);
        assert_eq!(plan, vec![BookWork::placeholder(vec![1, 2, 3])]);
        assert!(plan_books(&[], None).is_empty());
    }

    #[test]
    fn test_numbers_follow_book_ranges() {
        let listing = vec![
            book(1, "Revelation", Some((1, 7))),
            book(2, "Belief", Some((8, 58))),
            book(3, "Knowledge", Some((59, 134))),
        ];
        let plan = plan_books(&[3, 9, 10, 200], Some(&listing));

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].numbers, vec![3]);
        assert_eq!(plan[1].name, "Belief");
        assert_eq!(plan[1].numbers, vec![9, 10]);
        // Book 3 had nothing pending; 200 is uncovered
        assert_eq!(plan[2], BookWork::placeholder(vec![200]));
    }

    #[test]
    fn test_books_without_ranges_get_nothing() {
        let listing = vec![book(4, "Ablution", None)];
        let plan = plan_books(&[1, 2], Some(&listing));
        assert_eq!(plan, vec![BookWork::placeholder(vec![1, 2])]);
    }
}
