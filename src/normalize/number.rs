//! Entry number resolution

use super::payload::RawNumber;
use crate::config::NormalizeConfig;
use crate::error::{Error, Result};

/// How out-of-range entry numbers are repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberPolicy {
    /// Numbers above this are treated as concatenated artifacts
    pub sanity_bound: u64,
    /// Leading digits kept when truncating
    pub keep_digits: usize,
}

impl Default for NumberPolicy {
    fn default() -> Self {
        Self {
            sanity_bound: 10_000,
            keep_digits: 4,
        }
    }
}

impl From<&NormalizeConfig> for NumberPolicy {
    fn from(config: &NormalizeConfig) -> Self {
        Self {
            sanity_bound: config.number_sanity_bound,
            keep_digits: config.number_keep_digits,
        }
    }
}

/// Resolve a raw upstream number to a positive entry number.
///
/// Non-digit characters are dropped ("12a" is 12). Values above the sanity
/// bound keep only their leading digits ("949950" is 9499).
pub fn resolve_entry_number(raw: &RawNumber, policy: &NumberPolicy) -> Result<u32> {
    let digits: String = match raw {
        RawNumber::Int(n) if *n <= 0 => {
            return Err(Error::Rejected(format!("entry number {} is not positive", n)))
        }
        RawNumber::Int(n) => n.to_string(),
        RawNumber::Text(s) => s.chars().filter(char::is_ascii_digit).collect(),
    };

    if digits.is_empty() {
        return Err(Error::Rejected(format!("entry number {} has no digits", raw)));
    }

    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Err(Error::Rejected(format!("entry number {} is zero", raw)));
    }

    let within_bound = significant
        .parse::<u64>()
        .map(|value| value <= policy.sanity_bound)
        .unwrap_or(false);

    let resolved = if within_bound {
        significant
    } else {
        let end = policy.keep_digits.min(significant.len());
        &significant[..end]
    };

    resolved
        .parse::<u32>()
        .map_err(|_| Error::Rejected(format!("entry number {} is out of range", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(raw: RawNumber) -> Result<u32> {
        resolve_entry_number(&raw, &NumberPolicy::default())
    }

    fn text(s: &str) -> RawNumber {
        RawNumber::Text(s.to_string())
    }

    #[test]
    fn test_plain_numbers() {
        assert_eq!(resolve(RawNumber::Int(42)).unwrap(), 42);
        assert_eq!(resolve(text("42")).unwrap(), 42);
        assert_eq!(resolve(text("10000")).unwrap(), 10_000);
    }

    #[test]
    fn test_non_digits_are_stripped() {
        assert_eq!(resolve(text("12a")).unwrap(), 12);
        assert_eq!(resolve(text(" 3 b ")).unwrap(), 3);
        assert_eq!(resolve(text("007")).unwrap(), 7);
    }

    #[test]
    fn test_concatenated_numbers_are_truncated() {
        assert_eq!(resolve(text("949950")).unwrap(), 9499);
        assert_eq!(resolve(RawNumber::Int(10_001)).unwrap(), 1000);
        assert_eq!(resolve(text("123456789012345678901234567890")).unwrap(), 1234);
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(resolve(text("abc")), Err(Error::Rejected(_))));
        assert!(matches!(resolve(text("")), Err(Error::Rejected(_))));
        assert!(matches!(resolve(text("000")), Err(Error::Rejected(_))));
        assert!(matches!(resolve(RawNumber::Int(0)), Err(Error::Rejected(_))));
        assert!(matches!(resolve(RawNumber::Int(-5)), Err(Error::Rejected(_))));
    }

    #[test]
    fn test_custom_policy() {
        let policy = NumberPolicy {
            sanity_bound: 100,
            keep_digits: 2,
        };
        assert_eq!(resolve_entry_number(&text("12345"), &policy).unwrap(), 12);
        assert_eq!(resolve_entry_number(&text("100"), &policy).unwrap(), 100);
    }
}
