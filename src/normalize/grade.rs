//! Authenticity grades

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalized authenticity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "sahih")]
    Sahih,
    #[serde(rename = "hasan")]
    Hasan,
    #[serde(rename = "da'if")]
    Daif,
    #[serde(rename = "mawdu'")]
    Mawdu,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Recognized upstream labels, compared after [`normalize_label`]
const GRADE_LABELS: &[(&str, Grade)] = &[
    ("sahih", Grade::Sahih),
    ("sahih li ghairih", Grade::Sahih),
    ("sahih li ghayrihi", Grade::Sahih),
    ("sahih isnaad", Grade::Sahih),
    ("sahih - authentic", Grade::Sahih),
    ("hasan", Grade::Hasan),
    ("hasan sahih", Grade::Hasan),
    ("hasan li ghairih", Grade::Hasan),
    ("hasan li ghayrihi", Grade::Hasan),
    ("hasan - good", Grade::Hasan),
    ("da'if", Grade::Daif),
    ("daif", Grade::Daif),
    ("weak", Grade::Daif),
    ("da'if - weak", Grade::Daif),
    ("munkar", Grade::Daif),
    ("shadh", Grade::Daif),
    ("mawdu'", Grade::Mawdu),
    ("mawdu", Grade::Mawdu),
    ("maudu", Grade::Mawdu),
    ("batil", Grade::Mawdu),
    ("fabricated", Grade::Mawdu),
    ("mawdu' - fabricated", Grade::Mawdu),
];

impl Grade {
    pub const ALL: [Grade; 5] = [
        Grade::Sahih,
        Grade::Hasan,
        Grade::Daif,
        Grade::Mawdu,
        Grade::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Sahih => "sahih",
            Grade::Hasan => "hasan",
            Grade::Daif => "da'if",
            Grade::Mawdu => "mawdu'",
            Grade::Unknown => "unknown",
        }
    }

    /// Map a free-text upstream label to a bucket. Unrecognized labels are `Unknown`.
    pub fn classify(label: &str) -> Grade {
        let normalized = normalize_label(label);
        GRADE_LABELS
            .iter()
            .find(|(known, _)| *known == normalized)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::Unknown)
    }
}

/// Lowercase, unify apostrophes, drop a trailing "(authority)" and collapse whitespace
fn normalize_label(label: &str) -> String {
    let label = match label.find('(') {
        Some(idx) => &label[..idx],
        None => label,
    };
    label
        .to_lowercase()
        .replace(['\u{2019}', '\u{2018}', '`', '\u{02bf}', '\u{02be}'], "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sahih" => Ok(Grade::Sahih),
            "hasan" => Ok(Grade::Hasan),
            "da'if" | "daif" => Ok(Grade::Daif),
            "mawdu'" | "mawdu" => Ok(Grade::Mawdu),
            "unknown" => Ok(Grade::Unknown),
            _ => Err(format!("Unknown grade: {}", s)),
        }
    }
}
