//! Category taxonomy: ids with positive and negative keyword lists

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// One category and its keyword rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Versioned, ordered set of category rules.
///
/// Order matters: categories with equal scores are reported in taxonomy order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    #[serde(default = "default_version")]
    pub version: u32,
    pub categories: Vec<CategoryRule>,
}

fn default_version() -> u32 {
    1
}

type RuleData = (&'static str, &'static [&'static str], &'static [&'static str]);

const BUILTIN: &[RuleData] = &[
    (
        "faith",
        &[
            "faith", "belief", "believe", "iman", "allah", "god", "prophet", "messenger",
            "testimony", "shahada", "witness", "islam", "muslim", "religion", "creed",
            "tawhid", "oneness", "worship", "ibadah", "lord", "creator", "judgment day",
            "afterlife", "paradise", "hell", "angels", "books", "revelation", "quran",
            "scripture", "decree", "qadar", "destiny", "predestination",
        ],
        &["prayer", "pray", "salah", "salat", "fasting", "fast", "ramadan"],
    ),
    (
        "prayer",
        &[
            "prayer", "pray", "salah", "salat", "worship", "prostration", "sujud",
            "ruku", "bow", "ablution", "wudu", "mosque", "masjid", "qibla", "adhan",
            "call to prayer", "imam", "congregation", "jumu'ah", "friday", "tahajjud",
            "fajr", "dhuhr", "asr", "maghrib", "isha", "rakah", "recitation",
        ],
        &[],
    ),
    (
        "fasting",
        &[
            "fast", "fasting", "sawm", "siyam", "ramadan", "iftar", "suhur", "sahur",
            "break fast", "month of ramadan", "laylat al-qadr", "night of power",
            "i'tikaf", "retreat", "abstain", "refrain",
        ],
        &[],
    ),
    (
        "zakat",
        &[
            "zakat", "charity", "alms", "poor", "needy", "sadaqah", "give", "giving",
            "donation", "wealth", "money", "gold", "silver", "nisab", "poor-due",
            "purification of wealth", "help", "assist", "orphan", "widow",
        ],
        &[],
    ),
    (
        "hajj",
        &[
            "hajj", "pilgrimage", "mecca", "makkah", "ka'bah", "kaaba", "umrah",
            "ihram", "tawaf", "circumambulation", "safa", "marwa", "sa'i", "arafat",
            "muzdalifah", "mina", "jamarat", "stoning", "sacrifice", "eid al-adha",
            "pilgrim", "haram", "black stone",
        ],
        &[],
    ),
    (
        "knowledge",
        &[
            "knowledge", "learn", "learning", "education", "teach", "teaching", "scholar",
            "student", "study", "wisdom", "understanding", "science", "ilm", "ulama",
            "seek knowledge", "beneficial", "guidance", "truth",
        ],
        &["prayer", "fast", "zakat", "hajj"],
    ),
    (
        "family",
        &[
            "family", "parent", "mother", "father", "child", "children", "son", "daughter",
            "husband", "wife", "marriage", "marry", "wedding", "nikah", "divorce", "talaq",
            "kinship", "relative", "brother", "sister", "orphan", "inheritance", "lineage",
        ],
        &[],
    ),
    (
        "ethics",
        &[
            "character", "moral", "ethics", "virtue", "good", "evil", "right", "wrong",
            "honesty", "truthful", "lie", "trust", "patience", "sabr", "gratitude",
            "shukr", "forgiveness", "mercy", "compassion", "justice", "fair", "kind",
            "kindness", "generous", "humility", "pride", "arrogance", "anger", "envy",
        ],
        &[],
    ),
    (
        "social",
        &[
            "neighbor", "friend", "community", "society", "brother", "brotherhood",
            "unity", "help", "assist", "visit", "guest", "hospitality", "greeting",
            "salam", "peace", "reconciliation", "dispute", "rights", "duty", "responsibility",
        ],
        &["family", "marriage"],
    ),
    (
        "business",
        &[
            "trade", "business", "buy", "sell", "transaction", "commerce", "market",
            "price", "profit", "loss", "debt", "loan", "interest", "riba", "usury",
            "contract", "agreement", "witness", "halal", "haram", "lawful", "unlawful",
        ],
        &[],
    ),
    (
        "jihad",
        &[
            "jihad", "struggle", "strive", "fight", "battle", "war", "peace", "treaty",
            "enemy", "defend", "protection", "martyr", "shahid", "courage", "brave",
        ],
        &[],
    ),
    (
        "death",
        &[
            "death", "die", "dying", "grave", "burial", "funeral", "janazah", "shroud",
            "kafan", "cemetery", "afterlife", "resurrection", "judgment", "paradise",
            "hell", "soul", "spirit", "barzakh",
        ],
        &[],
    ),
    (
        "food",
        &[
            "food", "eat", "eating", "drink", "drinking", "halal", "haram", "lawful",
            "unlawful", "meat", "slaughter", "animal", "wine", "alcohol", "intoxicant",
            "dates", "water", "honey", "milk", "bread",
        ],
        &["fast", "fasting", "iftar"],
    ),
    (
        "health",
        &[
            "health", "medicine", "disease", "illness", "sick", "cure", "healing",
            "treatment", "doctor", "physician", "plague", "epidemic", "pain", "suffering",
        ],
        &[],
    ),
    (
        "worship",
        &[
            "worship", "dhikr", "remembrance", "supplication", "dua", "invocation",
            "praise", "glorify", "tasbih", "istighfar", "repentance", "tawbah",
            "night prayer", "tahajjud", "witr", "sunnah", "nawafil",
        ],
        &["salah", "prayer", "fast", "hajj", "zakat"],
    ),
    (
        "women",
        &[
            "woman", "women", "female", "girl", "daughter", "mother", "wife", "sister",
            "menses", "menstruation", "hijab", "veil", "modesty", "dowry", "mahr",
        ],
        &[],
    ),
    (
        "quran",
        &[
            "quran", "qur'an", "verse", "ayah", "surah", "chapter", "recite", "recitation",
            "memorize", "hafiz", "revelation", "scripture", "book of allah",
        ],
        &[],
    ),
    (
        "sins",
        &[
            "sin", "sins", "major sin", "minor sin", "forbidden", "haram", "repent",
            "repentance", "forgiveness", "tawbah", "istighfar", "transgression",
            "disobedience", "evil", "wrongdoing",
        ],
        &[],
    ),
    (
        "nature",
        &[
            "nature", "creation", "universe", "earth", "sky", "heaven", "sun", "moon",
            "star", "rain", "water", "tree", "plant", "animal", "bird", "sea", "mountain",
        ],
        &[],
    ),
    (
        "prophecy",
        &[
            "prophet", "messenger", "prophecy", "revelation", "miracle", "sign",
            "previous nations", "children of israel", "moses", "jesus", "abraham",
            "noah", "adam", "story", "parable",
        ],
        &[],
    ),
];

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            version: 1,
            categories: BUILTIN
                .iter()
                .map(|&(id, keywords, exclude)| CategoryRule {
                    id: id.to_string(),
                    keywords: to_strings(keywords),
                    exclude: to_strings(exclude),
                })
                .collect(),
        }
    }
}

impl Taxonomy {
    /// Load a taxonomy from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading taxonomy from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let taxonomy: Taxonomy = toml::from_str(&content)?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    /// Load from `path` when given, otherwise use the built-in taxonomy
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Ids in taxonomy order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.id.as_str())
    }

    /// Check ids are unique and non-empty, and that no keyword is also an exclusion
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(Error::Taxonomy("taxonomy has no categories".to_string()));
        }

        let mut seen = HashSet::new();
        for rule in &self.categories {
            let id = rule.id.trim();
            if id.is_empty() {
                return Err(Error::Taxonomy("category id cannot be empty".to_string()));
            }
            if !seen.insert(id.to_lowercase()) {
                return Err(Error::Taxonomy(format!("duplicate category id '{}'", id)));
            }
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(Error::Taxonomy(format!("category '{}' has no keywords", id)));
            }

            let excluded: HashSet<String> =
                rule.exclude.iter().map(|e| e.trim().to_lowercase()).collect();
            if let Some(both) = rule
                .keywords
                .iter()
                .find(|k| excluded.contains(&k.trim().to_lowercase()))
            {
                return Err(Error::Taxonomy(format!(
                    "category '{}' lists '{}' as both keyword and exclusion",
                    id, both
                )));
            }
        }

        Ok(())
    }
}
