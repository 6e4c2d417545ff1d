//! isnad - hadith corpus import, normalization and search
//!
//! This crate provides:
//! - A resumable importer that pulls entries from an upstream corpus API
//! - Normalization of inconsistent payloads into canonical entries
//! - Keyword categorization against a configurable taxonomy
//! - Ranked full-text search over SQLite FTS5

pub mod categorize;
pub mod commands;
pub mod config;
pub mod error;
pub mod import;
pub mod meta;
pub mod normalize;
pub mod progress;
pub mod search;
pub mod source;

pub use config::Config;
pub use error::{Error, Result};
