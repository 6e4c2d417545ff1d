//! SQLite schema definition

/// SQL schema for the corpus database
pub const SCHEMA_SQL: &str = r#"
-- Collections: one canonical compilation each
CREATE TABLE IF NOT EXISTS collections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_key TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    api_name TEXT NOT NULL,
    total_expected_entries INTEGER NOT NULL DEFAULT 0,
    total_expected_books INTEGER NOT NULL DEFAULT 0,
    total_entries INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Books: thematic divisions of a collection
CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id INTEGER NOT NULL REFERENCES collections(id),
    book_number INTEGER NOT NULL,
    name TEXT NOT NULL,
    entry_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(collection_id, book_number)
);

-- Entries: canonical records, unique per collection and number
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id INTEGER NOT NULL REFERENCES collections(id),
    book_id INTEGER NOT NULL REFERENCES books(id),
    entry_number INTEGER NOT NULL CHECK (entry_number > 0),
    primary_text TEXT NOT NULL,
    -- primary_text without vowel marks, fed to entry_search_ar
    primary_search TEXT NOT NULL DEFAULT '',
    secondary_text TEXT,
    tertiary_text TEXT,
    narrator_chain TEXT,
    grade TEXT NOT NULL DEFAULT 'unknown'
        CHECK (grade IN ('sahih', 'hasan', 'da''if', 'mawdu''', 'unknown')),
    grade_raw TEXT,
    reference_label TEXT NOT NULL,
    categories_json TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(collection_id, entry_number)
);

-- Import runs: history and stats
CREATE TABLE IF NOT EXISTS import_runs (
    id TEXT PRIMARY KEY,
    collection_id INTEGER NOT NULL REFERENCES collections(id),
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL,
    imported INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    missing INTEGER NOT NULL DEFAULT 0,
    total_processed INTEGER NOT NULL DEFAULT 0,
    errors_json TEXT
);

-- Full-text index over the folded Arabic body
CREATE VIRTUAL TABLE IF NOT EXISTS entry_search_ar USING fts5(
    primary_search,
    content='entries',
    content_rowid='id',
    tokenize='unicode61 remove_diacritics 2'
);

-- Full-text index over the translation, narrator and reference
CREATE VIRTUAL TABLE IF NOT EXISTS entry_search_en USING fts5(
    secondary_text,
    narrator_chain,
    reference_label,
    content='entries',
    content_rowid='id',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS entries_search_ai AFTER INSERT ON entries BEGIN
    INSERT INTO entry_search_ar(rowid, primary_search) VALUES (new.id, new.primary_search);
    INSERT INTO entry_search_en(rowid, secondary_text, narrator_chain, reference_label)
        VALUES (new.id, new.secondary_text, new.narrator_chain, new.reference_label);
END;

CREATE TRIGGER IF NOT EXISTS entries_search_ad AFTER DELETE ON entries BEGIN
    INSERT INTO entry_search_ar(entry_search_ar, rowid, primary_search)
        VALUES ('delete', old.id, old.primary_search);
    INSERT INTO entry_search_en(entry_search_en, rowid, secondary_text, narrator_chain, reference_label)
        VALUES ('delete', old.id, old.secondary_text, old.narrator_chain, old.reference_label);
END;

CREATE TRIGGER IF NOT EXISTS entries_search_au
AFTER UPDATE OF primary_search, secondary_text, narrator_chain, reference_label ON entries BEGIN
    INSERT INTO entry_search_ar(entry_search_ar, rowid, primary_search)
        VALUES ('delete', old.id, old.primary_search);
    INSERT INTO entry_search_en(entry_search_en, rowid, secondary_text, narrator_chain, reference_label)
        VALUES ('delete', old.id, old.secondary_text, old.narrator_chain, old.reference_label);
    INSERT INTO entry_search_ar(rowid, primary_search) VALUES (new.id, new.primary_search);
    INSERT INTO entry_search_en(rowid, secondary_text, narrator_chain, reference_label)
        VALUES (new.id, new.secondary_text, new.narrator_chain, new.reference_label);
END;

-- Indexes for common queries
CREATE INDEX IF NOT EXISTS idx_books_collection ON books(collection_id);
CREATE INDEX IF NOT EXISTS idx_entries_book ON entries(book_id);
CREATE INDEX IF NOT EXISTS idx_entries_grade ON entries(grade);
CREATE INDEX IF NOT EXISTS idx_import_runs_collection ON import_runs(collection_id);
"#;
