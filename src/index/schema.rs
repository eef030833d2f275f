//! Database schema definitions for the retrieval index.
//!
//! One embedded `SQLite` file at `<base_dir>/.index/index.db` holds
//! three co-resident tables keyed by `chunk_id`: the vector table, the
//! metadata table, and the FTS5 full-text table.

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Vector table: one L2-normalized embedding per chunk, stored as
-- little-endian f32 bytes.
CREATE TABLE IF NOT EXISTS chunks_vec (
    chunk_id  TEXT PRIMARY KEY,
    embedding BLOB NOT NULL
);

-- Metadata table for joins and doc-scoped queries.
CREATE TABLE IF NOT EXISTS chunks_meta (
    chunk_id       TEXT PRIMARY KEY,
    doc_id         TEXT NOT NULL,
    modality       TEXT NOT NULL,
    converted_path TEXT,
    locator_json   TEXT,
    heading_json   TEXT,
    doc_name       TEXT,
    file_type      TEXT,
    indexed_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_meta_doc_id ON chunks_meta(doc_id);

-- FTS5 virtual table for BM25 full-text search. Porter stemming plus
-- unicode61 keeps codes like RFC-2616 matchable alongside natural
-- language queries.
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    chunk_id UNINDEXED,
    doc_id   UNINDEXED,
    modality UNINDEXED,
    text,
    heading_path,
    tokenize = 'porter unicode61'
);
";
