//! `SQLite`-backed index store.
//!
//! Owns the single embedded database holding `chunks_vec`,
//! `chunks_meta`, and `chunks_fts`. All mutation goes through this API;
//! after any successful upsert/delete batch the three tables hold the
//! same chunk-id set.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use crate::chunking::{Chunk, Locator, Modality};
use crate::embedding::EMBED_DIM;
use crate::error::{IndexError, Result};
use crate::index::schema::SCHEMA_SQL;

/// A vector-search hit with full metadata.
#[derive(Debug, Clone)]
pub struct VectorHit {
    /// Chunk identifier.
    pub chunk_id: String,
    /// Cosine similarity to the query (higher = better).
    pub score: f32,
    /// Parent document id.
    pub doc_id: String,
    /// Chunk modality.
    pub modality: String,
    /// Converted file path.
    pub converted_path: String,
    /// Position record, when stored.
    pub locator: Option<Locator>,
    /// Section hierarchy.
    pub heading_path: Vec<String>,
    /// Document name.
    pub doc_name: String,
    /// Original file-type label.
    pub file_type: String,
}

/// A full-text search hit.
#[derive(Debug, Clone)]
pub struct FtsHit {
    /// Chunk identifier.
    pub chunk_id: String,
    /// Parent document id.
    pub doc_id: String,
    /// Chunk modality.
    pub modality: String,
    /// Chunk text (the FTS table is the authoritative text source).
    pub text: String,
    /// Section hierarchy.
    pub heading_path: Vec<String>,
    /// BM25 score (negative; smaller = better match).
    pub bm25_score: f64,
}

/// A stored chunk row with text, as returned by doc-scoped queries.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    /// Chunk identifier.
    pub chunk_id: String,
    /// Parent document id.
    pub doc_id: String,
    /// Chunk modality.
    pub modality: String,
    /// Converted file path.
    pub converted_path: String,
    /// Position record, when stored.
    pub locator: Option<Locator>,
    /// Section hierarchy.
    pub heading_path: Vec<String>,
    /// Document name.
    pub doc_name: String,
    /// Original file-type label.
    pub file_type: String,
    /// Chunk text.
    pub text: String,
}

/// Aggregate index statistics.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Total chunks in the index.
    pub chunk_count: usize,
    /// Distinct documents.
    pub doc_count: usize,
    /// Distinct modalities present.
    pub modalities: Vec<String>,
    /// Database file size in bytes.
    pub db_size_bytes: u64,
    /// Most recent `indexed_at` timestamp.
    pub last_indexed_at: Option<String>,
}

/// `SQLite`-backed store for chunk vectors, metadata, and full text.
pub struct IndexStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl IndexStore {
    /// Opens (or creates) the index at `<base_dir>/.index/index.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open(base_dir: &Path) -> Result<Self> {
        let index_dir = base_dir.join(".index");
        std::fs::create_dir_all(&index_dir).map_err(|e| IndexError::Database(e.to_string()))?;
        Self::open_at(&index_dir.join("index.db"))
    }

    /// Opens (or creates) the index at an explicit database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open_at(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::Database(e.to_string()))?;
        }
        let conn = Connection::open(db_path).map_err(IndexError::from)?;

        // WAL mode for better concurrent read access from sub-agents.
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(IndexError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(IndexError::from)?;

        Ok(Self {
            conn,
            db_path: Some(db_path.to_path_buf()),
        })
    }

    /// Creates an in-memory index. Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(IndexError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(IndexError::from)?;
        Ok(Self {
            conn,
            db_path: None,
        })
    }

    /// True when an index database exists under `base_dir`.
    #[must_use]
    pub fn exists(base_dir: &Path) -> bool {
        base_dir.join(".index").join("index.db").exists()
    }

    fn serialize_vector(vector: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(vector.len() * 4);
        for value in vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    fn deserialize_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    fn parse_heading(heading_json: &str) -> Vec<String> {
        if heading_json.is_empty() {
            return Vec::new();
        }
        serde_json::from_str(heading_json).unwrap_or_default()
    }

    fn parse_locator(locator_json: &str) -> Option<Locator> {
        if locator_json.is_empty() {
            return None;
        }
        serde_json::from_str(locator_json).ok()
    }

    /// Inserts or updates chunks with their vectors atomically.
    ///
    /// The FTS row is delete-then-insert (FTS5 has no UPDATE). Returns
    /// `(inserted, updated)`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] for vectors of the
    /// wrong length, and database errors otherwise.
    pub fn upsert(&mut self, items: &[(Chunk, Vec<f32>)]) -> Result<(usize, usize)> {
        for (chunk, vector) in items {
            if vector.len() != EMBED_DIM {
                return Err(IndexError::DimensionMismatch {
                    got: vector.len(),
                    expected: EMBED_DIM,
                }
                .into());
            }
            debug_assert!(!chunk.chunk_id.is_empty());
        }

        let tx = self.conn.transaction().map_err(IndexError::from)?;
        let mut inserted = 0;
        let mut updated = 0;
        let now = Utc::now().to_rfc3339();

        for (chunk, vector) in items {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM chunks_meta WHERE chunk_id = ?",
                    params![chunk.chunk_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(IndexError::from)?;

            let locator_json =
                serde_json::to_string(&chunk.locator).map_err(IndexError::from)?;
            let heading_json = if chunk.heading_path.is_empty() {
                String::new()
            } else {
                serde_json::to_string(&chunk.heading_path).map_err(IndexError::from)?
            };
            let heading_str = chunk.heading_path.join(" > ");
            let vector_bytes = Self::serialize_vector(vector);

            if exists.is_some() {
                tx.execute(
                    "UPDATE chunks_vec SET embedding = ? WHERE chunk_id = ?",
                    params![vector_bytes, chunk.chunk_id],
                )
                .map_err(IndexError::from)?;
                tx.execute(
                    r"
                    UPDATE chunks_meta SET
                        doc_id = ?, modality = ?, converted_path = ?,
                        locator_json = ?, heading_json = ?, doc_name = ?,
                        file_type = ?, indexed_at = ?
                    WHERE chunk_id = ?
                ",
                    params![
                        chunk.doc_id,
                        chunk.modality.as_str(),
                        chunk.converted_path,
                        locator_json,
                        heading_json,
                        chunk.doc_name,
                        chunk.file_type,
                        now,
                        chunk.chunk_id,
                    ],
                )
                .map_err(IndexError::from)?;
                // FTS5 does not support UPDATE: delete then insert.
                tx.execute(
                    "DELETE FROM chunks_fts WHERE chunk_id = ?",
                    params![chunk.chunk_id],
                )
                .map_err(IndexError::from)?;
                tx.execute(
                    "INSERT INTO chunks_fts (chunk_id, doc_id, modality, text, heading_path) \
                     VALUES (?, ?, ?, ?, ?)",
                    params![
                        chunk.chunk_id,
                        chunk.doc_id,
                        chunk.modality.as_str(),
                        chunk.text,
                        heading_str,
                    ],
                )
                .map_err(IndexError::from)?;
                updated += 1;
            } else {
                tx.execute(
                    "INSERT INTO chunks_vec (chunk_id, embedding) VALUES (?, ?)",
                    params![chunk.chunk_id, vector_bytes],
                )
                .map_err(IndexError::from)?;
                tx.execute(
                    r"
                    INSERT INTO chunks_meta (
                        chunk_id, doc_id, modality, converted_path,
                        locator_json, heading_json, doc_name, file_type, indexed_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                    params![
                        chunk.chunk_id,
                        chunk.doc_id,
                        chunk.modality.as_str(),
                        chunk.converted_path,
                        locator_json,
                        heading_json,
                        chunk.doc_name,
                        chunk.file_type,
                        now,
                    ],
                )
                .map_err(IndexError::from)?;
                tx.execute(
                    "INSERT INTO chunks_fts (chunk_id, doc_id, modality, text, heading_path) \
                     VALUES (?, ?, ?, ?, ?)",
                    params![
                        chunk.chunk_id,
                        chunk.doc_id,
                        chunk.modality.as_str(),
                        chunk.text,
                        heading_str,
                    ],
                )
                .map_err(IndexError::from)?;
                inserted += 1;
            }
        }

        tx.commit().map_err(IndexError::from)?;
        Ok((inserted, updated))
    }

    /// K-nearest-neighbor search over the stored vectors.
    ///
    /// Vectors are normalized, so cosine similarity is the dot product.
    /// `doc_ids_filter` semantics: `None` searches everything; an empty
    /// set returns `[]` without touching the database; a non-empty set
    /// post-filters to those documents.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn knn_search(
        &self,
        query_vec: &[f32],
        k: usize,
        doc_ids_filter: Option<&[String]>,
    ) -> Result<Vec<VectorHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if let Some(filter) = doc_ids_filter
            && filter.is_empty()
        {
            return Ok(Vec::new());
        }

        let (sql, filter_params): (String, Vec<String>) = doc_ids_filter.map_or_else(
            || {
                (
                    r"
                    SELECT v.chunk_id, v.embedding, m.doc_id, m.modality,
                           m.converted_path, m.locator_json, m.heading_json,
                           m.doc_name, m.file_type
                    FROM chunks_vec v
                    JOIN chunks_meta m ON v.chunk_id = m.chunk_id
                "
                    .to_string(),
                    Vec::new(),
                )
            },
            |filter| {
                let placeholders = vec!["?"; filter.len()].join(",");
                (
                    format!(
                        r"
                        SELECT v.chunk_id, v.embedding, m.doc_id, m.modality,
                               m.converted_path, m.locator_json, m.heading_json,
                               m.doc_name, m.file_type
                        FROM chunks_vec v
                        JOIN chunks_meta m ON v.chunk_id = m.chunk_id
                        WHERE m.doc_id IN ({placeholders})
                    "
                    ),
                    filter.to_vec(),
                )
            },
        );

        let mut stmt = self.conn.prepare(&sql).map_err(IndexError::from)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(filter_params.iter()), |row| {
                let embedding: Vec<u8> = row.get(1)?;
                Ok((
                    row.get::<_, String>(0)?,
                    embedding,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                    row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                ))
            })
            .map_err(IndexError::from)?;

        let mut hits: Vec<VectorHit> = Vec::new();
        for row in rows {
            let (
                chunk_id,
                embedding,
                doc_id,
                modality,
                converted_path,
                locator_json,
                heading_json,
                doc_name,
                file_type,
            ) = row.map_err(IndexError::from)?;
            let vector = Self::deserialize_vector(&embedding);
            let score = crate::embedding::cosine_similarity(query_vec, &vector);
            hits.push(VectorHit {
                chunk_id,
                score,
                doc_id,
                modality,
                converted_path,
                locator: Self::parse_locator(&locator_json),
                heading_path: Self::parse_heading(&heading_json),
                doc_name,
                file_type,
            });
        }

        // Descending score, chunk_id tie-break for deterministic output.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// BM25-ranked full-text search.
    ///
    /// The query is wrapped in double quotes (internal quotes doubled)
    /// to force exact-term matching of codes like `RFC-2616`.
    ///
    /// # Errors
    ///
    /// Returns database errors. A query with no FTS matches returns an
    /// empty list.
    pub fn fts_search(
        &self,
        query: &str,
        k: usize,
        doc_ids_filter: Option<&[String]>,
    ) -> Result<Vec<FtsHit>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if let Some(filter) = doc_ids_filter
            && filter.is_empty()
        {
            return Ok(Vec::new());
        }

        let escaped = query.replace('"', "\"\"");
        let fts_query = format!("\"{escaped}\"");

        let mut params_vec: Vec<String> = vec![fts_query];
        let sql = if let Some(filter) = doc_ids_filter {
            let placeholders = vec!["?"; filter.len()].join(",");
            params_vec.extend(filter.iter().cloned());
            format!(
                r"
                SELECT chunk_id, doc_id, modality, text, heading_path,
                       bm25(chunks_fts) AS bm25_score
                FROM chunks_fts
                WHERE chunks_fts MATCH ?
                  AND doc_id IN ({placeholders})
                ORDER BY bm25_score
                LIMIT {k}
            "
            )
        } else {
            format!(
                r"
                SELECT chunk_id, doc_id, modality, text, heading_path,
                       bm25(chunks_fts) AS bm25_score
                FROM chunks_fts
                WHERE chunks_fts MATCH ?
                ORDER BY bm25_score
                LIMIT {k}
            "
            )
        };

        let mut stmt = self.conn.prepare(&sql).map_err(IndexError::from)?;
        let query_result = stmt.query_map(rusqlite::params_from_iter(params_vec.iter()), |row| {
            let heading_str: Option<String> = row.get(4)?;
            Ok(FtsHit {
                chunk_id: row.get(0)?,
                doc_id: row.get(1)?,
                modality: row.get(2)?,
                text: row.get(3)?,
                heading_path: heading_str
                    .unwrap_or_default()
                    .split(" > ")
                    .filter(|h| !h.is_empty())
                    .map(ToString::to_string)
                    .collect(),
                bm25_score: row.get(5)?,
            })
        });

        match query_result {
            Ok(rows) => {
                let mut hits = Vec::new();
                for row in rows {
                    hits.push(row.map_err(IndexError::from)?);
                }
                Ok(hits)
            }
            // A syntactically hostile query is a no-match, not a failure.
            Err(rusqlite::Error::SqliteFailure(_, _)) => Ok(Vec::new()),
            Err(e) => Err(IndexError::from(e).into()),
        }
    }

    /// Deletes chunks by id from all three tables. Returns the number
    /// of chunks removed.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn delete_chunks(&mut self, chunk_ids: &[String]) -> Result<usize> {
        if chunk_ids.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction().map_err(IndexError::from)?;
        let mut deleted = 0;
        for chunk_id in chunk_ids {
            let removed = tx
                .execute("DELETE FROM chunks_meta WHERE chunk_id = ?", params![chunk_id])
                .map_err(IndexError::from)?;
            tx.execute("DELETE FROM chunks_vec WHERE chunk_id = ?", params![chunk_id])
                .map_err(IndexError::from)?;
            tx.execute("DELETE FROM chunks_fts WHERE chunk_id = ?", params![chunk_id])
                .map_err(IndexError::from)?;
            if removed > 0 {
                deleted += 1;
            }
        }
        tx.commit().map_err(IndexError::from)?;
        Ok(deleted)
    }

    /// All chunk ids currently in the metadata table.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn existing_chunk_ids(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT chunk_id FROM chunks_meta")
            .map_err(IndexError::from)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(IndexError::from)?;
        let mut ids = BTreeSet::new();
        for row in rows {
            ids.insert(row.map_err(IndexError::from)?);
        }
        Ok(ids)
    }

    /// Chunk ids whose `converted_path` is one of the given paths.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn chunk_ids_by_converted_paths(&self, paths: &[String]) -> Result<BTreeSet<String>> {
        if paths.is_empty() {
            return Ok(BTreeSet::new());
        }
        let placeholders = vec!["?"; paths.len()].join(",");
        let sql =
            format!("SELECT chunk_id FROM chunks_meta WHERE converted_path IN ({placeholders})");
        let mut stmt = self.conn.prepare(&sql).map_err(IndexError::from)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(paths.iter()), |row| {
                row.get::<_, String>(0)
            })
            .map_err(IndexError::from)?;
        let mut ids = BTreeSet::new();
        for row in rows {
            ids.insert(row.map_err(IndexError::from)?);
        }
        Ok(ids)
    }

    /// All chunks for a document, optionally filtered by modality,
    /// sorted by `time_start` when the locator is temporal.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn chunks_by_doc_id(
        &self,
        doc_id: &str,
        modalities: Option<&[Modality]>,
    ) -> Result<Vec<StoredChunk>> {
        let mut params_vec: Vec<String> = vec![doc_id.to_string()];
        let sql = if let Some(modalities) = modalities {
            let placeholders = vec!["?"; modalities.len()].join(",");
            params_vec.extend(modalities.iter().map(|m| m.as_str().to_string()));
            format!(
                r"
                SELECT m.chunk_id, m.doc_id, m.modality, m.converted_path,
                       m.locator_json, m.heading_json, m.doc_name, m.file_type,
                       f.text
                FROM chunks_meta m
                JOIN chunks_fts f ON m.chunk_id = f.chunk_id
                WHERE m.doc_id = ? AND m.modality IN ({placeholders})
                ORDER BY m.chunk_id
            "
            )
        } else {
            r"
            SELECT m.chunk_id, m.doc_id, m.modality, m.converted_path,
                   m.locator_json, m.heading_json, m.doc_name, m.file_type,
                   f.text
            FROM chunks_meta m
            JOIN chunks_fts f ON m.chunk_id = f.chunk_id
            WHERE m.doc_id = ?
            ORDER BY m.chunk_id
        "
            .to_string()
        };

        let mut stmt = self.conn.prepare(&sql).map_err(IndexError::from)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params_vec.iter()), |row| {
                Ok(StoredChunk {
                    chunk_id: row.get(0)?,
                    doc_id: row.get(1)?,
                    modality: row.get(2)?,
                    converted_path: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    locator: Self::parse_locator(
                        &row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    ),
                    heading_path: Self::parse_heading(
                        &row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    ),
                    doc_name: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    file_type: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                    text: row.get(8)?,
                })
            })
            .map_err(IndexError::from)?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row.map_err(IndexError::from)?);
        }

        chunks.sort_by(|a, b| {
            let ta = a
                .locator
                .as_ref()
                .and_then(Locator::time_start_secs)
                .unwrap_or(f64::INFINITY);
            let tb = b
                .locator
                .as_ref()
                .and_then(Locator::time_start_secs)
                .unwrap_or(f64::INFINITY);
            ta.partial_cmp(&tb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });

        Ok(chunks)
    }

    /// Total chunks in the metadata table.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn total_chunks(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks_meta", [], |row| row.get(0))
            .map_err(IndexError::from)?;
        Ok(count as usize)
    }

    /// Aggregate statistics: counts, modalities, file size, freshness.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn stats(&self) -> Result<IndexStats> {
        let chunk_count = self.total_chunks()?;
        let doc_count: i64 = self
            .conn
            .query_row("SELECT COUNT(DISTINCT doc_id) FROM chunks_meta", [], |row| {
                row.get(0)
            })
            .map_err(IndexError::from)?;
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT modality FROM chunks_meta ORDER BY modality")
            .map_err(IndexError::from)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(IndexError::from)?;
        let mut modalities = Vec::new();
        for row in rows {
            modalities.push(row.map_err(IndexError::from)?);
        }
        let last_indexed_at: Option<String> = self
            .conn
            .query_row("SELECT MAX(indexed_at) FROM chunks_meta", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(IndexError::from)?
            .flatten();
        let db_size_bytes = self
            .db_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map_or(0, |m| m.len());

        Ok(IndexStats {
            chunk_count,
            doc_count: doc_count as usize,
            modalities,
            db_size_bytes,
            last_indexed_at,
        })
    }

    /// Verifies the three tables hold identical chunk-id sets.
    ///
    /// A mismatch is an integrity signal, logged and surfaced in
    /// diagnostics, never a hard failure.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn verify_parity(&self) -> Result<bool> {
        let vec_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks_vec", [], |row| row.get(0))
            .map_err(IndexError::from)?;
        let meta_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks_meta", [], |row| row.get(0))
            .map_err(IndexError::from)?;
        let fts_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks_fts", [], |row| row.get(0))
            .map_err(IndexError::from)?;

        let matches = vec_count == meta_count && meta_count == fts_count;
        if !matches {
            warn!(vec_count, meta_count, fts_count, "index table parity mismatch");
        }
        Ok(matches)
    }
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}
