//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! For large collections, prefer the Qdrant backend.

use super::{check_dimensions, cosine_similarity, rank, CollectionInfo, Point, ScoredPoint, VectorStore};
use crate::error::{RagChatError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        dimensions INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS points (
        collection TEXT NOT NULL REFERENCES collections(name),
        id TEXT NOT NULL,
        payload TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    );
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RagChatError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn dimensions_of(conn: &Connection, collection: &str) -> Result<usize> {
        let dims: Option<i64> = conn
            .query_row(
                "SELECT dimensions FROM collections WHERE name = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;
        dims.map(|d| d as usize)
            .ok_or_else(|| RagChatError::CollectionNotFound(collection.to_string()))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self))]
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO collections (name, dimensions, created_at) VALUES (?1, ?2, ?3)",
            params![name, dimensions as i64, Utc::now().to_rfc3339()],
        )?;

        if inserted == 1 {
            info!("Created collection {} ({} dims)", name, dimensions);
        }
        Ok(inserted == 1)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM collections WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn list_collections(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt.query_map([], |row| row.get(0))?;
        Ok(names.collect::<std::result::Result<Vec<String>, _>>()?)
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let conn = self.lock()?;
        let dimensions = Self::dimensions_of(&conn, name)?;
        let points: i64 = conn.query_row(
            "SELECT COUNT(*) FROM points WHERE collection = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(CollectionInfo {
            name: name.to_string(),
            dimensions,
            points: points as usize,
        })
    }

    #[instrument(skip(self, point), fields(id = %point.id))]
    async fn upsert(&self, collection: &str, point: &Point) -> Result<()> {
        let conn = self.lock()?;
        let dimensions = Self::dimensions_of(&conn, collection)?;
        check_dimensions(collection, dimensions, point.vector.len())?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO points (collection, id, payload, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                collection,
                point.id.to_string(),
                serde_json::to_string(&point.payload)?,
                Self::embedding_to_bytes(&point.vector),
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!("Upserted point {} into {}", point.id, collection);
        Ok(())
    }

    #[instrument(skip(self, vector))]
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let conn = self.lock()?;
        Self::dimensions_of(&conn, collection)?;

        let mut stmt =
            conn.prepare("SELECT id, payload, embedding FROM points WHERE collection = ?1")?;

        let rows = stmt.query_map(params![collection], |row| {
            let id: String = row.get(0)?;
            let payload: String = row.get(1)?;
            let embedding: Vec<u8> = row.get(2)?;
            Ok((id, payload, embedding))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, payload, embedding) = row?;
            hits.push(ScoredPoint {
                id: uuid::Uuid::parse_str(&id).unwrap_or_default(),
                score: cosine_similarity(vector, &Self::bytes_to_embedding(&embedding)),
                payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
            });
        }

        let results = rank(hits, limit);
        debug!("Found {} matching points", results.len());
        Ok(results)
    }
}
