use domain::error::StoreError;
use domain::models::{Chunk, ChunkMetadata, Embedding};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Result as SqlResult};
use std::path::Path;

fn storage_err(err: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(err.to_string())
}

/// sqlite file holding one row per indexed chunk.
pub struct EmbeddingStorage {
    conn: Connection,
}

impl EmbeddingStorage {
    /// Create (or truncate into) a fresh store file.
    pub fn create(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }
        let conn = Connection::open(db_path).map_err(storage_err)?;
        Self::setup_db(&conn).map_err(storage_err)?;
        Ok(Self { conn })
    }

    /// Open an existing store file read-only.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(storage_err)?;
        Ok(Self { conn })
    }

    fn setup_db(conn: &Connection) -> SqlResult<()> {
        conn.execute_batch(
            "
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            DROP TABLE IF EXISTS embeddings;
            DROP TABLE IF EXISTS store_meta;
            CREATE TABLE embeddings (
                id TEXT PRIMARY KEY,
                vector BLOB NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL
            );
            CREATE TABLE store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        ",
        )
    }

    pub fn insert_embeddings(&self, embeddings: &[Embedding]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction().map_err(storage_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO embeddings (id, vector, text, metadata) VALUES (?, ?, ?, ?)",
                )
                .map_err(storage_err)?;
            for embedding in embeddings {
                let vector_bytes = serde_json::to_vec(&embedding.vector).map_err(storage_err)?;
                let metadata =
                    serde_json::to_string(&embedding.chunk.metadata).map_err(storage_err)?;
                stmt.execute(params![
                    embedding.id,
                    vector_bytes,
                    embedding.chunk.text,
                    metadata
                ])
                .map_err(storage_err)?;
            }
        }
        tx.commit().map_err(storage_err)?;
        Ok(())
    }

    pub fn get_all_embeddings(&self) -> Result<Vec<Embedding>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, vector, text, metadata FROM embeddings ORDER BY rowid")
            .map_err(storage_err)?;
        let mut rows = stmt.query([]).map_err(storage_err)?;
        let mut embeddings = Vec::new();
        while let Some(row) = rows.next().map_err(storage_err)? {
            let id: String = row.get(0).map_err(storage_err)?;
            let vector_bytes: Vec<u8> = row.get(1).map_err(storage_err)?;
            let text: String = row.get(2).map_err(storage_err)?;
            let metadata: String = row.get(3).map_err(storage_err)?;
            let vector: Vec<f32> = serde_json::from_slice(&vector_bytes).map_err(storage_err)?;
            let metadata: ChunkMetadata = serde_json::from_str(&metadata).map_err(storage_err)?;
            embeddings.push(Embedding {
                id,
                vector,
                chunk: Chunk::new(text, metadata),
            });
        }
        Ok(embeddings)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)
    }
}
