//! Database persistence layer for GiveChain

use crate::blockchain::Block;
use crate::error::ChainError;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::sync::{Arc, Mutex};

/// Durable, ordered, append-only block storage keyed by index.
///
/// Implementations must enforce index uniqueness themselves: `append` on an
/// occupied index fails with `ChainError::StoreConflict`. A block is either
/// fully visible to readers or not visible at all.
pub trait LedgerStore: Send + Sync {
    /// Creates the backing table if it does not exist yet.
    fn ensure_schema(&self) -> Result<(), ChainError>;
    fn load(&self, index: u64) -> Result<Option<Block>, ChainError>;
    /// Block with the highest index, `None` when the store is empty.
    fn load_latest(&self) -> Result<Option<Block>, ChainError>;
    fn append(&self, block: &Block) -> Result<(), ChainError>;
    /// All blocks ordered by index ascending.
    fn load_all(&self) -> Result<Vec<Block>, ChainError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

type BlockRow = (i64, i64, String, String, String, i64);

const SELECT_BLOCK: &str =
    "SELECT block_index, timestamp, data, previous_hash, hash, nonce FROM blocks";

impl Database {
    pub fn open(path: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        let db = Database { conn: Mutex::new(conn) };
        db.create_tables()?;
        Ok(db)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ChainError> {
        self.conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))
    }

    fn create_tables(&self) -> Result<(), ChainError> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                block_index INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                data TEXT NOT NULL,
                previous_hash TEXT NOT NULL,
                hash TEXT NOT NULL,
                nonce INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create blocks table: {}", e)))?;
        Ok(())
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlockRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn into_block(row: BlockRow) -> Result<Block, ChainError> {
        let (index, timestamp, data_json, previous_hash, hash, nonce) = row;
        let data = serde_json::from_str(&data_json).map_err(|e| {
            ChainError::DatabaseError(format!("Failed to deserialize data of block {}: {}", index, e))
        })?;

        Ok(Block {
            index: index as u64,
            timestamp,
            data,
            previous_hash,
            hash,
            nonce: nonce as u64,
        })
    }

    fn query_one(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Option<Block>, ChainError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(sql, args, Self::read_row)
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to load block: {}", e)))?;
        drop(conn);

        row.map(Self::into_block).transpose()
    }
}

impl LedgerStore for Database {
    fn ensure_schema(&self) -> Result<(), ChainError> {
        self.create_tables()
    }

    fn load(&self, index: u64) -> Result<Option<Block>, ChainError> {
        let sql = format!("{} WHERE block_index = ?1", SELECT_BLOCK);
        self.query_one(&sql, &[&(index as i64)])
    }

    fn load_latest(&self) -> Result<Option<Block>, ChainError> {
        let sql = format!("{} ORDER BY block_index DESC LIMIT 1", SELECT_BLOCK);
        self.query_one(&sql, &[])
    }

    fn append(&self, block: &Block) -> Result<(), ChainError> {
        let data_json = serde_json::to_string(&block.data).map_err(|e| {
            ChainError::Serialization(format!("Failed to serialize block data: {}", e))
        })?;

        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO blocks (block_index, timestamp, data, previous_hash, hash, nonce)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                block.index as i64,
                block.timestamp,
                data_json,
                block.previous_hash,
                block.hash,
                block.nonce as i64,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Err(ChainError::StoreConflict { index: block.index })
            }
            Err(e) => Err(ChainError::DatabaseError(format!("Failed to save block: {}", e))),
        }
    }

    fn load_all(&self) -> Result<Vec<Block>, ChainError> {
        let conn = self.lock()?;
        let sql = format!("{} ORDER BY block_index ASC", SELECT_BLOCK);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], Self::read_row)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to query blocks: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to load block: {}", e)))?;

        rows.into_iter().map(Self::into_block).collect()
    }
}

/// Simple in-memory store useful for tests and ephemeral runs.
///
/// Clones share the same underlying vector.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    pub blocks: Arc<Mutex<Vec<Block>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Vec<Block>>, ChainError> {
        self.blocks
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))
    }
}

impl LedgerStore for InMemoryPersistence {
    fn ensure_schema(&self) -> Result<(), ChainError> {
        Ok(())
    }

    fn load(&self, index: u64) -> Result<Option<Block>, ChainError> {
        Ok(self.guard()?.iter().find(|b| b.index == index).cloned())
    }

    fn load_latest(&self) -> Result<Option<Block>, ChainError> {
        Ok(self.guard()?.iter().max_by_key(|b| b.index).cloned())
    }

    fn append(&self, block: &Block) -> Result<(), ChainError> {
        let mut blocks = self.guard()?;
        if blocks.iter().any(|b| b.index == block.index) {
            return Err(ChainError::StoreConflict { index: block.index });
        }
        // Keep ascending order even if a caller appends out of order.
        let pos = blocks.partition_point(|b| b.index < block.index);
        blocks.insert(pos, block.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Block>, ChainError> {
        Ok(self.guard()?.clone())
    }
}
