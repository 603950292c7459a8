//! porteiro-store — SQLite persistence for the resident roster and the
//! append-only access log.
//!
//! Each operation commits immediately (rusqlite autocommit); a resident
//! that failed to persist is never treated as enrolled. Signature blobs
//! are the fixed-width codec from `porteiro-core` and round-trip
//! byte-for-byte.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use porteiro_core::{AccessEvent, Resident, Signature, SignatureError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("stored signature for resident {id} is malformed: {source}")]
    CorruptSignature {
        id: i64,
        source: SignatureError,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS residents (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL,
    unit      TEXT NOT NULL,
    block     TEXT NOT NULL,
    signature BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS access_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    resident_id INTEGER REFERENCES residents (id),
    timestamp   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    authorized  BOOLEAN NOT NULL
);
"#;

/// SQLite-backed roster store.
///
/// All methods take `&self` behind an internal `Mutex<Connection>`;
/// writes are synchronous and fast for this workload.
pub struct RosterStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for RosterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterStore").finish()
    }
}

impl RosterStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.as_ref().display(), "roster store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new resident and return the assigned id.
    pub fn insert_resident(
        &self,
        name: &str,
        unit: &str,
        block: &str,
        signature: &Signature,
    ) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO residents (name, unit, block, signature) VALUES (?1, ?2, ?3, ?4)",
            params![name, unit, block, signature.to_bytes()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All enrolled residents in insertion order.
    ///
    /// A malformed signature blob is a load error: it would otherwise
    /// violate the matcher's dimensionality precondition.
    pub fn all_residents(&self) -> Result<Vec<Resident>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, name, unit, block, signature FROM residents ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let unit: String = row.get(2)?;
            let block: String = row.get(3)?;
            let blob: Vec<u8> = row.get(4)?;
            Ok((id, name, unit, block, blob))
        })?;

        let mut residents = Vec::new();
        for row in rows {
            let (id, name, unit, block, blob) = row?;
            let signature = Signature::from_bytes(&blob)
                .map_err(|source| StoreError::CorruptSignature { id, source })?;
            residents.push(Resident {
                id,
                name,
                unit,
                block,
                signature,
            });
        }
        Ok(residents)
    }

    /// Look up a single resident by id.
    pub fn resident(&self, id: i64) -> Result<Option<Resident>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, name, unit, block, signature FROM residents WHERE id = ?1",
                params![id],
                |row| {
                    let id: i64 = row.get(0)?;
                    let name: String = row.get(1)?;
                    let unit: String = row.get(2)?;
                    let block: String = row.get(3)?;
                    let blob: Vec<u8> = row.get(4)?;
                    Ok((id, name, unit, block, blob))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((id, name, unit, block, blob)) => {
                let signature = Signature::from_bytes(&blob)
                    .map_err(|source| StoreError::CorruptSignature { id, source })?;
                Ok(Some(Resident {
                    id,
                    name,
                    unit,
                    block,
                    signature,
                }))
            }
        }
    }

    /// Append one access event. `resident_id` is `None` for decisions not
    /// tied to a known resident (no caller writes such rows today).
    pub fn append_access_event(
        &self,
        resident_id: Option<i64>,
        authorized: bool,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO access_events (resident_id, timestamp, authorized) VALUES (?1, ?2, ?3)",
            params![resident_id, Utc::now().to_rfc3339(), authorized],
        )?;
        Ok(())
    }

    /// The most recent access events, newest first, up to `limit`.
    pub fn recent_access_events(&self, limit: usize) -> Result<Vec<AccessEvent>, StoreError> {
        let conn = self.lock()?;
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT id, resident_id, timestamp, authorized FROM access_events
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit_i64], |row| {
            Ok(AccessEvent {
                id: row.get(0)?,
                resident_id: row.get(1)?,
                timestamp: row.get(2)?,
                authorized: row.get(3)?,
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Total number of logged access events.
    pub fn access_event_count(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM access_events", [], |row| row.get(0))?;
        Ok(count)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}
