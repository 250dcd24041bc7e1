//! Record persistence.
use crate::record::Record;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store task: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for PersistenceError {
    fn from(e: tokio::task::JoinError) -> Self {
        PersistenceError::Task(e.to_string())
    }
}

/// A record as it is kept in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Assigned by the store, increasing with insertion order.
    pub id: i64,
    pub key: String,
    pub value: Option<String>,
}

impl StoredRecord {
    pub fn to_record(&self) -> Record {
        Record {
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

/// Write/read access to the local datastore.
///
/// `write` must keep every record it is given, in the given order.
/// `read_all` returns the whole store.
pub trait RecordStore: Send + Sync {
    fn write(&self, records: &[Record]) -> Result<(), PersistenceError>;
    fn read_all(&self) -> Result<Vec<StoredRecord>, PersistenceError>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        id    INTEGER PRIMARY KEY AUTOINCREMENT,
        key   TEXT NOT NULL,
        value TEXT
    );
";

/// Append-only sqlite store, rows are read back in insertion order.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        Self::bootstrap(conn)
    }

    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn count(&self) -> Result<usize, PersistenceError> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Close the underlying connection, flushing pending state.
    pub fn close(self) -> Result<(), PersistenceError> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| PersistenceError::Poisoned)?;
        conn.close().map_err(|(_, e)| PersistenceError::Sqlite(e))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::Poisoned)
    }
}

impl RecordStore for SqliteStore {
    fn write(&self, records: &[Record]) -> Result<(), PersistenceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO records (key, value) VALUES (?1, ?2)")?;
            for r in records {
                stmt.execute(params![r.key, r.value])?;
            }
        }
        tx.commit()?;
        log::debug!("stored {} records", records.len());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<StoredRecord>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, key, value FROM records ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredRecord {
                id: row.get(0)?,
                key: row.get(1)?,
                value: row.get(2)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let records = vec![
            Record::new("name", "Alice"),
            Record::new("age", "30\n"),
            Record::unpaired("trailing"),
        ];
        store.write(&records).unwrap();

        let stored = store.read_all().unwrap();
        let back = stored.iter().map(StoredRecord::to_record).collect::<Vec<_>>();
        assert_eq!(back, records);
        assert!(stored.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn appends_in_order() {
        let store = SqliteStore::in_memory().unwrap();
        store.write(&[Record::new("a", "1")]).unwrap();
        store.write(&[Record::new("a", "2"), Record::new("b", "3")]).unwrap();

        let keys = store
            .read_all()
            .unwrap()
            .into_iter()
            .map(|r| (r.key, r.value.unwrap()))
            .collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), "1".to_string()),
                ("a".to_string(), "2".to_string()),
                ("b".to_string(), "3".to_string()),
            ]
        );
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn empty_write() {
        let store = SqliteStore::in_memory().unwrap();
        store.write(&[]).unwrap();
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn reopen_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("footprint.db");

        let store = SqliteStore::open(&path).unwrap();
        store.write(&[Record::new("co2", "161.8")]).unwrap();
        store.close().unwrap();

        let store = SqliteStore::open(&path).unwrap();
        let stored = store.read_all().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].to_record(), Record::new("co2", "161.8"));
    }

    #[test]
    fn open_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("footprint.db");
        assert!(matches!(
            SqliteStore::open(&path),
            Err(PersistenceError::Sqlite(_))
        ));
    }
}
