//! SQLite-backed metadata store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ffi, params};
use tracing::debug;

use omnifile_core::{FileRecord, Protocol, ProtocolStats, Timestamps};

use crate::store::{MetadataStore, StoreError};

/// SQL to create the records table.
/// The unique path index is not part of the table; see
/// [`MetadataStore::create_unique_index_on_path`].
const CREATE_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY,
    path TEXT,
    name TEXT NOT NULL,
    extension TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,    -- microseconds since the Unix epoch
    modified_at INTEGER NOT NULL,
    accessed_at INTEGER NOT NULL,
    is_read_only INTEGER NOT NULL,
    is_hidden INTEGER NOT NULL,
    is_system INTEGER NOT NULL,
    is_directory INTEGER NOT NULL,
    owner TEXT,
    permissions TEXT,
    protocol TEXT NOT NULL,
    remote_host TEXT,
    remote_port INTEGER,
    remote_user TEXT,
    connection_string TEXT,
    host TEXT,
    ip TEXT,
    mac TEXT,
    read_at INTEGER
)
"#;

const CREATE_READ_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_records_read_at ON records(read_at)";

const CREATE_PATH_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_records_path ON records(path)";

const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
"#;

const COLUMNS: &str = "path, name, extension, size, created_at, modified_at, accessed_at, \
     is_read_only, is_hidden, is_system, is_directory, owner, permissions, protocol, \
     remote_host, remote_port, remote_user, connection_string, host, ip, mac, read_at";

const INSERT_RECORD: &str = "INSERT INTO records (path, name, extension, size, created_at, \
     modified_at, accessed_at, is_read_only, is_hidden, is_system, is_directory, owner, \
     permissions, protocol, remote_host, remote_port, remote_user, connection_string, host, ip, \
     mac, read_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
     ?16, ?17, ?18, ?19, ?20, ?21, ?22)";

/// Metadata store over a single SQLite database.
///
/// The connection sits behind a mutex; concurrent indexers serialise on it
/// and the unique path index arbitrates between them.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        conn.execute_batch(PRAGMAS)?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(CREATE_RECORDS_TABLE, [])?;
        conn.execute(CREATE_READ_AT_INDEX, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn select_one(
        &self,
        clause: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<FileRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {COLUMNS} FROM records {clause} LIMIT 1");
        let record = conn.query_row(&sql, params, read_record).optional()?;
        Ok(record)
    }
}

impl MetadataStore for SqliteStore {
    fn count_all(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(from_sql_int(count))
    }

    fn find_by_path(&self, path: &str) -> Result<Option<FileRecord>, StoreError> {
        self.select_one("WHERE path = ?1", [path])
    }

    fn insert_one(&self, record: &FileRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(INSERT_RECORD)?;
        let result = stmt.execute(params![
            record.path,
            record.name.as_str(),
            record.extension.as_str(),
            to_sql_int(record.size),
            record.timestamps.created.timestamp_micros(),
            record.timestamps.modified.timestamp_micros(),
            record.timestamps.accessed.timestamp_micros(),
            record.is_read_only,
            record.is_hidden,
            record.is_system,
            record.is_directory,
            record.owner,
            record.permissions,
            record.protocol.to_string(),
            record.remote_host,
            record.remote_port,
            record.remote_user,
            record.connection_string,
            record.host,
            record.ip,
            record.mac,
            record.read_at.map(|t| t.timestamp_micros()),
        ]);

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(StoreError::DuplicateKey {
                    path: record.path.clone(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn delete_all(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM records", [])?;
        Ok(removed as u64)
    }

    fn create_unique_index_on_path(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(CREATE_PATH_INDEX, [])?;
        Ok(())
    }

    fn find_most_recent(&self) -> Result<Option<FileRecord>, StoreError> {
        self.select_one(
            "WHERE read_at IS NOT NULL ORDER BY read_at DESC, id DESC",
            params![],
        )
    }

    fn aggregate_by_protocol(&self) -> Result<BTreeMap<String, ProtocolStats>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT protocol,
                    SUM(CASE WHEN is_directory THEN 0 ELSE 1 END),
                    SUM(CASE WHEN is_directory THEN 1 ELSE 0 END),
                    COALESCE(SUM(size), 0)
             FROM records
             GROUP BY protocol",
        )?;
        let rows = stmt.query_map([], |row| {
            let protocol: String = row.get(0)?;
            let stats = ProtocolStats {
                files: from_sql_int(row.get(1)?),
                directories: from_sql_int(row.get(2)?),
                total_size: from_sql_int(row.get(3)?),
            };
            Ok((protocol, stats))
        })?;

        let mut stats = BTreeMap::new();
        for row in rows {
            let (protocol, entry) = row?;
            stats.insert(protocol, entry);
        }
        Ok(stats)
    }

    fn remove_duplicates(&self) -> Result<u64, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let without_path = tx.execute("DELETE FROM records WHERE path IS NULL OR path = ''", [])?;
        let duplicates = tx.execute(
            "DELETE FROM records WHERE id NOT IN (SELECT MIN(id) FROM records GROUP BY path)",
            [],
        )?;
        tx.commit()?;

        debug!(without_path, duplicates, "Removed duplicate records");
        Ok((without_path + duplicates) as u64)
    }
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let path: Option<String> = row.get(0)?;
    let protocol: String = row.get(13)?;
    let protocol = Protocol::parse(&protocol)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(13, Type::Text, Box::new(e)))?;

    Ok(FileRecord {
        name: row.get::<_, String>(1)?.into(),
        extension: row.get::<_, String>(2)?.into(),
        size: from_sql_int(row.get(3)?),
        timestamps: Timestamps {
            created: from_micros(row.get(4)?),
            modified: from_micros(row.get(5)?),
            accessed: from_micros(row.get(6)?),
        },
        is_read_only: row.get(7)?,
        is_hidden: row.get(8)?,
        is_system: row.get(9)?,
        is_directory: row.get(10)?,
        owner: row.get(11)?,
        permissions: row.get(12)?,
        path: path.unwrap_or_default(),
        protocol,
        remote_host: row.get(14)?,
        remote_port: row.get(15)?,
        remote_user: row.get(16)?,
        connection_string: row.get(17)?,
        host: row.get(18)?,
        ip: row.get(19)?,
        mac: row.get(20)?,
        read_at: row.get::<_, Option<i64>>(21)?.map(from_micros),
    })
}

// SQLite integers are signed 64-bit
fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
