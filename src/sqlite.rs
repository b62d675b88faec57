//! SQLite version store backend.
//!
//! [`SqliteStore`] keeps the advisory lock and the applied-version history in
//! two tables on the same connection that migration actions run against. The
//! lock is a single fixed-id row: inserting it acquires the lock, a unique
//! constraint violation on that insert means another operator holds it, and
//! deleting it releases. The history table holds one row per applied version
//! with an RFC 3339 `applied_at` timestamp.
//!
//! # Example
//! ```
//! use lockstep::sqlite::SqliteStore;
//! use lockstep::{CancellationToken, Migration, Migrator};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let store = SqliteStore::new(conn);
//!
//! let migrations = vec![Migration::new(1)
//!     .with_name("create users")
//!     .with_up(|_token: &CancellationToken, conn: &mut Connection| {
//!         conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", [])?;
//!         Ok(())
//!     })
//!     .with_down(|_token: &CancellationToken, conn: &mut Connection| {
//!         conn.execute("DROP TABLE users", [])?;
//!         Ok(())
//!     })];
//!
//! let mut migrator = Migrator::new(store, migrations);
//! migrator.up(&CancellationToken::new(), 1).unwrap();
//! ```

use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::store::VersionStore;
use chrono::Utc;
use rusqlite::{params, Connection};

pub(crate) const DEFAULT_LOCK_TABLE_NAME: &str = "schema_lock";
pub(crate) const DEFAULT_VERSION_TABLE_NAME: &str = "schema_migrations";

/// A migration version recorded as applied in the history table.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMigration {
    /// The version number of the migration.
    pub version: i64,
    /// The timestamp when the migration was applied.
    pub applied_at: chrono::DateTime<Utc>,
}

/// A [`VersionStore`] backed by a SQLite database via `rusqlite`.
///
/// The store owns the [`Connection`]; migration actions borrow it through the
/// driver for the duration of one action call. Table names are configurable
/// for applications that already reserve the defaults.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    lock_table_name: String,
    version_table_name: String,
    busy_timeout: std::time::Duration,
}

impl SqliteStore {
    /// Create a store over the given connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            lock_table_name: DEFAULT_LOCK_TABLE_NAME.to_string(),
            version_table_name: DEFAULT_VERSION_TABLE_NAME.to_string(),
            busy_timeout: std::time::Duration::from_secs(30),
        }
    }

    /// Set a custom name for the advisory lock table.
    /// Defaults to "schema_lock".
    pub fn with_lock_table_name(mut self, name: impl Into<String>) -> Self {
        self.lock_table_name = name.into();
        self
    }

    /// Set a custom name for the applied-version history table.
    /// Defaults to "schema_migrations".
    pub fn with_version_table_name(mut self, name: impl Into<String>) -> Self {
        self.version_table_name = name.into();
        self
    }

    /// Set the busy timeout applied to the connection during `init`.
    /// This controls how long concurrent statements wait for SQLite's own
    /// file locks instead of failing immediately. Defaults to 30 seconds.
    pub fn with_busy_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Consume the store and hand back its connection.
    pub fn into_conn(self) -> Connection {
        self.conn
    }

    /// The history of applied migrations, ordered by version.
    /// Returns an empty vector when nothing has been applied.
    pub fn history(&mut self, token: &CancellationToken) -> Result<Vec<AppliedMigration>, Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT version, applied_at FROM {} ORDER BY version",
            self.version_table_name
        ))?;
        let rows = stmt
            .query_map([], |row| {
                let applied_at_str: String = row.get(1)?;
                let applied_at = chrono::DateTime::parse_from_rfc3339(&applied_at_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc);
                Ok(AppliedMigration {
                    version: row.get(0)?,
                    applied_at,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl VersionStore for SqliteStore {
    type Conn = Connection;

    fn conn(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn init(&mut self, token: &CancellationToken) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        // Concurrent statements wait on SQLite's file locks instead of
        // failing immediately.
        self.conn.busy_timeout(self.busy_timeout)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY NOT NULL)",
                self.lock_table_name
            ),
            [],
        )?;
        tx.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (version INTEGER PRIMARY KEY NOT NULL, applied_at TEXT NOT NULL)",
                self.version_table_name
            ),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn lock(&mut self, token: &CancellationToken) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.conn.execute(
            &format!("INSERT INTO {} (id) VALUES (1)", self.lock_table_name),
            [],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Locked)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn release(&mut self, token: &CancellationToken) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.conn.execute(
            &format!("DELETE FROM {} WHERE id = 1", self.lock_table_name),
            [],
        )?;
        Ok(())
    }

    fn version(&mut self, token: &CancellationToken) -> Result<i64, Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let version: Option<i64> = self.conn.query_row(
            &format!("SELECT MAX(version) FROM {}", self.version_table_name),
            [],
            |row| row.get(0),
        )?;
        version.ok_or(Error::InitialVersion)
    }

    fn insert(&mut self, token: &CancellationToken, version: i64) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.conn.execute(
            &format!(
                "INSERT INTO {} (version, applied_at) VALUES (?1, ?2)",
                self.version_table_name
            ),
            params![version, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&mut self, token: &CancellationToken, version: i64) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.conn.execute(
            &format!("DELETE FROM {} WHERE version = ?1", self.version_table_name),
            params![version],
        )?;
        Ok(())
    }
}
