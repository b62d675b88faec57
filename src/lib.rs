#![cfg_attr(docsrs, feature(doc_cfg))]
//! `lockstep` is a code-first library for driving database schema migrations.
//!
//! Core concepts:
//! - A [`Migration`] is a versioned pair of forward and reverse actions. Each
//!   action receives a live connection to the database, allowing more
//!   expressive migration logic than just preparing SQL statements: a
//!   migration can query the data, transform it in Rust, and write it back.
//! - A [`VersionStore`] is the persistent registry of applied versions plus a
//!   coarse advisory lock. The [`Migrator`] drives any store satisfying the
//!   contract; the SQLite backend in [`sqlite`] is the reference
//!   implementation.
//! - The [`Migrator`] validates the migration list, takes the advisory lock,
//!   plans against the store's current version, executes the plan step by
//!   step with per-step version bookkeeping, and releases the lock on every
//!   exit path (unless configured to hold it for post-failure diagnosis).
//!
//! Concurrent operators are serialized by the store's advisory lock: a second
//! `up` or `down` against a locked store fails fast with a lock-contention
//! error rather than interleaving. A failed step leaves the store at the last
//! successfully recorded version; actions are expected to be internally
//! transactional or idempotent on retry.
//!
//! # Example
//!
//! ```
//! use lockstep::sqlite::SqliteStore;
//! use lockstep::{CancellationToken, Migration, Migrator, VersionStore};
//! use rusqlite::Connection;
//!
//! // define migrations as versioned pairs of actions
//! let migrations = vec![
//!     Migration::new(1)
//!         .with_name("create users")
//!         .with_up(|_token: &CancellationToken, conn: &mut Connection| {
//!             conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", [])?;
//!             Ok(())
//!         })
//!         .with_down(|_token: &CancellationToken, conn: &mut Connection| {
//!             conn.execute("DROP TABLE users", [])?;
//!             Ok(())
//!         }),
//!     Migration::new(2)
//!         .with_name("add email column")
//!         .with_up(|_token: &CancellationToken, conn: &mut Connection| {
//!             conn.execute("ALTER TABLE users ADD COLUMN email TEXT", [])?;
//!             Ok(())
//!         })
//!         .with_down(|_token: &CancellationToken, conn: &mut Connection| {
//!             conn.execute("ALTER TABLE users DROP COLUMN email", [])?;
//!             Ok(())
//!         }),
//! ];
//!
//! // connect to the database and run everything pending
//! let conn = Connection::open_in_memory().unwrap();
//! let mut migrator = Migrator::new(SqliteStore::new(conn), migrations);
//! let token = CancellationToken::new();
//! migrator.up(&token, i64::MAX).unwrap();
//!
//! // assert the migration logic was applied to the database
//! let store = migrator.store_mut();
//! assert_eq!(store.version(&token).unwrap(), 2);
//!
//! // revert back past version 2
//! migrator.down(&token, 1).unwrap();
//! assert_eq!(migrator.store_mut().version(&token).unwrap(), 1);
//! ```
//!
//! For SQL-only migrations the [`sql_migration!`] macro removes the closure
//! boilerplate.
//!
//! # Targets
//!
//! `up(token, to)` applies every migration whose version `v` satisfies
//! `current < v <= to`, in version order; a target at or below the current
//! version applies nothing and succeeds. `down(token, to)` reverts from the
//! current version down to, but not including, `to`, in reverse version
//! order; the sentinel `to = -1` means "revert everything", and any other
//! target must name a version present in the migration list.
//!
//! # Features
//!
//! - `sqlite` (default) - the SQLite version store backend and the
//!   [`sql_migration!`] macro.
//! - `tracing` - structured logging of driver decisions and steps via the
//!   `tracing` crate.
//! - `testing` - the [`testing`] module with an in-memory version store for
//!   exercising migration logic without a database.

mod cancel;
pub use cancel::CancellationToken;

mod error;
pub use error::Error;

mod migration;
pub use migration::{Migration, MigrationFn};

mod store;
pub use store::VersionStore;

mod migrator;
pub use migrator::Migrator;

#[cfg(feature = "sqlite")]
mod macros;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(any(test, feature = "testing"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;
