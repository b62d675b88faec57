//! Convenience macro for defining SQL-only migrations.

/// Define a simple SQL-only migration unit.
///
/// This macro reduces boilerplate for migrations that consist of plain SQL
/// statements executed against the SQLite connection. It expands to a
/// [`Migration`](crate::Migration)`<rusqlite::Connection>` value with the
/// given version and name.
///
/// # Basic Usage
///
/// ```
/// use lockstep::sql_migration;
///
/// let migration = sql_migration!(1, "create users",
///     up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
///     down: "DROP TABLE users"
/// );
/// assert_eq!(migration.version(), 1);
/// ```
///
/// # Multiple Statements
///
/// For migrations with multiple SQL statements, use an array:
///
/// ```
/// use lockstep::sql_migration;
///
/// let migration = sql_migration!(1, "create initial schema",
///     up: [
///         "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
///         "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)",
///         "CREATE INDEX idx_posts_user ON posts(user_id)"
///     ],
///     down: [
///         "DROP INDEX idx_posts_user",
///         "DROP TABLE posts",
///         "DROP TABLE users"
///     ]
/// );
/// ```
///
/// # Up-Only Migrations
///
/// If a migration doesn't need a `down` implementation (common for
/// production systems), omit the `down` clause. Reverting through such a
/// unit fails with the missing-down error:
///
/// ```
/// use lockstep::sql_migration;
///
/// let migration = sql_migration!(1, "create users",
///     up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"
/// );
/// ```
///
/// # When to Use This Macro
///
/// Use `sql_migration!` when the migration is pure SQL with no Rust logic.
/// For migrations that need to query data, transform it in Rust, and write
/// it back, construct a [`Migration`](crate::Migration) directly with
/// closures.
#[cfg(feature = "sqlite")]
#[macro_export]
macro_rules! sql_migration {
    // Array of statements, with down
    ($version:expr, $name:expr,
        up: [$($up_sql:expr),* $(,)?],
        down: [$($down_sql:expr),* $(,)?] $(,)?
    ) => {
        $crate::Migration::<::rusqlite::Connection>::new($version)
            .with_name($name)
            .with_up(
                |_token: &$crate::CancellationToken, conn: &mut ::rusqlite::Connection| {
                    $(conn.execute($up_sql, [])?;)*
                    Ok(())
                },
            )
            .with_down(
                |_token: &$crate::CancellationToken, conn: &mut ::rusqlite::Connection| {
                    $(conn.execute($down_sql, [])?;)*
                    Ok(())
                },
            )
    };

    // Array of statements, up only
    ($version:expr, $name:expr,
        up: [$($up_sql:expr),* $(,)?] $(,)?
    ) => {
        $crate::Migration::<::rusqlite::Connection>::new($version)
            .with_name($name)
            .with_up(
                |_token: &$crate::CancellationToken, conn: &mut ::rusqlite::Connection| {
                    $(conn.execute($up_sql, [])?;)*
                    Ok(())
                },
            )
    };

    // Single statement, with down
    ($version:expr, $name:expr, up: $up_sql:expr, down: $down_sql:expr $(,)?) => {
        $crate::sql_migration!($version, $name, up: [$up_sql], down: [$down_sql])
    };

    // Single statement, up only
    ($version:expr, $name:expr, up: $up_sql:expr $(,)?) => {
        $crate::sql_migration!($version, $name, up: [$up_sql])
    };
}
