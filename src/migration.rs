use crate::cancel::CancellationToken;
use crate::error::Error;

/// The signature of a migration action.
///
/// Actions receive the run's [`CancellationToken`] and a mutable borrow of the
/// store's database connection, and return the action's outcome verbatim.
pub type MigrationFn<C> =
    Box<dyn Fn(&CancellationToken, &mut C) -> Result<(), Error> + Send + Sync>;

/// A single migration unit: a version number plus forward and reverse actions.
///
/// Both actions are optional at construction time; invoking a missing action
/// fails. This lets up-only migration sets coexist with reversible ones in the
/// same list, with the failure surfacing only when a rollback actually reaches
/// the unit.
///
/// The connection type `C` is the [`VersionStore::Conn`](crate::VersionStore::Conn)
/// of the store the unit will run against.
///
/// # Example
/// ```
/// use lockstep::{CancellationToken, Migration};
/// use rusqlite::Connection;
///
/// let migration = Migration::new(1)
///     .with_name("create users")
///     .with_up(|_token: &CancellationToken, conn: &mut Connection| {
///         conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", [])?;
///         Ok(())
///     })
///     .with_down(|_token: &CancellationToken, conn: &mut Connection| {
///         conn.execute("DROP TABLE users", [])?;
///         Ok(())
///     });
/// assert_eq!(migration.version(), 1);
/// ```
pub struct Migration<C> {
    version: i64,
    name: Option<String>,
    up: Option<MigrationFn<C>>,
    down: Option<MigrationFn<C>>,
}

impl<C> Migration<C> {
    /// Create a migration unit with the given version and no actions.
    pub fn new(version: i64) -> Self {
        Self {
            version,
            name: None,
            up: None,
            down: None,
        }
    }

    /// Set a display name for this migration. Only aids debugging and
    /// observability; defaults to `"Migration {version}"`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the forward action.
    pub fn with_up<F>(mut self, f: F) -> Self
    where
        F: Fn(&CancellationToken, &mut C) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.up = Some(Box::new(f));
        self
    }

    /// Set the reverse action.
    pub fn with_down<F>(mut self, f: F) -> Self
    where
        F: Fn(&CancellationToken, &mut C) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.down = Some(Box::new(f));
        self
    }

    /// The version number of this migration.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// The display name of this migration.
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Migration {}", self.version))
    }

    /// Invoke the forward action, forwarding its outcome verbatim.
    /// Fails when no forward action was supplied.
    pub fn up(&self, token: &CancellationToken, conn: &mut C) -> Result<(), Error> {
        match &self.up {
            Some(f) => f(token, conn),
            None => Err(Error::Generic(format!(
                "migration {}: missing up func",
                self.version
            ))),
        }
    }

    /// Invoke the reverse action, forwarding its outcome verbatim.
    /// Fails when no reverse action was supplied.
    pub fn down(&self, token: &CancellationToken, conn: &mut C) -> Result<(), Error> {
        match &self.down {
            Some(f) => f(token, conn),
            None => Err(Error::Generic(format!(
                "migration {}: missing down func",
                self.version
            ))),
        }
    }
}

// Manual Debug impl since actions don't implement Debug
impl<C> std::fmt::Debug for Migration<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name())
            .field("up", &self.up.is_some())
            .field("down", &self.down.is_some())
            .finish()
    }
}

impl<C> PartialEq for Migration<C> {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_forwards_to_the_action() {
        let migration: Migration<()> = Migration::new(1).with_up(|_, _| Ok(()));
        let token = CancellationToken::new();
        assert!(migration.up(&token, &mut ()).is_ok());
    }

    #[test]
    fn up_forwards_the_action_error() {
        let migration: Migration<()> =
            Migration::new(1).with_up(|_, _| Err(Error::Generic("bad statement".to_string())));
        let token = CancellationToken::new();
        let err = migration.up(&token, &mut ()).unwrap_err();
        assert_eq!(err, Error::Generic("bad statement".to_string()));
    }

    #[test]
    fn missing_up_func() {
        let migration: Migration<()> = Migration::new(42).with_down(|_, _| Ok(()));
        let token = CancellationToken::new();
        let err = migration.up(&token, &mut ()).unwrap_err();
        assert_eq!(err.to_string(), "migration 42: missing up func");
    }

    #[test]
    fn missing_down_func() {
        let migration: Migration<()> = Migration::new(42).with_up(|_, _| Ok(()));
        let token = CancellationToken::new();
        let err = migration.down(&token, &mut ()).unwrap_err();
        assert_eq!(err.to_string(), "migration 42: missing down func");
    }

    #[test]
    fn token_reaches_the_action() {
        let migration: Migration<()> = Migration::new(1).with_up(|token, _| {
            if token.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                Ok(())
            }
        });
        let token = CancellationToken::new();
        assert!(migration.up(&token, &mut ()).is_ok());
        token.cancel();
        assert_eq!(migration.up(&token, &mut ()).unwrap_err(), Error::Cancelled);
    }

    #[test]
    fn default_name_includes_version() {
        let migration: Migration<()> = Migration::new(7);
        assert_eq!(migration.name(), "Migration 7");
        let named: Migration<()> = Migration::new(7).with_name("add index");
        assert_eq!(named.name(), "add index");
    }

    #[test]
    fn equality_is_by_version() {
        let a: Migration<()> = Migration::new(1).with_up(|_, _| Ok(()));
        let b: Migration<()> = Migration::new(1);
        let c: Migration<()> = Migration::new(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
