//! Testing utilities for driver and migration development.
//!
//! This module provides [`MemoryStore`], an in-memory [`VersionStore`] with
//! call counting and per-operation failure injection. It is what this crate's
//! own driver tests run against, and is exported under the `testing` feature
//! so downstream code can exercise migration logic without a database.

use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::store::VersionStore;

/// The observable state of a [`MemoryStore`]: the applied version set, the
/// advisory lock, a journal of applied and reverted versions, and a call
/// count per store operation.
///
/// Counts increment before any injected hook runs, so a hook can key off
/// "the second call" by comparing against the count it observes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryState {
    /// The applied version set, in insertion order.
    pub versions: Vec<i64>,
    /// Every version recorded through `insert`, in call order.
    pub applied: Vec<i64>,
    /// Every version erased through `remove`, in call order.
    pub reverted: Vec<i64>,
    /// Whether the advisory lock is currently held.
    pub locked: bool,

    pub init_calls: u32,
    pub lock_calls: u32,
    pub release_calls: u32,
    pub version_calls: u32,
    pub insert_calls: u32,
    pub remove_calls: u32,
}

impl MemoryState {
    /// The stock `lock` behavior: fail with [`Error::Locked`] when held,
    /// otherwise take the lock.
    pub fn default_lock(&mut self) -> Result<(), Error> {
        if self.locked {
            return Err(Error::Locked);
        }
        self.locked = true;
        Ok(())
    }

    /// The stock `release` behavior: drop the lock, held or not.
    pub fn default_release(&mut self) {
        self.locked = false;
    }

    /// The stock `version` behavior: the most recently recorded version, or
    /// [`Error::InitialVersion`] when nothing has been applied.
    pub fn default_version(&self) -> Result<i64, Error> {
        self.versions.last().copied().ok_or(Error::InitialVersion)
    }

    /// The stock `insert` behavior: record the version as applied.
    pub fn default_insert(&mut self, version: i64) {
        self.versions.push(version);
        self.applied.push(version);
    }

    /// The stock `remove` behavior: erase the version if present and journal
    /// it as reverted; removing an absent version is a no-op.
    pub fn default_remove(&mut self, version: i64) {
        if let Some(pos) = self.versions.iter().position(|&v| v == version) {
            self.versions.remove(pos);
            self.reverted.push(version);
        }
    }
}

type OpHook = Box<dyn FnMut(&mut MemoryState) -> Result<(), Error> + Send>;
type VersionHook = Box<dyn FnMut(&mut MemoryState) -> Result<i64, Error> + Send>;
type RecordHook = Box<dyn FnMut(&mut MemoryState, i64) -> Result<(), Error> + Send>;

/// An in-memory [`VersionStore`] for tests.
///
/// Every operation checks the cancellation token, bumps its call counter, and
/// then either runs an injected hook or the stock behavior from
/// [`MemoryState`]. Hooks receive the mutable state, so a hook can fail
/// outright, fail conditionally on a call count, or delegate to the stock
/// behavior.
///
/// # Example
/// ```
/// use lockstep::testing::MemoryStore;
/// use lockstep::{CancellationToken, Error, Migration, Migrator};
///
/// let store = MemoryStore::new().on_insert(|state, version| {
///     if state.insert_calls == 2 {
///         Err(Error::Generic("insert failed".to_string()))
///     } else {
///         state.default_insert(version);
///         Ok(())
///     }
/// });
/// let migrations = vec![
///     Migration::new(1).with_up(|_, _| Ok(())),
///     Migration::new(2).with_up(|_, _| Ok(())),
/// ];
/// let mut migrator = Migrator::new(store, migrations);
/// assert!(migrator.up(&CancellationToken::new(), 2).is_err());
/// assert_eq!(migrator.store().state.versions, vec![1]);
/// ```
#[derive(Default)]
pub struct MemoryStore {
    /// The store's observable state, inspectable after a run.
    pub state: MemoryState,
    conn: (),
    init_hook: Option<OpHook>,
    lock_hook: Option<OpHook>,
    release_hook: Option<OpHook>,
    version_hook: Option<VersionHook>,
    insert_hook: Option<RecordHook>,
    remove_hook: Option<RecordHook>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("state", &self.state)
            .finish()
    }
}

impl MemoryStore {
    /// Create an empty, unlocked store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the applied version set.
    pub fn with_versions(mut self, versions: Vec<i64>) -> Self {
        self.state.versions = versions;
        self
    }

    /// Start with the advisory lock already held, as if by another operator.
    pub fn with_locked(mut self) -> Self {
        self.state.locked = true;
        self
    }

    /// Replace the `init` behavior.
    pub fn on_init(
        mut self,
        hook: impl FnMut(&mut MemoryState) -> Result<(), Error> + Send + 'static,
    ) -> Self {
        self.init_hook = Some(Box::new(hook));
        self
    }

    /// Replace the `lock` behavior.
    pub fn on_lock(
        mut self,
        hook: impl FnMut(&mut MemoryState) -> Result<(), Error> + Send + 'static,
    ) -> Self {
        self.lock_hook = Some(Box::new(hook));
        self
    }

    /// Replace the `release` behavior.
    pub fn on_release(
        mut self,
        hook: impl FnMut(&mut MemoryState) -> Result<(), Error> + Send + 'static,
    ) -> Self {
        self.release_hook = Some(Box::new(hook));
        self
    }

    /// Replace the `version` behavior.
    pub fn on_version(
        mut self,
        hook: impl FnMut(&mut MemoryState) -> Result<i64, Error> + Send + 'static,
    ) -> Self {
        self.version_hook = Some(Box::new(hook));
        self
    }

    /// Replace the `insert` behavior.
    pub fn on_insert(
        mut self,
        hook: impl FnMut(&mut MemoryState, i64) -> Result<(), Error> + Send + 'static,
    ) -> Self {
        self.insert_hook = Some(Box::new(hook));
        self
    }

    /// Replace the `remove` behavior.
    pub fn on_remove(
        mut self,
        hook: impl FnMut(&mut MemoryState, i64) -> Result<(), Error> + Send + 'static,
    ) -> Self {
        self.remove_hook = Some(Box::new(hook));
        self
    }
}

impl VersionStore for MemoryStore {
    type Conn = ();

    fn conn(&mut self) -> &mut () {
        &mut self.conn
    }

    fn init(&mut self, token: &CancellationToken) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.state.init_calls += 1;
        match &mut self.init_hook {
            Some(hook) => hook(&mut self.state),
            None => Ok(()),
        }
    }

    fn lock(&mut self, token: &CancellationToken) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.state.lock_calls += 1;
        match &mut self.lock_hook {
            Some(hook) => hook(&mut self.state),
            None => self.state.default_lock(),
        }
    }

    fn release(&mut self, token: &CancellationToken) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.state.release_calls += 1;
        match &mut self.release_hook {
            Some(hook) => hook(&mut self.state),
            None => {
                self.state.default_release();
                Ok(())
            }
        }
    }

    fn version(&mut self, token: &CancellationToken) -> Result<i64, Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.state.version_calls += 1;
        match &mut self.version_hook {
            Some(hook) => hook(&mut self.state),
            None => self.state.default_version(),
        }
    }

    fn insert(&mut self, token: &CancellationToken, version: i64) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.state.insert_calls += 1;
        match &mut self.insert_hook {
            Some(hook) => hook(&mut self.state, version),
            None => {
                self.state.default_insert(version);
                Ok(())
            }
        }
    }

    fn remove(&mut self, token: &CancellationToken, version: i64) -> Result<(), Error> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.state.remove_calls += 1;
        match &mut self.remove_hook {
            Some(hook) => hook(&mut self.state, version),
            None => {
                self.state.default_remove(version);
                Ok(())
            }
        }
    }
}
