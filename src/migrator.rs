use std::collections::HashSet;
use std::time::Instant;

use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::migration::Migration;
use crate::store::VersionStore;

/// The entrypoint for driving a version store through a sequence of
/// [`Migration`]s.
///
/// A `Migrator` owns a [`VersionStore`] and an ordered list of migration
/// units. [`up`](Migrator::up) applies every unit between the store's current
/// version (exclusive) and a target version (inclusive); [`down`](Migrator::down)
/// reverts units from the current version down to, but not including, a
/// target version, re-reading the store between steps. Both operations hold
/// the store's advisory lock for their full duration and release it on every
/// exit path, unless [`with_hold_lock_on_failure`](Migrator::with_hold_lock_on_failure)
/// is set and a failure occurs during step execution.
///
/// The migration list is validated before any store interaction: versions
/// must be non-negative, in non-decreasing list order, and unique. A failed
/// step leaves the store at the last successfully recorded version; the
/// driver does not attempt recovery.
pub struct Migrator<S: VersionStore> {
    store: S,
    sources: Vec<Migration<S::Conn>>,
    hold_lock_on_failure: bool,
    on_step_start: Option<Box<dyn Fn(i64, &str) + Send + Sync>>,
    on_step_complete: Option<Box<dyn Fn(i64, &str, std::time::Duration) + Send + Sync>>,
    on_step_error: Option<Box<dyn Fn(i64, &str, &Error) + Send + Sync>>,
}

// Manual Debug impl since callbacks don't implement Debug
impl<S: VersionStore> std::fmt::Debug for Migrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("sources", &self.sources)
            .field("hold_lock_on_failure", &self.hold_lock_on_failure)
            .field("on_step_start", &self.on_step_start.is_some())
            .field("on_step_complete", &self.on_step_complete.is_some())
            .field("on_step_error", &self.on_step_error.is_some())
            .finish()
    }
}

impl<S: VersionStore> Migrator<S> {
    /// Create a new migrator over `store` with the given migration list.
    ///
    /// The list is not validated here; validation runs at the start of every
    /// [`up`](Migrator::up) and [`down`](Migrator::down) invocation, before
    /// any store interaction.
    pub fn new(store: S, sources: Vec<Migration<S::Conn>>) -> Self {
        Self {
            store,
            sources,
            hold_lock_on_failure: false,
            on_step_start: None,
            on_step_complete: None,
            on_step_error: None,
        }
    }

    /// Keep the advisory lock held when a failure occurs during step
    /// execution, so an operator can diagnose the database with the lock
    /// still in place. Defaults to `false` (every exit path releases).
    ///
    /// The policy applies only once the plan has been chosen: failures during
    /// validation, `init`, `lock`, or the initial version read always release.
    pub fn with_hold_lock_on_failure(mut self, hold: bool) -> Self {
        self.hold_lock_on_failure = hold;
        self
    }

    /// Set a callback to be invoked when a migration step starts.
    /// The callback receives the migration version and name.
    pub fn on_step_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(i64, &str) + Send + Sync + 'static,
    {
        self.on_step_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration step completes and its
    /// version change has been recorded.
    /// The callback receives the migration version, name, and duration.
    pub fn on_step_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(i64, &str, std::time::Duration) + Send + Sync + 'static,
    {
        self.on_step_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration action fails.
    /// The callback receives the migration version, name, and error.
    pub fn on_step_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(i64, &str, &Error) + Send + Sync + 'static,
    {
        self.on_step_error = Some(Box::new(callback));
        self
    }

    /// Get a reference to the underlying version store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a mutable reference to the underlying version store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consume the migrator and hand back its version store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Get a reference to the migration list.
    pub fn sources(&self) -> &[Migration<S::Conn>] {
        &self.sources
    }

    /// Validate the migration list: versions must be non-negative,
    /// non-decreasing in list order, and unique. Returns the first violation.
    fn check(&self) -> Result<(), Error> {
        let mut prev: i64 = -1;
        let mut seen: HashSet<i64> = HashSet::new();

        for migration in &self.sources {
            let version = migration.version();
            if version < 0 {
                return Err(Error::Generic(format!(
                    "negative migration version: {}",
                    version
                )));
            }
            if version < prev {
                return Err(Error::Generic(format!(
                    "migration order: {} found after {}",
                    version, prev
                )));
            }
            if !seen.insert(version) {
                return Err(Error::Generic(format!(
                    "duplicate migration version: {}",
                    version
                )));
            }
            prev = version;
        }

        Ok(())
    }

    /// Apply every migration whose version lies in `(current, to]`, in
    /// version order.
    ///
    /// The store's current version is read under the advisory lock; a failed
    /// step leaves exactly the preceding steps recorded. Targets at or below
    /// the current version apply nothing and succeed: `up` never reverses.
    pub fn up(&mut self, token: &CancellationToken, to: i64) -> Result<(), Error> {
        self.check().map_err(|e| e.context("invalid sources"))?;

        self.store
            .init(token)
            .map_err(|e| e.context("failed to init version store"))?;
        self.store
            .lock(token)
            .map_err(|e| e.context("failed to get version store lock"))?;

        let mut should_release = true;
        let result = self.apply_pending(token, to, &mut should_release);
        self.finish(token, result, should_release)
    }

    fn apply_pending(
        &mut self,
        token: &CancellationToken,
        to: i64,
        should_release: &mut bool,
    ) -> Result<(), Error> {
        let mut remote_version: i64 = -1;
        match self.store.version(token) {
            Ok(version) => remote_version = version,
            Err(e) if e.is_initial_version() => {}
            Err(e) => return Err(e.context("failed to get version store state")),
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(remote_version, to, "resolved version store state");

        let plan: Vec<usize> = self
            .sources
            .iter()
            .enumerate()
            .filter(|(_, m)| m.version() > remote_version && m.version() <= to)
            .map(|(idx, _)| idx)
            .collect();

        if plan.is_empty() {
            return Ok(());
        }

        if self.hold_lock_on_failure {
            *should_release = false;
        }

        for idx in plan {
            let migration = &self.sources[idx];
            let version = migration.version();
            let name = migration.name();

            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!("migration_up", version, name = %name).entered();
            #[cfg(feature = "tracing")]
            tracing::info!("applying migration");

            if let Some(callback) = &self.on_step_start {
                callback(version, &name);
            }
            let step_start = Instant::now();

            if let Err(e) = migration.up(token, self.store.conn()) {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, "migration failed");

                if let Some(callback) = &self.on_step_error {
                    callback(version, &name, &e);
                }
                return Err(e.context(format!("failed to apply migration {}", version)));
            }
            self.store.insert(token, version).map_err(|e| {
                e.context(format!(
                    "failed to insert migration {} in version store",
                    version
                ))
            })?;

            if let Some(callback) = &self.on_step_complete {
                callback(version, &name, step_start.elapsed());
            }
        }

        *should_release = true;
        Ok(())
    }

    /// Revert migrations from the store's current version down to, but not
    /// including, `to`, in reverse version order.
    ///
    /// The sentinel `to = -1` means "revert everything"; any other target
    /// must name a version present in the migration list. The store is
    /// re-read after each step, so reverts follow the store's reported state
    /// rather than the list. A store version absent from the list aborts the
    /// run without reverting further.
    pub fn down(&mut self, token: &CancellationToken, to: i64) -> Result<(), Error> {
        self.check().map_err(|e| e.context("invalid sources"))?;

        // The list is sorted ascending once check() passes.
        if to != -1
            && self
                .sources
                .binary_search_by(|m| m.version().cmp(&to))
                .is_err()
        {
            return Err(Error::Generic(format!(
                "missing target version migration: {}",
                to
            )));
        }

        self.store
            .init(token)
            .map_err(|e| e.context("failed to init version store"))?;
        self.store
            .lock(token)
            .map_err(|e| e.context("failed to get version store lock"))?;

        let mut should_release = true;
        let result = self.revert_applied(token, to, &mut should_release);
        self.finish(token, result, should_release)
    }

    fn revert_applied(
        &mut self,
        token: &CancellationToken,
        to: i64,
        should_release: &mut bool,
    ) -> Result<(), Error> {
        let mut remote_version = match self.store.version(token) {
            Ok(version) => version,
            // Nothing has ever been applied, so there is nothing to revert.
            Err(e) if e.is_initial_version() => return Ok(()),
            Err(e) => return Err(e.context("failed to get version store state")),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(remote_version, to, "resolved version store state");

        if self.hold_lock_on_failure {
            *should_release = false;
        }

        while remote_version > to {
            let idx = self
                .sources
                .binary_search_by(|m| m.version().cmp(&remote_version))
                .map_err(|_| {
                    Error::Generic(format!(
                        "missing remote version migration: {}",
                        remote_version
                    ))
                })?;
            let migration = &self.sources[idx];
            let version = migration.version();
            let name = migration.name();

            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!("migration_down", version, name = %name).entered();
            #[cfg(feature = "tracing")]
            tracing::info!("reverting migration");

            if let Some(callback) = &self.on_step_start {
                callback(version, &name);
            }
            let step_start = Instant::now();

            if let Err(e) = migration.down(token, self.store.conn()) {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, "migration rollback failed");

                if let Some(callback) = &self.on_step_error {
                    callback(version, &name, &e);
                }
                return Err(e.context(format!("failed to revert migration {}", version)));
            }
            self.store.remove(token, version).map_err(|e| {
                e.context(format!(
                    "failed to delete migration {} from version store",
                    version
                ))
            })?;

            if let Some(callback) = &self.on_step_complete {
                callback(version, &name, step_start.elapsed());
            }

            remote_version = match self.store.version(token) {
                Ok(version) => version,
                // The applied set just became empty; the run is complete.
                Err(e) if e.is_initial_version() => {
                    *should_release = true;
                    return Ok(());
                }
                Err(e) => return Err(e.context("failed to get version store state")),
            };
        }

        *should_release = true;
        Ok(())
    }

    /// Final store interaction on every exit path: release the advisory lock
    /// unless suppressed, joining a release failure with any primary error.
    fn finish(
        &mut self,
        token: &CancellationToken,
        result: Result<(), Error>,
        should_release: bool,
    ) -> Result<(), Error> {
        if !should_release {
            return result;
        }
        match self.store.release(token) {
            Ok(()) => result,
            Err(release_err) => {
                let release_err = release_err.context("failed to release version store lock");
                Err(Error::join(result.err(), release_err))
            }
        }
    }
}
