use crate::cancel::CancellationToken;
use crate::error::Error;

/// The contract a persistent version store must satisfy for the
/// [`Migrator`](crate::Migrator) to drive it.
///
/// A version store holds two pieces of state: an advisory lock (initially
/// released) and the set of applied version numbers, whose maximum is the
/// store's current version. The driver's correctness argument depends on the
/// exact semantics below, in particular on the two sentinel conditions:
///
/// - [`lock`](VersionStore::lock) must fail with [`Error::Locked`] when the
///   advisory lock is already held by another holder.
/// - [`version`](VersionStore::version) must fail with
///   [`Error::InitialVersion`] when no version has ever been recorded. The
///   driver interprets this as "effectively version -1 / empty".
///
/// Both sentinels are enum variants rather than message strings, because the
/// driver dispatches on them.
///
/// Every operation receives the run's [`CancellationToken`] and is expected to
/// honor it cooperatively; the driver itself performs no cancellation checks.
pub trait VersionStore {
    /// The database connection type handed to migration actions.
    type Conn;

    /// Return the underlying database connection that migration actions
    /// borrow for the duration of one action call. Pure accessor.
    fn conn(&mut self) -> &mut Self::Conn;

    /// Idempotently create whatever persistent structures the store needs.
    /// Safe to call on a fully initialized store.
    fn init(&mut self, token: &CancellationToken) -> Result<(), Error>;

    /// Atomically acquire the advisory lock. Fails with [`Error::Locked`]
    /// when another holder already owns it; any other failure is surfaced
    /// verbatim.
    fn lock(&mut self, token: &CancellationToken) -> Result<(), Error>;

    /// Release the advisory lock. Releasing an unheld lock must succeed.
    fn release(&mut self, token: &CancellationToken) -> Result<(), Error>;

    /// Return the current (maximum applied) version, or fail with
    /// [`Error::InitialVersion`] when no version has ever been applied.
    fn version(&mut self, token: &CancellationToken) -> Result<i64, Error>;

    /// Record `version` as applied. Must be atomic with respect to
    /// [`version`](VersionStore::version): after a successful insert, the
    /// next read returns at least `version`. Duplicate inserts may fail.
    fn insert(&mut self, token: &CancellationToken, version: i64) -> Result<(), Error>;

    /// Erase `version` from the applied set. Removing a version the store
    /// does not contain is a no-op success.
    fn remove(&mut self, token: &CancellationToken, version: i64) -> Result<(), Error>;
}
