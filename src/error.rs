/// Error type for the lockstep crate.
///
/// The `Locked` and `InitialVersion` variants are sentinel conditions that
/// [`VersionStore`](crate::VersionStore) implementations must surface so the
/// driver can dispatch on them. Use [`Error::is_locked`] and
/// [`Error::is_initial_version`] to probe for them through any wrapping the
/// driver has added.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The advisory lock is already held by another operator.
    #[error("version store is locked")]
    Locked,
    /// The version store has never recorded an applied version.
    #[error("version store has no applied versions")]
    InitialVersion,
    /// The cancellation token was triggered before or during an operation.
    #[error("operation cancelled")]
    Cancelled,
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Sqlite(rusqlite::Error),
    #[error("{0}")]
    Generic(String),
    /// A downstream error wrapped with a description of the failing phase.
    #[error("{message}: {source}")]
    Context { message: String, source: Box<Error> },
    /// Two failures surfaced on the same exit path, typically a step failure
    /// plus a lock-release failure.
    #[error("{primary}\n{secondary}")]
    Joined {
        primary: Box<Error>,
        secondary: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with a message naming the phase that failed.
    #[must_use]
    pub fn context(self, message: impl Into<String>) -> Error {
        Error::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Join an optional primary error with a secondary one, keeping both
    /// visible. With no primary error the secondary is returned unchanged.
    pub fn join(primary: Option<Error>, secondary: Error) -> Error {
        match primary {
            Some(primary) => Error::Joined {
                primary: Box::new(primary),
                secondary: Box::new(secondary),
            },
            None => secondary,
        }
    }

    /// Whether this error is, or wraps, the [`Error::Locked`] sentinel.
    pub fn is_locked(&self) -> bool {
        match self {
            Error::Locked => true,
            Error::Context { source, .. } => source.is_locked(),
            Error::Joined { primary, secondary } => primary.is_locked() || secondary.is_locked(),
            _ => false,
        }
    }

    /// Whether this error is, or wraps, the [`Error::InitialVersion`] sentinel.
    pub fn is_initial_version(&self) -> bool {
        match self {
            Error::InitialVersion => true,
            Error::Context { source, .. } => source.is_initial_version(),
            Error::Joined { primary, secondary } => {
                primary.is_initial_version() || secondary.is_initial_version()
            }
            _ => false,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

// Manual PartialEq implementation so variants with boxed sources compare
// structurally.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Locked, Self::Locked) => true,
            (Self::InitialVersion, Self::InitialVersion) => true,
            (Self::Cancelled, Self::Cancelled) => true,
            #[cfg(feature = "sqlite")]
            (Self::Sqlite(a), Self::Sqlite(b)) => a == b,
            (Self::Generic(a), Self::Generic(b)) => a == b,
            (
                Self::Context {
                    message: a_message,
                    source: a_source,
                },
                Self::Context {
                    message: b_message,
                    source: b_source,
                },
            ) => a_message == b_message && a_source == b_source,
            (
                Self::Joined {
                    primary: a_primary,
                    secondary: a_secondary,
                },
                Self::Joined {
                    primary: b_primary,
                    secondary: b_secondary,
                },
            ) => a_primary == b_primary && a_secondary == b_secondary,
            _ => false,
        }
    }
}
