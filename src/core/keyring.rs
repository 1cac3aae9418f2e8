//! Classification of system keyring failures.

use std::error::Error;
use std::fmt;

/// A keyring operation that failed for a reason other than a missing entry.
#[derive(Debug)]
pub enum TokenStoreError {
    /// No usable backend: a locked keychain or no secret service running.
    /// Token lookup moves on to the next source.
    BackendUnavailable(keyring::Error),
    /// The backend answered but refused the operation.
    Rejected(keyring::Error),
}

impl TokenStoreError {
    fn cause(&self) -> &keyring::Error {
        match self {
            Self::BackendUnavailable(err) | Self::Rejected(err) => err,
        }
    }

    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

impl From<keyring::Error> for TokenStoreError {
    fn from(err: keyring::Error) -> Self {
        if matches!(
            err,
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_)
        ) {
            Self::BackendUnavailable(err)
        } else {
            Self::Rejected(err)
        }
    }
}

impl fmt::Display for TokenStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendUnavailable(err) => write!(f, "keyring unavailable: {err}"),
            Self::Rejected(err) => write!(f, "keyring error: {err}"),
        }
    }
}

impl Error for TokenStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_storage_counts_as_unavailable_backend() {
        let err = TokenStoreError::from(keyring::Error::NoStorageAccess(Box::new(
            std::io::Error::other("locked"),
        )));
        assert!(err.is_backend_unavailable());
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("keyring unavailable: "));
    }

    #[test]
    fn other_failures_are_rejections() {
        let err = TokenStoreError::from(keyring::Error::TooLong("user".to_string(), 10));
        assert!(!err.is_backend_unavailable());
        assert!(err.to_string().starts_with("keyring error: "));
    }
}
