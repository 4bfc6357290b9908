//! Opaque loader failures and configuration errors.
//!
//! `LoadError` carries whatever a loader raised without interpreting it. It
//! is cheap to clone so it can live inside published states and events.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A loader failure, shared between the state that records it and the event
/// that announces it.
///
/// Equality is identity: two `LoadError`s are equal only if they are clones
/// of the same failure.
#[derive(Clone)]
pub struct LoadError(Arc<anyhow::Error>);

impl LoadError {
    /// Build an error from a message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    /// The underlying error.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    /// Attempt to downcast to a concrete error type raised by the loader.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl From<anyhow::Error> for LoadError {
    fn from(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl PartialEq for LoadError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Errors raised while reading [`LoadingConfig`](crate::LoadingConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be an integer from 1 to {max}, got {value:?}")]
    InvalidCapacity {
        name: &'static str,
        value: String,
        max: usize,
    },
}
