//! Single-resource loading: load, refresh, restart, cancel.
//!
//! The non-paged sibling of [`crate::paged`]. The internal machine has five
//! states (`Empty`, `Loading`, `Error`, `Data`, `Refresh`); callers see
//! [`LoadingState`], where `Refresh` is data with `refreshing == true`.

mod facade;
mod handler;
mod loader;
mod machine;

use crate::error::LoadError;

pub use facade::{Loading, LoadingBuilder};
pub use loader::{FnLoader, Loader};

/// What callers observe.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadingState<T> {
    Empty,
    Loading,
    Error(LoadError),
    Data { data: T, refreshing: bool },
}

impl<T> Default for LoadingState<T> {
    fn default() -> Self {
        LoadingState::Empty
    }
}

impl<T> LoadingState<T> {
    /// Settled data.
    pub fn data(data: T) -> Self {
        LoadingState::Data {
            data,
            refreshing: false,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            LoadingState::Data { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadingState::Loading)
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(
            self,
            LoadingState::Data {
                refreshing: true,
                ..
            }
        )
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            LoadingState::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// One-shot notifications that are not part of state.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadingEvent {
    /// A load failed; `has_data` is true when earlier data is still shown.
    Error { error: LoadError, has_data: bool },
}

/// Requests an external trigger can feed into a running [`Loading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingRequest {
    Refresh,
    Restart { fresh: bool },
    Cancel { reset: bool },
}
