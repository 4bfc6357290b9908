//! Paged loading: first page, refresh, load-more, exhaustion and recovery.
//!
//! The internal machine has seven states; callers see a simplified
//! [`PagedState`] where the stale-while-refreshing states are plain data with
//! a [`DataStatus`].
//!
//! | Internal      | Public                         |
//! |---------------|--------------------------------|
//! | `Empty`       | `Empty`                        |
//! | `Loading`     | `Loading`                      |
//! | `Error(e)`    | `Error(e)`                     |
//! | `Data`        | `Data { status: Normal }`      |
//! | `Refresh`     | `Data { status: Refreshing }`  |
//! | `LoadingMore` | `Data { status: LoadingMore }` |
//! | `FullData`    | `Data { status: FullData }`    |
//!
//! Failures never discard data: an error during refresh or load-more falls
//! back to the data already shown and announces itself as a
//! [`PagedEvent::Error`] with `has_data == true`.

mod facade;
mod handler;
mod loader;
mod machine;

use std::sync::Arc;

use crate::error::LoadError;

pub use facade::{PagedLoading, PagedLoadingBuilder};
pub use loader::{FnPagedLoader, PageFnLoader, PagedLoader};

/// Snapshot handed to a next-page fetch.
#[derive(Debug, PartialEq)]
pub struct PagingInfo<T> {
    /// Pages loaded so far.
    pub page_count: usize,
    /// Every item loaded so far, in fetch order.
    pub data: Arc<[T]>,
}

// Cloning shares the items; `T` itself need not be `Clone`.
impl<T> Clone for PagingInfo<T> {
    fn clone(&self) -> Self {
        Self {
            page_count: self.page_count,
            data: self.data.clone(),
        }
    }
}

impl<T> PagingInfo<T> {
    pub fn new(page_count: usize, data: Arc<[T]>) -> Self {
        Self { page_count, data }
    }

    /// Nothing loaded yet.
    pub fn first() -> Self {
        Self {
            page_count: 0,
            data: Arc::from(Vec::<T>::new()),
        }
    }
}

/// How the data in [`PagedState::Data`] relates to in-flight work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataStatus {
    Normal,
    Refreshing,
    LoadingMore,
    FullData,
}

/// What callers observe.
#[derive(Debug, Clone, PartialEq)]
pub enum PagedState<T> {
    Empty,
    Loading,
    Error(LoadError),
    Data {
        page_count: usize,
        data: Arc<[T]>,
        status: DataStatus,
    },
}

impl<T> Default for PagedState<T> {
    fn default() -> Self {
        PagedState::Empty
    }
}

impl<T> PagedState<T> {
    /// Data with `Normal` status.
    pub fn data(page_count: usize, data: impl Into<Arc<[T]>>) -> Self {
        PagedState::Data {
            page_count,
            data: data.into(),
            status: DataStatus::Normal,
        }
    }

    /// The loaded items, if any.
    pub fn items(&self) -> Option<&[T]> {
        match self {
            PagedState::Data { data, .. } => Some(&**data),
            _ => None,
        }
    }

    pub fn page_count(&self) -> usize {
        match self {
            PagedState::Data { page_count, .. } => *page_count,
            _ => 0,
        }
    }

    pub fn status(&self) -> Option<DataStatus> {
        match self {
            PagedState::Data { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.status() == Some(DataStatus::Refreshing)
    }

    pub fn is_loading_more(&self) -> bool {
        self.status() == Some(DataStatus::LoadingMore)
    }

    pub fn is_full_data(&self) -> bool {
        self.status() == Some(DataStatus::FullData)
    }

    /// Whether `load_more` would start a fetch right now.
    pub fn can_load_more(&self) -> bool {
        self.status() == Some(DataStatus::Normal)
    }
}

/// One-shot notifications that are not part of state.
#[derive(Debug, Clone, PartialEq)]
pub enum PagedEvent {
    /// A fetch failed. `has_data` is true when earlier data is still shown,
    /// so the failure can be reported without blocking the view.
    Error { error: LoadError, has_data: bool },
}

/// Requests an external trigger can feed into a running [`PagedLoading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagedRequest {
    Refresh,
    LoadMore,
    Restart { fresh: bool },
    Cancel { reset: bool },
}
