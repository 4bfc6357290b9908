//! # Loading
//!
//! Loading state machines for remote data, built on [`dataflow_loop`].
//!
//! - [`PagedLoading`] - paginated lists: first page, refresh, load-more,
//!   exhaustion, recovery
//! - [`Loading`] - a single value with refresh and recovery
//!
//! Both keep previously loaded data on failure and report the failure as an
//! event instead, so a view never loses what it already shows.
//!
//! ## Example
//!
//! ```ignore
//! use loading::{PageFnLoader, PagedLoading, PagedState};
//!
//! let feed = PagedLoading::new(PageFnLoader::new(|paging| async move {
//!     api.posts(paging.page_count).await
//! }));
//!
//! let _errors = feed.handle_errors(|error, has_data| {
//!     if has_data {
//!         toast(error);
//!     }
//! });
//!
//! feed.start(true).await?;
//! ```

mod config;
mod error;
mod facade;
mod job;

pub mod paged;
pub mod simple;

pub use config::{LoadingConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_STATE_CAPACITY, MAX_CAPACITY};
pub use error::{ConfigError, LoadError};
pub use paged::{
    DataStatus, FnPagedLoader, PageFnLoader, PagedEvent, PagedLoader, PagedLoading,
    PagedLoadingBuilder, PagedRequest, PagedState, PagingInfo,
};
pub use simple::{FnLoader, Loader, Loading, LoadingBuilder, LoadingEvent, LoadingRequest, LoadingState};

pub use async_trait::async_trait;
pub use dataflow_loop::LoopError;
