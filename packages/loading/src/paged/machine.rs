//! The paged loading state machine.
//!
//! Every state change of a [`PagedLoading`](super::PagedLoading) is one row of
//! the table in [`PagedLoadingReducer::reduce`]. Anything not in the table is
//! a deliberate no-op so that stale or racing requests (a `LoadMore` while
//! already loading more, a page arriving after a cancel) are dropped.

use std::marker::PhantomData;
use std::sync::Arc;

use dataflow_loop::{Next, Reducer};

use super::{DataStatus, PagedEvent, PagedRequest, PagedState, PagingInfo};
use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum State<T> {
    Empty,
    Loading,
    Error(LoadError),
    Data { page_count: usize, data: Arc<[T]> },
    Refresh { page_count: usize, data: Arc<[T]> },
    LoadingMore { page_count: usize, data: Arc<[T]> },
    FullData { page_count: usize, data: Arc<[T]> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action<T> {
    LoadFirstPage { fresh: bool, reset: bool },
    LoadMore,
    Cancel { reset: bool },
    NewPageLoaded(Vec<T>),
    EmptyPageLoaded,
    LoadingError(LoadError),
}

impl<T> From<PagedRequest> for Action<T> {
    fn from(request: PagedRequest) -> Self {
        match request {
            PagedRequest::Refresh => Action::LoadFirstPage {
                fresh: true,
                reset: false,
            },
            PagedRequest::LoadMore => Action::LoadMore,
            PagedRequest::Restart { fresh } => Action::LoadFirstPage { fresh, reset: true },
            PagedRequest::Cancel { reset } => Action::Cancel { reset },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect<T> {
    LoadFirstPage { fresh: bool },
    LoadNextPage(PagingInfo<T>),
    CancelLoading,
    EmitEvent(PagedEvent),
}

impl<T> State<T> {
    /// Project onto the public view. Stateless; values are copied verbatim.
    pub(crate) fn to_public(&self) -> PagedState<T> {
        let data_with = |page_count: &usize, data: &Arc<[T]>, status| PagedState::Data {
            page_count: *page_count,
            data: data.clone(),
            status,
        };

        match self {
            State::Empty => PagedState::Empty,
            State::Loading => PagedState::Loading,
            State::Error(error) => PagedState::Error(error.clone()),
            State::Data { page_count, data } => data_with(page_count, data, DataStatus::Normal),
            State::Refresh { page_count, data } => {
                data_with(page_count, data, DataStatus::Refreshing)
            }
            State::LoadingMore { page_count, data } => {
                data_with(page_count, data, DataStatus::LoadingMore)
            }
            State::FullData { page_count, data } => {
                data_with(page_count, data, DataStatus::FullData)
            }
        }
    }

    /// Build a starting state from a caller-supplied public state.
    ///
    /// No fetch is in flight before the loop starts, so in-flight statuses are
    /// settled: `Loading` becomes `Empty`, refreshing and loading-more data
    /// become plain data.
    pub(crate) fn from_initial(state: PagedState<T>) -> Self {
        match state {
            PagedState::Empty | PagedState::Loading => State::Empty,
            PagedState::Error(error) => State::Error(error),
            PagedState::Data {
                page_count,
                data,
                status: DataStatus::FullData,
            } => State::FullData { page_count, data },
            PagedState::Data {
                page_count, data, ..
            } => State::Data { page_count, data },
        }
    }
}

/// Reducer for [`State`]; see the module docs.
pub(crate) struct PagedLoadingReducer<T> {
    _items: PhantomData<fn() -> T>,
}

impl<T> PagedLoadingReducer<T> {
    pub(crate) fn new() -> Self {
        Self {
            _items: PhantomData,
        }
    }
}

fn error_event(error: LoadError, has_data: bool) -> PagedEvent {
    PagedEvent::Error { error, has_data }
}

impl<T> Reducer for PagedLoadingReducer<T>
where
    T: Clone + Send + Sync + 'static,
{
    type State = State<T>;
    type Action = Action<T>;
    type Effect = Effect<T>;

    fn reduce(&self, state: &State<T>, action: Action<T>) -> Next<State<T>, Effect<T>> {
        match action {
            Action::LoadFirstPage { fresh, reset } => {
                let load = Effect::LoadFirstPage { fresh };
                if reset {
                    return Next::to_with(State::Loading, load);
                }
                match state {
                    State::Empty | State::Error(_) => Next::to_with(State::Loading, load),
                    State::Data { page_count, data }
                    | State::LoadingMore { page_count, data }
                    | State::FullData { page_count, data } => Next::to_with(
                        State::Refresh {
                            page_count: *page_count,
                            data: data.clone(),
                        },
                        load,
                    ),
                    State::Loading | State::Refresh { .. } => Next::nothing(),
                }
            }

            Action::LoadMore => match state {
                State::Data { page_count, data } => Next::to_with(
                    State::LoadingMore {
                        page_count: *page_count,
                        data: data.clone(),
                    },
                    Effect::LoadNextPage(PagingInfo::new(*page_count, data.clone())),
                ),
                _ => Next::nothing(),
            },

            Action::Cancel { reset } => {
                if reset {
                    return Next::to_with(State::Empty, Effect::CancelLoading);
                }
                match state {
                    State::Loading => Next::to_with(State::Empty, Effect::CancelLoading),
                    State::Refresh { page_count, data }
                    | State::LoadingMore { page_count, data } => Next::to_with(
                        State::Data {
                            page_count: *page_count,
                            data: data.clone(),
                        },
                        Effect::CancelLoading,
                    ),
                    _ => Next::nothing(),
                }
            }

            Action::NewPageLoaded(page) => match state {
                State::Loading | State::Refresh { .. } => Next::to(State::Data {
                    page_count: 1,
                    data: Arc::from(page),
                }),
                State::LoadingMore { page_count, data } => Next::to(State::Data {
                    page_count: page_count + 1,
                    data: data.iter().cloned().chain(page).collect(),
                }),
                _ => Next::nothing(),
            },

            Action::EmptyPageLoaded => match state {
                State::Loading | State::Refresh { .. } => Next::to(State::Empty),
                State::LoadingMore { page_count, data } => Next::to(State::FullData {
                    page_count: *page_count,
                    data: data.clone(),
                }),
                _ => Next::nothing(),
            },

            Action::LoadingError(error) => match state {
                State::Loading => Next::to_with(
                    State::Error(error.clone()),
                    Effect::EmitEvent(error_event(error, false)),
                ),
                State::Refresh { page_count, data } | State::LoadingMore { page_count, data } => {
                    Next::to_with(
                        State::Data {
                            page_count: *page_count,
                            data: data.clone(),
                        },
                        Effect::EmitEvent(error_event(error, true)),
                    )
                }
                _ => Next::nothing(),
            },
        }
    }
}
