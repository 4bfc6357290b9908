use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::PagingInfo;

/// Fetches pages for a [`PagedLoading`](super::PagedLoading).
///
/// An empty page means "no more data": on the first page it leaves the view
/// empty, on a later page it marks the data as complete.
///
/// # Example
///
/// ```ignore
/// struct Feed { client: ApiClient }
///
/// #[async_trait]
/// impl PagedLoader<Post> for Feed {
///     async fn load_first_page(&self, fresh: bool) -> anyhow::Result<Vec<Post>> {
///         self.client.posts(0, fresh).await
///     }
///
///     async fn load_next_page(&self, paging: &PagingInfo<Post>) -> anyhow::Result<Vec<Post>> {
///         self.client.posts(paging.page_count, false).await
///     }
/// }
/// ```
#[async_trait]
pub trait PagedLoader<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// Load page one. `fresh` asks the loader to bypass any cache.
    async fn load_first_page(&self, fresh: bool) -> anyhow::Result<Vec<T>>;

    /// Load the page after everything in `paging_info`.
    async fn load_next_page(&self, paging_info: &PagingInfo<T>) -> anyhow::Result<Vec<T>>;
}

/// A [`PagedLoader`] built from two closures.
pub struct FnPagedLoader<T, F, N> {
    first: F,
    next: N,
    _items: PhantomData<fn() -> T>,
}

impl<T, F, N> FnPagedLoader<T, F, N> {
    /// `first(fresh)` loads page one; `next(paging_info)` loads the page
    /// after `paging_info`.
    pub fn new<FFut, NFut>(first: F, next: N) -> Self
    where
        F: Fn(bool) -> FFut,
        FFut: Future<Output = anyhow::Result<Vec<T>>>,
        N: Fn(PagingInfo<T>) -> NFut,
        NFut: Future<Output = anyhow::Result<Vec<T>>>,
    {
        Self {
            first,
            next,
            _items: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, FFut, N, NFut> PagedLoader<T> for FnPagedLoader<T, F, N>
where
    T: Send + Sync + 'static,
    F: Fn(bool) -> FFut + Send + Sync + 'static,
    FFut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
    N: Fn(PagingInfo<T>) -> NFut + Send + Sync + 'static,
    NFut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
{
    async fn load_first_page(&self, fresh: bool) -> anyhow::Result<Vec<T>> {
        (self.first)(fresh).await
    }

    async fn load_next_page(&self, paging_info: &PagingInfo<T>) -> anyhow::Result<Vec<T>> {
        (self.next)(paging_info.clone()).await
    }
}

/// A [`PagedLoader`] for APIs with one page function.
///
/// The first page is requested with [`PagingInfo::first`]; `fresh` is not
/// passed through.
pub struct PageFnLoader<T, F> {
    load_page: F,
    _items: PhantomData<fn() -> T>,
}

impl<T, F> PageFnLoader<T, F> {
    pub fn new<Fut>(load_page: F) -> Self
    where
        F: Fn(PagingInfo<T>) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<T>>>,
    {
        Self {
            load_page,
            _items: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> PagedLoader<T> for PageFnLoader<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(PagingInfo<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
{
    async fn load_first_page(&self, _fresh: bool) -> anyhow::Result<Vec<T>> {
        (self.load_page)(PagingInfo::first()).await
    }

    async fn load_next_page(&self, paging_info: &PagingInfo<T>) -> anyhow::Result<Vec<T>> {
        (self.load_page)(paging_info.clone()).await
    }
}
