use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

/// Fetches the single value behind a [`Loading`](super::Loading).
#[async_trait]
pub trait Loader<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// `Ok(None)` means there is nothing to show. `fresh` asks the loader to
    /// bypass any cache.
    async fn load(&self, fresh: bool) -> anyhow::Result<Option<T>>;
}

/// A [`Loader`] built from a closure.
pub struct FnLoader<T, F> {
    load: F,
    _data: PhantomData<fn() -> T>,
}

impl<T, F> FnLoader<T, F> {
    pub fn new<Fut>(load: F) -> Self
    where
        F: Fn(bool) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        Self {
            load,
            _data: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> Loader<T> for FnLoader<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(bool) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
{
    async fn load(&self, fresh: bool) -> anyhow::Result<Option<T>> {
        (self.load)(fresh).await
    }
}
