use std::sync::Arc;

use dataflow_loop::{Bus, BusStream, Loop, LoopBuilder, LoopError, StreamSource};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::handler::{EventHandler, PageFetchHandler};
use super::loader::PagedLoader;
use super::machine::{Action, PagedLoadingReducer, State};
use super::{PagedEvent, PagedRequest, PagedState};
use crate::config::LoadingConfig;
use crate::error::LoadError;
use crate::facade::{spawn_event_handler, spawn_projection};

/// A paginated resource: first page, refresh, load-more, with errors that
/// never discard what is already shown.
///
/// # Example
///
/// ```ignore
/// let feed = PagedLoading::new(PageFnLoader::new(|paging| api.posts(paging.page_count)));
/// feed.start(true).await?;
///
/// let mut state = feed.watch();
/// state.wait_for(|s| s.can_load_more()).await?;
/// feed.load_more();
/// ```
pub struct PagedLoading<T>
where
    T: Clone + Send + Sync + 'static,
{
    lp: Loop<PagedLoadingReducer<T>>,
    public: Arc<watch::Sender<PagedState<T>>>,
    events: Bus<PagedEvent>,
}

impl<T> PagedLoading<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Starts out `Empty` with the default configuration.
    pub fn new<L>(loader: L) -> Self
    where
        L: PagedLoader<T>,
    {
        Self::builder(loader).build()
    }

    pub fn builder<L>(loader: L) -> PagedLoadingBuilder<T>
    where
        L: PagedLoader<T>,
    {
        PagedLoadingBuilder::new(Arc::new(loader))
    }

    /// Load the first page and begin processing.
    ///
    /// Resolves once the loop is running, not when the page arrives. Every
    /// other operation only takes effect after this.
    pub async fn start(&self, fresh: bool) -> Result<(), LoopError> {
        let internal = self.lp.watch();
        self.lp
            .start_with(Action::LoadFirstPage {
                fresh,
                reset: false,
            })
            .await?;
        spawn_projection(
            internal,
            self.public.clone(),
            self.lp.cancellation_token(),
            State::to_public,
        );
        Ok(())
    }

    /// Reload page one, keeping current data visible meanwhile.
    pub fn refresh(&self) {
        self.lp.dispatch(Action::LoadFirstPage {
            fresh: true,
            reset: false,
        });
    }

    /// Fetch the next page. Ignored unless [`PagedState::can_load_more`].
    pub fn load_more(&self) {
        self.lp.dispatch(Action::LoadMore);
    }

    /// Drop everything and load page one again.
    pub fn restart(&self, fresh: bool) {
        self.lp.dispatch(Action::LoadFirstPage { fresh, reset: true });
    }

    /// Stop the running fetch. With `reset`, also clear the data.
    pub fn cancel(&self, reset: bool) {
        self.lp.dispatch(Action::Cancel { reset });
    }

    pub fn state(&self) -> PagedState<T> {
        self.lp.state().to_public()
    }

    /// Continuously-updated handle to the public state.
    pub fn watch(&self) -> watch::Receiver<PagedState<T>> {
        self.public.subscribe()
    }

    /// Every public state from now on, in transition order.
    pub fn states(&self) -> impl Stream<Item = PagedState<T>> + Send + Unpin {
        self.lp.states().map(|state| state.to_public())
    }

    pub fn events(&self) -> broadcast::Receiver<PagedEvent> {
        self.events.subscribe()
    }

    pub fn event_stream(&self) -> BusStream<PagedEvent> {
        self.events.stream()
    }

    pub fn is_started(&self) -> bool {
        self.lp.is_started()
    }

    pub fn shutdown(&self) {
        self.lp.shutdown();
    }

    /// Call `handler` with every error event until shutdown.
    ///
    /// The second argument is `has_data`. Events emitted before this call
    /// are not replayed.
    pub fn handle_errors<F>(&self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(&LoadError, bool) + Send + 'static,
    {
        spawn_event_handler(
            self.event_stream(),
            self.lp.cancellation_token(),
            move |event| match event {
                PagedEvent::Error { error, has_data } => handler(&error, has_data),
            },
        )
    }
}

impl<T> std::fmt::Debug for PagedLoading<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedLoading")
            .field("started", &self.lp.is_started())
            .field("shut_down", &self.lp.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PagedLoading`].
///
/// ```ignore
/// let feed = PagedLoading::builder(loader)
///     .initial_state(PagedState::data(1, cached))
///     .config(LoadingConfig::from_env()?)
///     .requests(pull_to_refresh.map(|_| PagedRequest::Refresh))
///     .build();
/// ```
pub struct PagedLoadingBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    loader: Arc<dyn PagedLoader<T>>,
    initial: PagedState<T>,
    config: LoadingConfig,
    requests: Option<BoxStream<'static, PagedRequest>>,
}

impl<T> PagedLoadingBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(loader: Arc<dyn PagedLoader<T>>) -> Self {
        Self {
            loader,
            initial: PagedState::Empty,
            config: LoadingConfig::default(),
            requests: None,
        }
    }

    /// State shown before the first fetch completes.
    ///
    /// In-flight statuses are settled: `Loading` starts as `Empty`, and
    /// refreshing or loading-more data starts as plain data.
    pub fn initial_state(mut self, state: PagedState<T>) -> Self {
        self.initial = state;
        self
    }

    pub fn config(mut self, config: LoadingConfig) -> Self {
        self.config = config;
        self
    }

    /// Feed external triggers into the instance for its whole lifetime.
    pub fn requests<S>(mut self, requests: S) -> Self
    where
        S: Stream<Item = PagedRequest> + Send + 'static,
    {
        self.requests = Some(requests.boxed());
        self
    }

    pub fn build(self) -> PagedLoading<T> {
        let events = Bus::with_capacity(self.config.event_capacity);
        let initial = State::from_initial(self.initial);
        let (public, _) = watch::channel(initial.to_public());

        let mut builder = LoopBuilder::new(PagedLoadingReducer::new(), initial)
            .with_effect_handler(PageFetchHandler::new(self.loader))
            .with_effect_handler(EventHandler::new(events.clone()))
            .with_state_capacity(self.config.state_capacity);

        if let Some(requests) = self.requests {
            builder = builder.with_action_source(StreamSource::new(requests.map(Action::<T>::from)));
        }

        PagedLoading {
            lp: builder.build(),
            public: Arc::new(public),
            events,
        }
    }
}
