use std::sync::Arc;

use dataflow_loop::{Bus, BusStream, Loop, LoopBuilder, LoopError, StreamSource};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::handler::{EventHandler, LoadHandler};
use super::loader::Loader;
use super::machine::{Action, LoadingReducer, State};
use super::{LoadingEvent, LoadingRequest, LoadingState};
use crate::config::LoadingConfig;
use crate::error::LoadError;
use crate::facade::{spawn_event_handler, spawn_projection};

/// A single loadable value with stale-while-refreshing semantics.
///
/// ```ignore
/// let profile = Loading::new(FnLoader::new(move |fresh| api.profile(fresh)));
/// profile.start(false).await?;
/// profile.refresh();
/// ```
pub struct Loading<T>
where
    T: Clone + Send + Sync + 'static,
{
    lp: Loop<LoadingReducer<T>>,
    public: Arc<watch::Sender<LoadingState<T>>>,
    events: Bus<LoadingEvent>,
}

impl<T> Loading<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<L>(loader: L) -> Self
    where
        L: Loader<T>,
    {
        Self::builder(loader).build()
    }

    pub fn builder<L>(loader: L) -> LoadingBuilder<T>
    where
        L: Loader<T>,
    {
        LoadingBuilder {
            loader: Arc::new(loader),
            initial: LoadingState::Empty,
            config: LoadingConfig::default(),
            requests: None,
        }
    }

    /// Load the value and begin processing. Resolves once the loop runs.
    pub async fn start(&self, fresh: bool) -> Result<(), LoopError> {
        let internal = self.lp.watch();
        self.lp
            .start_with(Action::Load {
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

    pub fn refresh(&self) {
        self.lp.dispatch(Action::Load {
            fresh: true,
            reset: false,
        });
    }

    pub fn restart(&self, fresh: bool) {
        self.lp.dispatch(Action::Load { fresh, reset: true });
    }

    pub fn cancel(&self, reset: bool) {
        self.lp.dispatch(Action::Cancel { reset });
    }

    pub fn state(&self) -> LoadingState<T> {
        self.lp.state().to_public()
    }

    pub fn watch(&self) -> watch::Receiver<LoadingState<T>> {
        self.public.subscribe()
    }

    pub fn states(&self) -> impl Stream<Item = LoadingState<T>> + Send + Unpin {
        self.lp.states().map(|state| state.to_public())
    }

    pub fn events(&self) -> broadcast::Receiver<LoadingEvent> {
        self.events.subscribe()
    }

    pub fn event_stream(&self) -> BusStream<LoadingEvent> {
        self.events.stream()
    }

    pub fn is_started(&self) -> bool {
        self.lp.is_started()
    }

    pub fn shutdown(&self) {
        self.lp.shutdown();
    }

    /// Call `handler(error, has_data)` for every error event until shutdown.
    pub fn handle_errors<F>(&self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(&LoadError, bool) + Send + 'static,
    {
        spawn_event_handler(
            self.event_stream(),
            self.lp.cancellation_token(),
            move |event| match event {
                LoadingEvent::Error { error, has_data } => handler(&error, has_data),
            },
        )
    }
}

impl<T> std::fmt::Debug for Loading<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loading")
            .field("started", &self.lp.is_started())
            .field("shut_down", &self.lp.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Loading`].
pub struct LoadingBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    loader: Arc<dyn Loader<T>>,
    initial: LoadingState<T>,
    config: LoadingConfig,
    requests: Option<BoxStream<'static, LoadingRequest>>,
}

impl<T> LoadingBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// State shown before the first load completes. `Loading` starts as
    /// `Empty` and refreshing data as settled data.
    pub fn initial_state(mut self, state: LoadingState<T>) -> Self {
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
        S: Stream<Item = LoadingRequest> + Send + 'static,
    {
        self.requests = Some(requests.boxed());
        self
    }

    pub fn build(self) -> Loading<T> {
        let events = Bus::with_capacity(self.config.event_capacity);
        let initial = State::from_initial(self.initial);
        let (public, _) = watch::channel(initial.to_public());

        let mut builder = LoopBuilder::new(LoadingReducer::new(), initial)
            .with_effect_handler(LoadHandler::new(self.loader))
            .with_effect_handler(EventHandler::new(events.clone()))
            .with_state_capacity(self.config.state_capacity);

        if let Some(requests) = self.requests {
            builder = builder.with_action_source(StreamSource::new(requests.map(Action::<T>::from)));
        }

        Loading {
            lp: builder.build(),
            public: Arc::new(public),
            events,
        }
    }
}
