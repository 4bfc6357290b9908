//! The loop: one queue, one reducer, many effect handlers.
//!
//! The `Loop` owns the current state and drains a single FIFO action queue.
//! For every action it:
//! 1. Runs the reducer (exactly one reduction in flight at any time)
//! 2. Publishes the resulting state, changed or not
//! 3. Routes each effect of the transition to its handler
//!
//! Handlers run concurrently with the drain and feed new actions back into
//! the same queue, which keeps the drain task the only writer of state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bus::{Bus, BusStream, DEFAULT_CAPACITY};
use crate::effect::{ActionSender, EffectHandler, EffectRouter, RegisteredHandler};
use crate::error::LoopError;
use crate::reducer::{Reducer, ReducerRunner};
use crate::source::ActionSource;

type BoxedSource<A> = Box<dyn ActionSource<A>>;

/// Everything the drain task takes ownership of on `start`.
struct Pending<R: Reducer> {
    runner: ReducerRunner<R>,
    initial: R::State,
    queue: mpsc::UnboundedReceiver<R::Action>,
    handlers: Vec<RegisteredHandler<R::Effect, R::Action>>,
    sources: Vec<BoxedSource<R::Action>>,
}

/// Unidirectional dataflow loop.
///
/// # Example
///
/// ```ignore
/// let lp = LoopBuilder::new(CounterReducer, 0)
///     .with_effect_handler(PrintHandler)
///     .build();
///
/// lp.dispatch(CounterAction::Increment); // queued
/// lp.start().await?;                     // draining from here on
///
/// let mut states = lp.subscribe();
/// lp.dispatch(CounterAction::Increment);
/// assert_eq!(states.recv().await?, 2);
/// ```
pub struct Loop<R: Reducer> {
    state: Arc<watch::Sender<R::State>>,
    transitions: Bus<R::State>,
    actions: ActionSender<R::Action>,
    pending: Mutex<Option<Pending<R>>>,
    started: AtomicBool,
    shutdown: CancellationToken,
}

impl<R: Reducer> Loop<R> {
    /// Enqueue an action. Never blocks.
    ///
    /// Actions dispatched before `start` wait in the queue.
    pub fn dispatch(&self, action: R::Action) {
        if !self.actions.dispatch(action) {
            debug!("loop shut down, action dropped");
        }
    }

    /// A cloneable handle for dispatching from other tasks.
    pub fn action_sender(&self) -> ActionSender<R::Action> {
        self.actions.clone()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> R::State {
        self.state.borrow().clone()
    }

    /// Continuously-updated handle to the current state.
    ///
    /// Intermediate states may be skipped; use [`subscribe`](Self::subscribe)
    /// to observe every publication.
    pub fn watch(&self) -> watch::Receiver<R::State> {
        self.state.subscribe()
    }

    /// Every state publication from now on, in transition order.
    pub fn subscribe(&self) -> broadcast::Receiver<R::State> {
        self.transitions.subscribe()
    }

    /// Like [`subscribe`](Self::subscribe), as a stream.
    pub fn states(&self) -> BusStream<R::State> {
        self.transitions.stream()
    }

    /// True once `start` has been called.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Begin draining the queue.
    ///
    /// Spawns the drain task, one worker per effect handler and one task per
    /// action source, and resolves once the drain is running. Must be called
    /// from within a tokio runtime.
    pub async fn start(&self) -> Result<(), LoopError> {
        self.launch(None).await
    }

    /// Like [`start`](Self::start), enqueueing `first` behind any actions
    /// already queued.
    ///
    /// `first` is only enqueued by the call that actually starts the loop;
    /// a losing concurrent call gets `AlreadyStarted` and queues nothing.
    pub async fn start_with(&self, first: R::Action) -> Result<(), LoopError> {
        self.launch(Some(first)).await
    }

    async fn launch(&self, first: Option<R::Action>) -> Result<(), LoopError> {
        let pending = {
            let mut guard = match self.pending.lock() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    warn!("loop mutex was poisoned, recovering");
                    poisoned.into_inner()
                }
            };
            guard.take()
        };
        let Some(pending) = pending else {
            return Err(LoopError::AlreadyStarted);
        };
        self.started.store(true, Ordering::Release);

        if let Some(action) = first {
            self.dispatch(action);
        }

        let Pending {
            runner,
            initial,
            queue,
            handlers,
            sources,
        } = pending;

        info!(
            reducer = runner.name(),
            handler_count = handlers.len(),
            source_count = sources.len(),
            "loop starting"
        );

        for source in sources {
            let actions = self.actions.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = source.run(actions) => {}
                }
            });
        }

        let router = EffectRouter::spawn(handlers, self.actions.clone(), self.shutdown.clone());

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(drain(
            runner,
            initial,
            queue,
            router,
            self.state.clone(),
            self.transitions.clone(),
            self.shutdown.clone(),
            ready_tx,
        ));

        ready_rx.await.map_err(|_| LoopError::Stopped)
    }

    /// Stop the drain, the handler workers and the action sources.
    ///
    /// Work a handler already spawned on its own is not affected.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("loop shutting down");
            self.shutdown.cancel();
        }
    }

    /// True once `shutdown` was called or the loop was dropped.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled when the loop shuts down, for tasks tied to its life.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl<R: Reducer> Drop for Loop<R> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl<R: Reducer> std::fmt::Debug for Loop<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loop")
            .field("started", &self.is_started())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::too_many_arguments)]
async fn drain<R: Reducer>(
    runner: ReducerRunner<R>,
    initial: R::State,
    mut queue: mpsc::UnboundedReceiver<R::Action>,
    router: EffectRouter<R::Effect, R::Action>,
    state: Arc<watch::Sender<R::State>>,
    transitions: Bus<R::State>,
    shutdown: CancellationToken,
    ready: oneshot::Sender<()>,
) {
    let mut current = initial;
    let _ = ready.send(());

    loop {
        let action = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            action = queue.recv() => match action {
                Some(action) => action,
                None => break,
            },
        };

        let next = runner.reduce(&current, action);
        let changed = next.state.is_some();
        if let Some(new_state) = next.state {
            current = new_state;
        }

        trace!(changed, effect_count = next.effects.len(), "action reduced");

        // Published even when unchanged; de-duplication is the subscriber's call.
        state.send_replace(current.clone());
        transitions.emit(current.clone());

        for effect in next.effects {
            router.route(effect);
        }
    }

    info!(handler_count = router.len(), "loop stopped");
}

/// Builder for a [`Loop`].
///
/// # Example
///
/// ```ignore
/// let lp = LoopBuilder::new(PagedLoadingReducer::new(), State::Empty)
///     .with_effect_handler(PageFetchHandler::new(loader))
///     .with_effect_handler(EventHandler::new(events.clone()))
///     .with_action_source(StreamSource::new(triggers))
///     .build();
/// ```
pub struct LoopBuilder<R: Reducer> {
    reducer: R,
    initial: R::State,
    handlers: Vec<RegisteredHandler<R::Effect, R::Action>>,
    sources: Vec<BoxedSource<R::Action>>,
    state_capacity: usize,
}

impl<R: Reducer> LoopBuilder<R> {
    pub fn new(reducer: R, initial: R::State) -> Self {
        Self {
            reducer,
            initial,
            handlers: Vec::new(),
            sources: Vec::new(),
            state_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Register an effect handler.
    ///
    /// Effects are offered to handlers in registration order; the first one
    /// whose `handles` returns true gets it.
    pub fn with_effect_handler<H>(mut self, handler: H) -> Self
    where
        H: EffectHandler<R::Effect, R::Action>,
    {
        self.handlers.push(RegisteredHandler {
            handler: Arc::new(handler),
            name: std::any::type_name::<H>(),
        });
        self
    }

    /// Register an already-shared effect handler.
    pub fn with_shared_effect_handler(
        mut self,
        handler: Arc<dyn EffectHandler<R::Effect, R::Action>>,
        name: &'static str,
    ) -> Self {
        self.handlers.push(RegisteredHandler { handler, name });
        self
    }

    /// Register a long-lived action source.
    pub fn with_action_source<S>(mut self, source: S) -> Self
    where
        S: ActionSource<R::Action>,
    {
        self.sources.push(Box::new(source));
        self
    }

    /// Buffer size of the ordered state stream.
    pub fn with_state_capacity(mut self, capacity: usize) -> Self {
        self.state_capacity = capacity;
        self
    }

    pub fn build(self) -> Loop<R> {
        let (tx, queue) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(self.initial.clone());

        Loop {
            state: Arc::new(state),
            transitions: Bus::with_capacity(self.state_capacity),
            actions: ActionSender::new(tx),
            pending: Mutex::new(Some(Pending {
                runner: ReducerRunner::new(self.reducer),
                initial: self.initial,
                queue,
                handlers: self.handlers,
                sources: self.sources,
            })),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }
}
