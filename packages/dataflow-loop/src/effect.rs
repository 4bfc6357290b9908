//! Effect handlers, the action feedback channel, and effect routing.
//!
//! Effect handlers execute the work a reducer asked for and feed the outcome
//! back into the loop as new actions. They never touch state directly.
//!
//! # Key Properties
//!
//! - **Exactly once**: Each effect is routed to the first handler that accepts it
//! - **Ordered per handler**: A handler sees its effects in transition order
//! - **Concurrent across handlers**: Every handler runs on its own worker task
//! - **Feedback by message**: Handlers only talk back through [`ActionSender`]

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Cloneable handle for feeding actions into a loop's queue.
///
/// Dispatch never blocks and never waits for the action to be reduced.
pub struct ActionSender<A> {
    tx: mpsc::UnboundedSender<A>,
}

impl<A: Send + 'static> ActionSender<A> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<A>) -> Self {
        Self { tx }
    }

    /// Enqueue an action.
    ///
    /// Returns `false` if the loop has shut down and the action was dropped.
    pub fn dispatch(&self, action: A) -> bool {
        self.tx.send(action).is_ok()
    }

    /// True once the loop's queue is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<A> Clone for ActionSender<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<A> std::fmt::Debug for ActionSender<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Executes effects and reports outcomes as actions.
///
/// `handle_effect` runs on the handler's own worker task, one effect at a
/// time. A handler doing long IO should spawn it and return, so that later
/// effects (for example a cancellation) are not held up behind it.
///
/// # Example
///
/// ```ignore
/// struct PrintHandler;
///
/// #[async_trait]
/// impl EffectHandler<CounterEffect, CounterAction> for PrintHandler {
///     fn handles(&self, effect: &CounterEffect) -> bool {
///         matches!(effect, CounterEffect::Print(_))
///     }
///
///     async fn handle_effect(&self, effect: CounterEffect, actions: &ActionSender<CounterAction>) {
///         if let CounterEffect::Print(n) = effect {
///             println!("{n}");
///             actions.dispatch(CounterAction::Printed);
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait EffectHandler<E, A>: Send + Sync + 'static
where
    E: Send + 'static,
    A: Send + 'static,
{
    /// Whether this handler consumes `effect`.
    fn handles(&self, effect: &E) -> bool;

    /// Perform the effect, optionally dispatching follow-up actions.
    async fn handle_effect(&self, effect: E, actions: &ActionSender<A>);
}

/// A handler registered with a loop builder.
pub(crate) struct RegisteredHandler<E, A> {
    pub(crate) handler: Arc<dyn EffectHandler<E, A>>,
    pub(crate) name: &'static str,
}

struct Route<E, A> {
    handler: Arc<dyn EffectHandler<E, A>>,
    inbox: mpsc::UnboundedSender<E>,
    name: &'static str,
}

/// Routes effects to handler workers. Owned by the drain task.
pub(crate) struct EffectRouter<E, A> {
    routes: Vec<Route<E, A>>,
}

impl<E, A> EffectRouter<E, A>
where
    E: Send + 'static,
    A: Send + 'static,
{
    /// Spawn one worker per handler and return the router feeding them.
    pub(crate) fn spawn(
        handlers: Vec<RegisteredHandler<E, A>>,
        actions: ActionSender<A>,
        shutdown: CancellationToken,
    ) -> Self {
        let routes = handlers
            .into_iter()
            .map(|registered| {
                let (inbox, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_worker(
                    registered.handler.clone(),
                    registered.name,
                    rx,
                    actions.clone(),
                    shutdown.clone(),
                ));
                Route {
                    handler: registered.handler,
                    inbox,
                    name: registered.name,
                }
            })
            .collect();

        Self { routes }
    }

    /// Hand `effect` to the first handler that accepts it.
    pub(crate) fn route(&self, effect: E) {
        let Some(route) = self.routes.iter().find(|r| r.handler.handles(&effect)) else {
            warn!(
                effect_type = std::any::type_name::<E>(),
                "no effect handler accepted effect, dropping"
            );
            return;
        };

        if route.inbox.send(effect).is_err() {
            debug!(handler = route.name, "handler worker stopped, effect dropped");
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }
}

async fn run_worker<E, A>(
    handler: Arc<dyn EffectHandler<E, A>>,
    name: &'static str,
    mut inbox: mpsc::UnboundedReceiver<E>,
    actions: ActionSender<A>,
    shutdown: CancellationToken,
) where
    E: Send + 'static,
    A: Send + 'static,
{
    loop {
        let effect = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            effect = inbox.recv() => match effect {
                Some(effect) => effect,
                None => break,
            },
        };

        // A panicking handler must not kill the worker; later effects still run.
        let result = AssertUnwindSafe(handler.handle_effect(effect, &actions))
            .catch_unwind()
            .await;

        if result.is_err() {
            error!(handler = name, "effect handler panicked");
        }
    }

    debug!(handler = name, "effect handler worker stopped");
}
