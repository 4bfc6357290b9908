use std::sync::Arc;

use async_trait::async_trait;
use dataflow_loop::{ActionSender, Bus, EffectHandler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::loader::Loader;
use super::machine::{Action, Effect};
use super::LoadingEvent;
use crate::error::LoadError;
use crate::job::JobSlot;

/// Runs loads, at most one at a time; a new load supersedes the running one.
pub(crate) struct LoadHandler<T>
where
    T: Clone + Send + Sync + 'static,
{
    loader: Arc<dyn Loader<T>>,
    jobs: JobSlot,
}

impl<T> LoadHandler<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(loader: Arc<dyn Loader<T>>) -> Self {
        Self {
            loader,
            jobs: JobSlot::new(),
        }
    }
}

async fn load<T>(
    loader: Arc<dyn Loader<T>>,
    fresh: bool,
    token: CancellationToken,
    actions: ActionSender<Action<T>>,
) where
    T: Clone + Send + Sync + 'static,
{
    let result = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        result = loader.load(fresh) => result,
    };

    if token.is_cancelled() {
        return;
    }

    actions.dispatch(match result {
        Ok(Some(data)) => Action::DataLoaded(data),
        Ok(None) => Action::EmptyDataLoaded,
        Err(err) => {
            warn!(error = %err, "load failed");
            Action::LoadingError(LoadError::from(err))
        }
    });
}

#[async_trait]
impl<T> EffectHandler<Effect, Action<T>> for LoadHandler<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn handles(&self, effect: &Effect) -> bool {
        matches!(effect, Effect::Load { .. } | Effect::CancelLoading)
    }

    async fn handle_effect(&self, effect: Effect, actions: &ActionSender<Action<T>>) {
        match effect {
            Effect::Load { fresh } => {
                let loader = self.loader.clone();
                let actions = actions.clone();
                self.jobs
                    .replace(move |token| load(loader, fresh, token, actions))
                    .await;
            }
            Effect::CancelLoading => self.jobs.cancel().await,
            Effect::EmitEvent(_) => {}
        }
    }
}

pub(crate) struct EventHandler {
    events: Bus<LoadingEvent>,
}

impl EventHandler {
    pub(crate) fn new(events: Bus<LoadingEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl<T> EffectHandler<Effect, Action<T>> for EventHandler
where
    T: Clone + Send + Sync + 'static,
{
    fn handles(&self, effect: &Effect) -> bool {
        matches!(effect, Effect::EmitEvent(_))
    }

    async fn handle_effect(&self, effect: Effect, _actions: &ActionSender<Action<T>>) {
        if let Effect::EmitEvent(event) = effect {
            let receivers = self.events.emit(event);
            debug!(receivers, "loading event emitted");
        }
    }
}
