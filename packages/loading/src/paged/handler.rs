use std::sync::Arc;

use async_trait::async_trait;
use dataflow_loop::{ActionSender, Bus, EffectHandler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::loader::PagedLoader;
use super::machine::{Action, Effect};
use super::{PagedEvent, PagingInfo};
use crate::error::LoadError;
use crate::job::JobSlot;

enum PageRequest<T> {
    First { fresh: bool },
    Next(PagingInfo<T>),
}

/// Runs page fetches, at most one at a time.
///
/// A new fetch supersedes the running one; `CancelLoading` stops it. Results
/// of a cancelled fetch are never dispatched.
pub(crate) struct PageFetchHandler<T>
where
    T: Clone + Send + Sync + 'static,
{
    loader: Arc<dyn PagedLoader<T>>,
    jobs: JobSlot,
}

impl<T> PageFetchHandler<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(loader: Arc<dyn PagedLoader<T>>) -> Self {
        Self {
            loader,
            jobs: JobSlot::new(),
        }
    }

    async fn spawn_fetch(&self, request: PageRequest<T>, actions: &ActionSender<Action<T>>) {
        let loader = self.loader.clone();
        let actions = actions.clone();
        self.jobs
            .replace(move |token| fetch(loader, request, token, actions))
            .await;
    }
}

async fn fetch<T>(
    loader: Arc<dyn PagedLoader<T>>,
    request: PageRequest<T>,
    token: CancellationToken,
    actions: ActionSender<Action<T>>,
) where
    T: Clone + Send + Sync + 'static,
{
    let load = async {
        match &request {
            PageRequest::First { fresh } => loader.load_first_page(*fresh).await,
            PageRequest::Next(paging) => loader.load_next_page(paging).await,
        }
    };

    let result = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        result = load => result,
    };

    if token.is_cancelled() {
        return;
    }

    let action = match result {
        Ok(page) if page.is_empty() => Action::EmptyPageLoaded,
        Ok(page) => {
            debug!(items = page.len(), "page loaded");
            Action::NewPageLoaded(page)
        }
        Err(err) => {
            warn!(error = %err, "page fetch failed");
            Action::LoadingError(LoadError::from(err))
        }
    };
    actions.dispatch(action);
}

#[async_trait]
impl<T> EffectHandler<Effect<T>, Action<T>> for PageFetchHandler<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn handles(&self, effect: &Effect<T>) -> bool {
        matches!(
            effect,
            Effect::LoadFirstPage { .. } | Effect::LoadNextPage(_) | Effect::CancelLoading
        )
    }

    async fn handle_effect(&self, effect: Effect<T>, actions: &ActionSender<Action<T>>) {
        match effect {
            Effect::LoadFirstPage { fresh } => {
                self.spawn_fetch(PageRequest::First { fresh }, actions).await
            }
            Effect::LoadNextPage(paging) => {
                self.spawn_fetch(PageRequest::Next(paging), actions).await
            }
            Effect::CancelLoading => self.jobs.cancel().await,
            Effect::EmitEvent(_) => {}
        }
    }
}

/// Publishes [`PagedEvent`]s on the instance's event bus.
pub(crate) struct EventHandler {
    events: Bus<PagedEvent>,
}

impl EventHandler {
    pub(crate) fn new(events: Bus<PagedEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl<T> EffectHandler<Effect<T>, Action<T>> for EventHandler
where
    T: Clone + Send + Sync + 'static,
{
    fn handles(&self, effect: &Effect<T>) -> bool {
        matches!(effect, Effect::EmitEvent(_))
    }

    async fn handle_effect(&self, effect: Effect<T>, _actions: &ActionSender<Action<T>>) {
        if let Effect::EmitEvent(event) = effect {
            let receivers = self.events.emit(event);
            debug!(receivers, "paged event emitted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paged::loader::FnPagedLoader;
    use dataflow_loop::{LoopBuilder, Next, Reducer};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Records every action instead of reducing it.
    struct Recorder {
        seen: mpsc::UnboundedSender<Action<u32>>,
    }

    impl Reducer for Recorder {
        type State = ();
        type Action = Action<u32>;
        type Effect = Effect<u32>;

        fn reduce(&self, _state: &(), action: Action<u32>) -> Next<(), Effect<u32>> {
            let _ = self.seen.send(action);
            Next::nothing()
        }
    }

    fn recorder() -> (Recorder, mpsc::UnboundedReceiver<Action<u32>>) {
        let (seen, rx) = mpsc::unbounded_channel();
        (Recorder { seen }, rx)
    }

    async fn next_action(rx: &mut mpsc::UnboundedReceiver<Action<u32>>) -> Action<u32> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("closed")
    }

    fn instant_loader(first: Vec<u32>, next: Vec<u32>) -> Arc<dyn PagedLoader<u32>> {
        Arc::new(FnPagedLoader::new(
            move |_fresh: bool| {
                let page = first.clone();
                async move { Ok(page) }
            },
            move |_paging: PagingInfo<u32>| {
                let page = next.clone();
                async move { Ok(page) }
            },
        ))
    }

    #[tokio::test]
    async fn test_fetch_results_become_actions() {
        let (reducer, mut seen) = recorder();
        let handler = PageFetchHandler::new(instant_loader(vec![1, 2], vec![]));
        let lp = LoopBuilder::new(reducer, ()).build();
        let actions = lp.action_sender();
        lp.start().await.unwrap();

        handler
            .handle_effect(Effect::LoadFirstPage { fresh: true }, &actions)
            .await;
        assert_eq!(next_action(&mut seen).await, Action::NewPageLoaded(vec![1, 2]));

        handler
            .handle_effect(Effect::LoadNextPage(PagingInfo::first()), &actions)
            .await;
        assert_eq!(next_action(&mut seen).await, Action::EmptyPageLoaded);
    }

    #[tokio::test]
    async fn test_fetch_error_becomes_loading_error() {
        let (reducer, mut seen) = recorder();
        let loader: Arc<dyn PagedLoader<u32>> = Arc::new(FnPagedLoader::new(
            |_fresh: bool| async { Err(anyhow::anyhow!("offline")) },
            |_paging: PagingInfo<u32>| async { Ok(vec![]) },
        ));
        let handler = PageFetchHandler::new(loader);
        let lp = LoopBuilder::new(reducer, ()).build();
        let actions = lp.action_sender();
        lp.start().await.unwrap();

        handler
            .handle_effect(Effect::LoadFirstPage { fresh: false }, &actions)
            .await;
        match next_action(&mut seen).await {
            Action::LoadingError(err) => assert_eq!(err.to_string(), "offline"),
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_drops_result() {
        let (reducer, mut seen) = recorder();
        let loader: Arc<dyn PagedLoader<u32>> = Arc::new(FnPagedLoader::new(
            |_fresh: bool| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(vec![1])
            },
            |_paging: PagingInfo<u32>| async { Ok(vec![]) },
        ));
        let handler = PageFetchHandler::new(loader);
        let lp = LoopBuilder::new(reducer, ()).build();
        let actions = lp.action_sender();
        lp.start().await.unwrap();

        handler
            .handle_effect(Effect::LoadFirstPage { fresh: false }, &actions)
            .await;
        handler.handle_effect(Effect::CancelLoading, &actions).await;

        let got = tokio::time::timeout(Duration::from_millis(150), seen.recv()).await;
        assert!(got.is_err(), "cancelled fetch dispatched {:?}", got);
    }

    #[tokio::test]
    async fn test_event_handler_emits() {
        let bus = Bus::with_capacity(4);
        let mut rx = bus.subscribe();
        let handler = EventHandler::new(bus);
        let (reducer, _seen) = recorder();
        let lp = LoopBuilder::new(reducer, ()).build();
        let actions = lp.action_sender();

        let error = LoadError::msg("boom");
        let effect: Effect<u32> = Effect::EmitEvent(PagedEvent::Error {
            error: error.clone(),
            has_data: true,
        });
        assert!(EffectHandler::<Effect<u32>, Action<u32>>::handles(&handler, &effect));
        handler.handle_effect(effect, &actions).await;

        assert_eq!(
            rx.recv().await.unwrap(),
            PagedEvent::Error {
                error,
                has_data: true
            }
        );
    }
}
