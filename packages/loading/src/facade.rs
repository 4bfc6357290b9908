//! Background tasks shared by [`PagedLoading`](crate::PagedLoading) and
//! [`Loading`](crate::Loading).

use std::sync::Arc;

use dataflow_loop::{BusStream, CancellationToken};
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Mirror every internal state into `public` through `project` until
/// `shutdown`.
pub(crate) fn spawn_projection<S, P, F>(
    mut internal: watch::Receiver<S>,
    public: Arc<watch::Sender<P>>,
    shutdown: CancellationToken,
    project: F,
) -> JoinHandle<()>
where
    S: Send + Sync + 'static,
    P: Send + Sync + 'static,
    F: Fn(&S) -> P + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = internal.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let projected = project(&internal.borrow_and_update());
                    public.send_replace(projected);
                }
            }
        }
        debug!("state projection stopped");
    })
}

/// Call `handler` with every event from `events` until `shutdown`.
pub(crate) fn spawn_event_handler<E, F>(
    mut events: BusStream<E>,
    shutdown: CancellationToken,
    mut handler: F,
) -> JoinHandle<()>
where
    E: Clone + Send + 'static,
    F: FnMut(E) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = events.next() => event,
            };
            match event {
                Some(event) => handler(event),
                None => break,
            }
        }
    })
}
