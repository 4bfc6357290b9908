//! Action sources: long-lived producers merged into a loop's queue.
//!
//! A source runs for the lifetime of the loop, independent of reducer
//! output. Typical sources are external triggers such as "the network came
//! back" or a periodic refresh tick.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::effect::ActionSender;

/// Long-lived producer of actions.
///
/// `run` is spawned when the loop starts and is cancelled when it shuts down.
#[async_trait]
pub trait ActionSource<A>: Send + 'static
where
    A: Send + 'static,
{
    async fn run(self: Box<Self>, actions: ActionSender<A>);
}

/// Forwards every item of a stream into the loop.
///
/// # Example
///
/// ```ignore
/// let ticks = IntervalStream::new(tokio::time::interval(Duration::from_secs(60)))
///     .map(|_| Action::Refresh);
///
/// let lp = LoopBuilder::new(reducer, State::Empty)
///     .with_action_source(StreamSource::new(ticks))
///     .build();
/// ```
pub struct StreamSource<S> {
    stream: S,
}

impl<S> StreamSource<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S, A> ActionSource<A> for StreamSource<S>
where
    S: Stream<Item = A> + Send + 'static,
    A: Send + 'static,
{
    async fn run(self: Box<Self>, actions: ActionSender<A>) {
        let mut stream = Box::pin(self.stream);
        while let Some(action) = stream.next().await {
            if !actions.dispatch(action) {
                break;
            }
        }
        debug!("stream action source finished");
    }
}
