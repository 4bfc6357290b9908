//! Typed broadcast bus for states and one-shot events.
//!
//! # Guarantees
//!
//! - **Never blocks**: `emit` returns immediately, with or without receivers
//! - **Drop-oldest**: When the buffer is full the oldest value is evicted
//! - **At-most-once**: A lagging receiver skips what was evicted and continues
//!   from the oldest value still buffered
//! - **No replay**: Receivers only see values emitted after they subscribed

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

/// Default channel capacity for a bus.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Largest buffer a bus allocates. Larger requests are clamped to it.
pub const MAX_CAPACITY: usize = 1 << 16;

/// Broadcast bus carrying values of one type.
///
/// # Example
///
/// ```ignore
/// let bus = Bus::with_capacity(100);
/// let mut receiver = bus.subscribe();
///
/// bus.emit(PagedEvent::Error { error, has_data: true });
///
/// let event = receiver.recv().await?;
/// ```
pub struct Bus<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Bus<T> {
    /// Create a bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with the specified capacity.
    ///
    /// The capacity is the number of values buffered before the oldest ones
    /// are evicted for slow receivers, between 1 and [`MAX_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.clamp(1, MAX_CAPACITY));
        Self { sender }
    }

    /// Emit a value to all subscribers (fire-and-forget).
    ///
    /// Returns the number of receivers that received the value.
    pub fn emit(&self, value: T) -> usize {
        self.sender.send(value).unwrap_or(0)
    }

    /// Subscribe to values emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Subscribe as a [`Stream`] that silently skips evicted values.
    pub fn stream(&self) -> BusStream<T> {
        BusStream::new(self.subscribe())
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + Send + 'static> Default for Bus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Bus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}

/// [`Stream`] over a bus receiver.
///
/// Lag notifications are logged and skipped; the stream ends when every
/// sender is gone.
pub struct BusStream<T> {
    inner: BroadcastStream<T>,
}

impl<T: Clone + Send + 'static> BusStream<T> {
    pub fn new(receiver: broadcast::Receiver<T>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl<T: Clone + Send + 'static> Stream for BusStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(value))) => return Poll::Ready(Some(value)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                    warn!(missed, "bus receiver lagged, oldest values dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::sync::broadcast::error::RecvError;

    #[derive(Debug, Clone, PartialEq)]
    struct TestEvent {
        value: i32,
    }

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = Bus::new();
        let mut receiver = bus.subscribe();

        bus.emit(TestEvent { value: 42 });

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.value, 42);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = Bus::new();
        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();

        bus.emit(TestEvent { value: 100 });

        assert_eq!(receiver1.recv().await.unwrap().value, 100);
        assert_eq!(receiver2.recv().await.unwrap().value, 100);
    }

    #[tokio::test]
    async fn test_emit_returns_receiver_count() {
        let bus = Bus::new();

        assert_eq!(bus.emit(TestEvent { value: 1 }), 0);

        let _receiver1 = bus.subscribe();
        assert_eq!(bus.emit(TestEvent { value: 2 }), 1);

        let _receiver2 = bus.subscribe();
        assert_eq!(bus.emit(TestEvent { value: 3 }), 2);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_values() {
        let bus = Bus::new();
        bus.emit(TestEvent { value: 1 });

        let mut receiver = bus.subscribe();
        bus.emit(TestEvent { value: 2 });

        assert_eq!(receiver.recv().await.unwrap().value, 2);
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let bus = Bus::with_capacity(2);
        let mut receiver = bus.subscribe();

        for value in 0..5 {
            bus.emit(TestEvent { value });
        }

        match receiver.recv().await {
            Err(RecvError::Lagged(missed)) => assert_eq!(missed, 3),
            other => panic!("expected lag, got {:?}", other),
        }
        assert_eq!(receiver.recv().await.unwrap().value, 3);
        assert_eq!(receiver.recv().await.unwrap().value, 4);
    }

    #[tokio::test]
    async fn test_stream_skips_lag() {
        let bus = Bus::with_capacity(2);
        let stream = bus.stream();

        for value in 0..5 {
            bus.emit(TestEvent { value });
        }
        drop(bus);

        let values: Vec<i32> = stream.map(|e| e.value).collect().await;
        assert_eq!(values, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_capacity_is_clamped() {
        let bus = Bus::with_capacity(usize::MAX);
        let mut receiver = bus.subscribe();

        for value in 0..=MAX_CAPACITY as i32 {
            bus.emit(TestEvent { value });
        }

        match receiver.recv().await {
            Err(RecvError::Lagged(missed)) => assert_eq!(missed, 1),
            other => panic!("expected lag, got {:?}", other),
        }
        assert_eq!(receiver.recv().await.unwrap().value, 1);

        let bus = Bus::with_capacity(0);
        let mut receiver = bus.subscribe();
        bus.emit(TestEvent { value: 7 });
        assert_eq!(receiver.recv().await.unwrap().value, 7);
    }

    #[tokio::test]
    async fn test_clone_shares_channel() {
        let bus1 = Bus::new();
        let bus2 = bus1.clone();
        let mut receiver = bus1.subscribe();

        bus2.emit(TestEvent { value: 55 });

        assert_eq!(receiver.recv().await.unwrap().value, 55);
    }

    #[test]
    fn test_debug_impl() {
        let bus: Bus<TestEvent> = Bus::new();
        let _r1 = bus.subscribe();
        let debug_str = format!("{:?}", bus);
        assert!(debug_str.contains("Bus"));
        assert!(debug_str.contains("subscriber_count"));
    }
}
