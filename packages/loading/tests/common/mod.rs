// Common test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{Stream, StreamExt};
use loading::{async_trait, Loader, PagedLoader, PagingInfo};
use tokio::sync::{broadcast, watch, Notify};

pub const TIMEOUT: Duration = Duration::from_secs(2);
pub const QUIET: Duration = Duration::from_millis(100);

/// Route `tracing` output through the test writer. Run with
/// `RUST_LOG=debug cargo test -- --nocapture` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What a mock loader was asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    First { fresh: bool },
    Next { page_count: usize, loaded: usize },
}

struct Step<R> {
    result: Result<R, String>,
    gate: Option<Arc<Notify>>,
}

/// Answers loads from a script, in order, and records every call.
///
/// When the script runs out every load succeeds with the empty value.
pub struct Script<R> {
    steps: Arc<Mutex<VecDeque<Step<R>>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl<R> Clone for Script<R> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
            calls: self.calls.clone(),
        }
    }
}

impl<R: Send + 'static> Script<R> {
    pub fn new() -> Self {
        Self {
            steps: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_result(self, result: R) -> Self {
        self.push(Ok(result), None)
    }

    pub fn with_error(self, message: &str) -> Self {
        self.push(Err(message.to_string()), None)
    }

    /// The next load blocks until `gate` is notified, then returns `result`.
    pub fn with_gated_result(self, result: R, gate: Arc<Notify>) -> Self {
        self.push(Ok(result), Some(gate))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until the loader has been called `count` times.
    pub async fn wait_for_calls(&self, count: usize) {
        let reached = async {
            while self.calls.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(TIMEOUT, reached)
            .await
            .unwrap_or_else(|_| panic!("loader was not called {} times", count));
    }

    fn push(self, result: Result<R, String>, gate: Option<Arc<Notify>>) -> Self {
        self.steps.lock().unwrap().push_back(Step { result, gate });
        self
    }

    async fn answer(&self, call: Call, empty: R) -> anyhow::Result<R> {
        self.calls.lock().unwrap().push(call);
        let step = self.steps.lock().unwrap().pop_front();

        let Some(step) = step else {
            return Ok(empty);
        };
        if let Some(gate) = step.gate {
            gate.notified().await;
        }
        step.result.map_err(anyhow::Error::msg)
    }
}

/// Scripted pages of numbers.
pub type MockPages = Script<Vec<u32>>;

#[async_trait]
impl PagedLoader<u32> for Script<Vec<u32>> {
    async fn load_first_page(&self, fresh: bool) -> anyhow::Result<Vec<u32>> {
        self.answer(Call::First { fresh }, Vec::new()).await
    }

    async fn load_next_page(&self, paging_info: &PagingInfo<u32>) -> anyhow::Result<Vec<u32>> {
        let call = Call::Next {
            page_count: paging_info.page_count,
            loaded: paging_info.data.len(),
        };
        self.answer(call, Vec::new()).await
    }
}

/// Scripted single values.
pub type MockValue = Script<Option<String>>;

#[async_trait]
impl Loader<String> for Script<Option<String>> {
    async fn load(&self, fresh: bool) -> anyhow::Result<Option<String>> {
        self.answer(Call::First { fresh }, None).await
    }
}

/// Pull the next `count` items from a state stream.
pub async fn next_states<S, T>(stream: &mut S, count: usize) -> Vec<T>
where
    S: Stream<Item = T> + Unpin,
    T: Debug,
{
    let mut seen = Vec::with_capacity(count);
    while seen.len() < count {
        match tokio::time::timeout(TIMEOUT, stream.next()).await {
            Ok(Some(state)) => seen.push(state),
            Ok(None) => panic!("state stream ended after {:?}", seen),
            Err(_) => panic!("timed out waiting for states, got {:?}", seen),
        }
    }
    seen
}

/// Wait until the watched state satisfies `predicate`.
pub async fn wait_until<T, F>(receiver: &mut watch::Receiver<T>, predicate: F) -> T
where
    T: Clone + Debug,
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(TIMEOUT, receiver.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("state handle closed")
        .clone()
}

pub async fn next_event<E: Clone>(events: &mut broadcast::Receiver<E>) -> E {
    tokio::time::timeout(TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

/// Assert that no event arrives for a short while.
pub async fn expect_no_event<E: Clone + Debug>(events: &mut broadcast::Receiver<E>) {
    if let Ok(Ok(event)) = tokio::time::timeout(QUIET, events.recv()).await {
        panic!("unexpected event {:?}", event);
    }
}
