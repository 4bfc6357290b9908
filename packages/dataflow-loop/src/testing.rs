//! Testing utilities for reducers and running loops.
//!
//! # Feature Flag
//!
//! This module is only available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! dataflow-loop = { path = "../dataflow-loop", features = ["testing"] }
//! ```
//!
//! # Quick Start
//!
//! ## Using `assert_transitions!` Macro
//!
//! ```ignore
//! use dataflow_loop::assert_transitions;
//!
//! assert_transitions!(
//!     reducer,
//!     State::Empty,
//!     Action::Load => (Some(State::Loading), vec![Effect::Fetch]),
//!     Action::Load => (None, vec![]),
//! );
//! ```
//!
//! ## Using Fluent Builder
//!
//! ```ignore
//! use dataflow_loop::testing::ReducerTest;
//!
//! ReducerTest::new(MyReducer)
//!     .given(State::Empty)
//!     .when(Action::Load)
//!     .expect_state(State::Loading)
//!     .expect_effects(vec![Effect::Fetch])
//!     .then(Action::Load)
//!     .expect_noop();
//! ```
//!
//! ## Collecting Published States
//!
//! ```ignore
//! let states = lp.subscribe();
//! lp.start().await?;
//! let seen = collect_states(states, 2, Duration::from_secs(1)).await;
//! ```

use std::fmt::Debug;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::reducer::{Next, Reducer};

/// Asserts a chain of action → (state, effects) transitions.
///
/// The expected state is `Some(next)` for a transition and `None` for "state
/// unchanged". The state carried forward is the reducer's output.
///
/// # Panics
///
/// Panics if any transition does not match.
#[macro_export]
macro_rules! assert_transitions {
    ($reducer:expr, $initial:expr, $($action:expr => ($state:expr, $effects:expr)),+ $(,)?) => {{
        let mut current = $initial;
        $(
            let next = $crate::Reducer::reduce(&$reducer, &current, $action);
            let expected_state = $state;
            let expected_effects = $crate::testing::typed_effects(&next, $effects);
            assert_eq!(
                next.state, expected_state,
                "Unexpected state after {}\n  from: {:?}",
                stringify!($action), current
            );
            assert_eq!(
                next.effects.to_vec(), expected_effects,
                "Unexpected effects after {}\n  from: {:?}",
                stringify!($action), current
            );
            if let Some(state) = next.state {
                current = state;
            }
        )+
        current
    }};
}

pub use crate::assert_transitions;

#[doc(hidden)]
pub fn typed_effects<S, E>(_next: &Next<S, E>, effects: Vec<E>) -> Vec<E> {
    effects
}

/// Fluent test builder for reducers.
///
/// Tracks the current state across steps the same way a loop does: a no-op
/// leaves it untouched.
pub struct ReducerTest<R: Reducer> {
    reducer: R,
    state: Option<R::State>,
    last: Option<Next<R::State, R::Effect>>,
}

impl<R> ReducerTest<R>
where
    R: Reducer,
    R::State: Debug + PartialEq,
    R::Effect: Debug + PartialEq + Clone,
{
    pub fn new(reducer: R) -> Self {
        Self {
            reducer,
            state: None,
            last: None,
        }
    }

    /// Set the state the next action is applied to.
    pub fn given(mut self, state: R::State) -> Self {
        self.state = Some(state);
        self.last = None;
        self
    }

    /// Apply an action.
    ///
    /// # Panics
    ///
    /// Panics if no state was given.
    pub fn when(mut self, action: R::Action) -> Self {
        let current = self
            .state
            .take()
            .expect("ReducerTest::given must be called before when");
        let next = self.reducer.reduce(&current, action);
        self.state = Some(next.state.clone().unwrap_or(current));
        self.last = Some(next);
        self
    }

    /// Apply a subsequent action.
    pub fn then(self, action: R::Action) -> Self {
        self.when(action)
    }

    /// Assert the current state.
    pub fn expect_state(self, expected: R::State) -> Self {
        assert_eq!(
            self.state.as_ref(),
            Some(&expected),
            "State mismatch\n  expected: {:?}\n  actual: {:?}",
            expected,
            self.state
        );
        self
    }

    /// Assert the effects of the last action, in order.
    pub fn expect_effects(self, expected: Vec<R::Effect>) -> Self {
        let actual = self.last_effects();
        assert_eq!(
            actual, expected,
            "Effects mismatch\n  expected: {:?}\n  actual: {:?}",
            expected, actual
        );
        self
    }

    /// Assert the last action was dropped: state unchanged, no effects.
    pub fn expect_noop(self) -> Self {
        let noop = self.last.as_ref().map(Next::is_noop).unwrap_or(false);
        assert!(noop, "Expected no-op, got {:?}", self.last);
        self
    }

    /// Assert the last action changed the state or requested work.
    pub fn expect_transition(self) -> Self {
        let noop = self.last.as_ref().map(Next::is_noop).unwrap_or(true);
        assert!(!noop, "Expected a transition, got no-op");
        self
    }

    /// Assert the current state matches a predicate.
    pub fn assert_state<F>(self, predicate: F) -> Self
    where
        F: FnOnce(&R::State) -> bool,
    {
        let ok = self.state.as_ref().map(predicate).unwrap_or(false);
        assert!(ok, "State predicate failed for {:?}", self.state);
        self
    }

    /// The current state.
    pub fn state(&self) -> Option<&R::State> {
        self.state.as_ref()
    }

    fn last_effects(&self) -> Vec<R::Effect> {
        self.last
            .as_ref()
            .map(|next| next.effects.to_vec())
            .unwrap_or_default()
    }
}

/// Receive exactly `count` published states, skipping lag notices.
///
/// # Panics
///
/// Panics if the states do not arrive within `timeout` or the loop stops.
pub async fn collect_states<S>(
    mut receiver: broadcast::Receiver<S>,
    count: usize,
    timeout: Duration,
) -> Vec<S>
where
    S: Clone + Debug,
{
    let collect = async {
        let mut seen = Vec::with_capacity(count);
        while seen.len() < count {
            match receiver.recv().await {
                Ok(state) => seen.push(state),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        seen
    };

    let seen = tokio::time::timeout(timeout, collect)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {} states", count));
    assert_eq!(seen.len(), count, "loop stopped early, got {:?}", seen);
    seen
}

/// Assert that nothing is published for `quiet`.
///
/// # Panics
///
/// Panics with the unexpected state if one arrives.
pub async fn expect_quiet<S>(receiver: &mut broadcast::Receiver<S>, quiet: Duration)
where
    S: Clone + Debug,
{
    if let Ok(Ok(state)) = tokio::time::timeout(quiet, receiver.recv()).await {
        panic!("expected no publication, got {:?}", state);
    }
}
