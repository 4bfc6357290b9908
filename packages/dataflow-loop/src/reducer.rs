//! Reducer trait and panic-safe runner.
//!
//! Reducers are pure transition functions: they look at the current state and
//! an action and return the next state plus the effects that should run.
//!
//! # Key Properties
//!
//! - **Pure**: No IO, no async, no interior mutation
//! - **Fresh values**: The incoming state is borrowed, never mutated
//! - **Many effects**: A transition may request zero or more effects, in order
//! - **No-op is explicit**: `Next::nothing()` leaves the state untouched

use std::panic::{catch_unwind, AssertUnwindSafe};

use smallvec::SmallVec;
use tracing::error;

/// Ordered effects produced by one transition.
pub type Effects<E> = SmallVec<[E; 2]>;

/// Result of a single reduction.
///
/// `state == None` means the action did not change the state.
#[derive(Debug, Clone, PartialEq)]
pub struct Next<S, E> {
    pub state: Option<S>,
    pub effects: Effects<E>,
}

impl<S, E> Next<S, E> {
    /// Move to `state` without requesting any work.
    pub fn to(state: S) -> Self {
        Self {
            state: Some(state),
            effects: SmallVec::new(),
        }
    }

    /// Move to `state` and request a single effect.
    pub fn to_with(state: S, effect: E) -> Self {
        let mut effects = SmallVec::new();
        effects.push(effect);
        Self {
            state: Some(state),
            effects,
        }
    }

    /// Keep the state and request the given effects.
    pub fn effects_only(effects: impl IntoIterator<Item = E>) -> Self {
        Self {
            state: None,
            effects: effects.into_iter().collect(),
        }
    }

    /// Drop the action: state unchanged, no effects.
    pub fn nothing() -> Self {
        Self {
            state: None,
            effects: SmallVec::new(),
        }
    }

    /// True when the action was dropped.
    pub fn is_noop(&self) -> bool {
        self.state.is_none() && self.effects.is_empty()
    }
}

/// A pure state machine driven by a [`Loop`](crate::Loop).
///
/// # Example
///
/// ```ignore
/// use dataflow_loop::{Next, Reducer};
///
/// struct CounterReducer;
///
/// impl Reducer for CounterReducer {
///     type State = u32;
///     type Action = CounterAction;
///     type Effect = CounterEffect;
///
///     fn reduce(&self, state: &u32, action: CounterAction) -> Next<u32, CounterEffect> {
///         match action {
///             CounterAction::Increment => Next::to(state + 1),
///             CounterAction::Announce => Next::effects_only([CounterEffect::Print(*state)]),
///         }
///     }
/// }
/// ```
pub trait Reducer: Send + Sync + 'static {
    /// The state owned by the loop.
    type State: Clone + Send + Sync + 'static;

    /// Inputs consumed exactly once by `reduce`.
    type Action: Send + 'static;

    /// Work requests handed to effect handlers.
    type Effect: Send + 'static;

    /// Compute the next state and effects for `action`.
    ///
    /// # Guarantees
    ///
    /// - Called synchronously (no async)
    /// - Called serially (never two reductions at once)
    fn reduce(&self, state: &Self::State, action: Self::Action) -> Next<Self::State, Self::Effect>;
}

/// Wraps a reducer so a panicking transition cannot take the loop down.
pub(crate) struct ReducerRunner<R> {
    reducer: R,
    name: &'static str,
}

impl<R: Reducer> ReducerRunner<R> {
    pub(crate) fn new(reducer: R) -> Self {
        Self {
            reducer,
            name: std::any::type_name::<R>(),
        }
    }

    /// Reduce `action`, treating a panic as a no-op.
    ///
    /// Because the reducer only borrows the state, a panic leaves the current
    /// state exactly as it was.
    pub(crate) fn reduce(&self, state: &R::State, action: R::Action) -> Next<R::State, R::Effect> {
        let result = catch_unwind(AssertUnwindSafe(|| self.reducer.reduce(state, action)));

        match result {
            Ok(next) => next,
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };

                error!(
                    reducer = self.name,
                    panic = %panic_msg,
                    "reducer panicked, action dropped"
                );
                Next::nothing()
            }
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }
}
