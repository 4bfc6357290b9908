//! # Dataflow Loop
//!
//! A unidirectional dataflow runtime where reducers decide, effect handlers
//! execute, and a single queue serializes every state change.
//!
//! ## Core Concepts
//!
//! - [`Reducer`] = Decisions (pure `(State, Action) -> (State, Effects)`)
//! - [`EffectHandler`] = Work (IO that reports back with new actions)
//! - [`ActionSource`] = Outside triggers merged into the same queue
//!
//! ## Architecture
//!
//! ```text
//! dispatch() / ActionSource
//!     │
//!     ▼
//! Action queue (FIFO) ◄──────────────────────────┐
//!     │                                          │
//!     ▼ drain (one action at a time)             │
//! Reducer.reduce(state, action)                  │
//!     │                                          │
//!     ├─► publish State ─► watch / subscribers   │
//!     │                                          │
//!     └─► Effects ─► EffectRouter                │
//!                        │                       │
//!          ┌─────────────┴──────────┐            │
//!          ▼                        ▼            │
//!    Handler A worker         Handler B worker   │
//!          │                        │            │
//!          └─► actions.dispatch() ──┴────────────┘
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Single writer** - Only the drain task replaces the state
//! 2. **Serial reduction** - Exactly one reduction is in flight at any time
//! 3. **Concurrent effects** - Handlers run beside the drain and each other
//! 4. **Feedback by message** - Handlers never mutate state, they dispatch
//! 5. **Ordered publication** - Subscribers see states in transition order
//!
//! ## Guarantees
//!
//! - **Never-blocking dispatch**: The queue is unbounded
//! - **Publish on every action**: No-ops republish the unchanged state
//! - **At-most-once publication**: Slow subscribers may miss states
//!
//! ## Example
//!
//! ```ignore
//! use dataflow_loop::{async_trait, ActionSender, EffectHandler, LoopBuilder, Next, Reducer};
//!
//! struct SearchReducer;
//!
//! impl Reducer for SearchReducer {
//!     type State = SearchState;
//!     type Action = SearchAction;
//!     type Effect = SearchEffect;
//!
//!     fn reduce(&self, state: &SearchState, action: SearchAction) -> Next<SearchState, SearchEffect> {
//!         match action {
//!             SearchAction::Query(q) => Next::to_with(SearchState::Searching, SearchEffect::Run(q)),
//!             SearchAction::Found(hits) => Next::to(SearchState::Results(hits)),
//!         }
//!     }
//! }
//!
//! struct SearchHandler { index: Index }
//!
//! #[async_trait]
//! impl EffectHandler<SearchEffect, SearchAction> for SearchHandler {
//!     fn handles(&self, effect: &SearchEffect) -> bool {
//!         matches!(effect, SearchEffect::Run(_))
//!     }
//!
//!     async fn handle_effect(&self, effect: SearchEffect, actions: &ActionSender<SearchAction>) {
//!         let SearchEffect::Run(q) = effect;
//!         actions.dispatch(SearchAction::Found(self.index.search(&q).await));
//!     }
//! }
//!
//! let lp = LoopBuilder::new(SearchReducer, SearchState::Idle)
//!     .with_effect_handler(SearchHandler { index })
//!     .build();
//!
//! lp.start().await?;
//! lp.dispatch(SearchAction::Query("rust".into()));
//! ```

mod bus;
mod effect;
mod error;
mod reducer;
mod runtime;
mod source;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Stress tests (test-only)
#[cfg(test)]
mod stress_tests;

pub use bus::{Bus, BusStream, DEFAULT_CAPACITY, MAX_CAPACITY};
pub use effect::{ActionSender, EffectHandler};
pub use error::LoopError;
pub use reducer::{Effects, Next, Reducer};
pub use runtime::{Loop, LoopBuilder};
pub use source::{ActionSource, StreamSource};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
