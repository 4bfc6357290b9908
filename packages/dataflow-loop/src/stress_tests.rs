//! Stress tests designed to break the loop.
//!
//! These tests exercise concurrent dispatch, feedback storms and the
//! single-reduction guarantee.

#[cfg(test)]
mod stress_tests {
    use crate::effect::{ActionSender, EffectHandler};
    use crate::reducer::{Next, Reducer};
    use crate::runtime::LoopBuilder;
    use crate::testing::collect_states;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    // ==========================================================================
    // Test Types
    // ==========================================================================

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Tally {
        total: usize,
        per_source: Vec<Vec<usize>>,
    }

    #[derive(Debug, Clone)]
    enum Action {
        Record { source: usize, seq: usize },
        Spawn { depth: usize },
        Bump,
    }

    #[derive(Debug, Clone)]
    enum Effect {
        Recurse { depth: usize },
    }

    struct TallyReducer {
        in_flight: Arc<AtomicBool>,
        overlaps: Arc<AtomicUsize>,
    }

    impl Reducer for TallyReducer {
        type State = Tally;
        type Action = Action;
        type Effect = Effect;

        fn reduce(&self, state: &Tally, action: Action) -> Next<Tally, Effect> {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }

            let next = match action {
                Action::Record { source, seq } => {
                    let mut tally = state.clone();
                    if tally.per_source.len() <= source {
                        tally.per_source.resize(source + 1, Vec::new());
                    }
                    tally.per_source[source].push(seq);
                    tally.total += 1;
                    Next::to(tally)
                }
                Action::Spawn { depth } if depth == 0 => Next::nothing(),
                Action::Spawn { depth } => {
                    let mut tally = state.clone();
                    tally.total += 1;
                    Next::to_with(tally, Effect::Recurse { depth: depth - 1 })
                }
                Action::Bump => {
                    let mut tally = state.clone();
                    tally.total += 1;
                    Next::to(tally)
                }
            };

            self.in_flight.store(false, Ordering::SeqCst);
            next
        }
    }

    struct RecurseHandler;

    #[async_trait]
    impl EffectHandler<Effect, Action> for RecurseHandler {
        fn handles(&self, _effect: &Effect) -> bool {
            true
        }

        async fn handle_effect(&self, effect: Effect, actions: &ActionSender<Action>) {
            let Effect::Recurse { depth } = effect;
            // Fan out: one follow-up continues the chain, one is a plain bump.
            actions.dispatch(Action::Spawn { depth });
            actions.dispatch(Action::Bump);
        }
    }

    fn reducer() -> (TallyReducer, Arc<AtomicUsize>) {
        let overlaps = Arc::new(AtomicUsize::new(0));
        (
            TallyReducer {
                in_flight: Arc::new(AtomicBool::new(false)),
                overlaps: overlaps.clone(),
            },
            overlaps,
        )
    }

    // ==========================================================================
    // Tests
    // ==========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_keeps_per_source_order() {
        const SOURCES: usize = 8;
        const PER_SOURCE: usize = 200;

        let (reducer, overlaps) = reducer();
        let lp = Arc::new(LoopBuilder::new(reducer, Tally::default()).build());
        let mut watch = lp.watch();
        lp.start().await.unwrap();

        let mut tasks = Vec::new();
        for source in 0..SOURCES {
            let actions = lp.action_sender();
            tasks.push(tokio::spawn(async move {
                for seq in 0..PER_SOURCE {
                    actions.dispatch(Action::Record { source, seq });
                    if seq % 16 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        tokio::time::timeout(
            Duration::from_secs(5),
            watch.wait_for(|t| t.total == SOURCES * PER_SOURCE),
        )
        .await
        .expect("timed out")
        .unwrap();

        let tally = lp.state();
        for seqs in &tally.per_source {
            let expected: Vec<usize> = (0..PER_SOURCE).collect();
            assert_eq!(seqs, &expected);
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_feedback_storm_settles() {
        const DEPTH: usize = 100;

        let (reducer, overlaps) = reducer();
        let lp = LoopBuilder::new(reducer, Tally::default())
            .with_effect_handler(RecurseHandler)
            .build();
        let mut watch = lp.watch();
        lp.start().await.unwrap();

        lp.dispatch(Action::Spawn { depth: DEPTH });

        // Every level counts once for its Spawn and once for its Bump.
        tokio::time::timeout(
            Duration::from_secs(5),
            watch.wait_for(|t| t.total == DEPTH * 2),
        )
        .await
        .expect("timed out")
        .unwrap();
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_every_action_publishes_once() {
        let (reducer, _) = reducer();
        let lp = LoopBuilder::new(reducer, Tally::default())
            .with_state_capacity(4096)
            .build();
        let states = lp.subscribe();
        lp.start().await.unwrap();

        for _ in 0..500 {
            lp.dispatch(Action::Bump);
        }

        let seen = collect_states(states, 500, Duration::from_secs(5)).await;
        let totals: Vec<usize> = seen.iter().map(|t| t.total).collect();
        let expected: Vec<usize> = (1..=500).collect();
        assert_eq!(totals, expected);
    }
}
