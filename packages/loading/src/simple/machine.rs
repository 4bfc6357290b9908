use std::marker::PhantomData;

use dataflow_loop::{Next, Reducer};

use super::{LoadingEvent, LoadingRequest, LoadingState};
use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum State<T> {
    Empty,
    Loading,
    Error(LoadError),
    Data(T),
    Refresh(T),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action<T> {
    Load { fresh: bool, reset: bool },
    Cancel { reset: bool },
    DataLoaded(T),
    EmptyDataLoaded,
    LoadingError(LoadError),
}

impl<T> From<LoadingRequest> for Action<T> {
    fn from(request: LoadingRequest) -> Self {
        match request {
            LoadingRequest::Refresh => Action::Load {
                fresh: true,
                reset: false,
            },
            LoadingRequest::Restart { fresh } => Action::Load { fresh, reset: true },
            LoadingRequest::Cancel { reset } => Action::Cancel { reset },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    Load { fresh: bool },
    CancelLoading,
    EmitEvent(LoadingEvent),
}

impl<T: Clone> State<T> {
    pub(crate) fn to_public(&self) -> LoadingState<T> {
        match self {
            State::Empty => LoadingState::Empty,
            State::Loading => LoadingState::Loading,
            State::Error(error) => LoadingState::Error(error.clone()),
            State::Data(data) => LoadingState::Data {
                data: data.clone(),
                refreshing: false,
            },
            State::Refresh(data) => LoadingState::Data {
                data: data.clone(),
                refreshing: true,
            },
        }
    }

    /// Nothing is in flight before start: `Loading` settles to `Empty` and
    /// refreshing data to plain data.
    pub(crate) fn from_initial(state: LoadingState<T>) -> Self {
        match state {
            LoadingState::Empty | LoadingState::Loading => State::Empty,
            LoadingState::Error(error) => State::Error(error),
            LoadingState::Data { data, .. } => State::Data(data),
        }
    }
}

pub(crate) struct LoadingReducer<T> {
    _data: PhantomData<fn() -> T>,
}

impl<T> LoadingReducer<T> {
    pub(crate) fn new() -> Self {
        Self { _data: PhantomData }
    }
}

impl<T> Reducer for LoadingReducer<T>
where
    T: Clone + Send + Sync + 'static,
{
    type State = State<T>;
    type Action = Action<T>;
    type Effect = Effect;

    fn reduce(&self, state: &State<T>, action: Action<T>) -> Next<State<T>, Effect> {
        match action {
            Action::Load { fresh, reset } => {
                let load = Effect::Load { fresh };
                if reset {
                    return Next::to_with(State::Loading, load);
                }
                match state {
                    State::Empty | State::Error(_) => Next::to_with(State::Loading, load),
                    State::Data(data) => Next::to_with(State::Refresh(data.clone()), load),
                    State::Loading | State::Refresh(_) => Next::nothing(),
                }
            }

            Action::Cancel { reset } => {
                if reset {
                    return Next::to_with(State::Empty, Effect::CancelLoading);
                }
                match state {
                    State::Loading => Next::to_with(State::Empty, Effect::CancelLoading),
                    State::Refresh(data) => {
                        Next::to_with(State::Data(data.clone()), Effect::CancelLoading)
                    }
                    _ => Next::nothing(),
                }
            }

            Action::DataLoaded(data) => match state {
                State::Loading | State::Refresh(_) => Next::to(State::Data(data)),
                _ => Next::nothing(),
            },

            Action::EmptyDataLoaded => match state {
                State::Loading | State::Refresh(_) => Next::to(State::Empty),
                _ => Next::nothing(),
            },

            Action::LoadingError(error) => match state {
                State::Loading => Next::to_with(
                    State::Error(error.clone()),
                    Effect::EmitEvent(LoadingEvent::Error {
                        error,
                        has_data: false,
                    }),
                ),
                State::Refresh(data) => Next::to_with(
                    State::Data(data.clone()),
                    Effect::EmitEvent(LoadingEvent::Error {
                        error,
                        has_data: true,
                    }),
                ),
                _ => Next::nothing(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataflow_loop::assert_transitions;
    use dataflow_loop::testing::ReducerTest;

    fn reducer() -> LoadingReducer<&'static str> {
        LoadingReducer::new()
    }

    fn all_states(error: &LoadError) -> Vec<State<&'static str>> {
        vec![
            State::Empty,
            State::Loading,
            State::Error(error.clone()),
            State::Data("a"),
            State::Refresh("a"),
        ]
    }

    #[test]
    fn test_load_and_refresh_cycle() {
        assert_transitions!(
            reducer(),
            State::Empty,
            Action::Load { fresh: false, reset: false } =>
                (Some(State::Loading), vec![Effect::Load { fresh: false }]),
            Action::Load { fresh: true, reset: false } => (None, vec![]),
            Action::DataLoaded("a") => (Some(State::Data("a")), vec![]),
            Action::Load { fresh: true, reset: false } =>
                (Some(State::Refresh("a")), vec![Effect::Load { fresh: true }]),
            Action::DataLoaded("b") => (Some(State::Data("b")), vec![]),
        );
    }

    #[test]
    fn test_reset_actions_apply_everywhere() {
        let error = LoadError::msg("boom");
        for state in all_states(&error) {
            let next = reducer().reduce(&state, Action::Load { fresh: true, reset: true });
            assert_eq!(next.state, Some(State::Loading));
            assert_eq!(next.effects.to_vec(), vec![Effect::Load { fresh: true }]);

            let next = reducer().reduce(&state, Action::Cancel { reset: true });
            assert_eq!(next.state, Some(State::Empty));
            assert_eq!(next.effects.to_vec(), vec![Effect::CancelLoading]);
        }
    }

    #[test]
    fn test_cancel_keeps_data() {
        ReducerTest::new(reducer())
            .given(State::Refresh("a"))
            .when(Action::Cancel { reset: false })
            .expect_state(State::Data("a"))
            .expect_effects(vec![Effect::CancelLoading])
            .then(Action::Cancel { reset: false })
            .expect_noop();

        ReducerTest::new(reducer())
            .given(State::Loading)
            .when(Action::Cancel { reset: false })
            .expect_state(State::Empty)
            .expect_effects(vec![Effect::CancelLoading]);
    }

    #[test]
    fn test_empty_result_clears() {
        for state in [State::Loading, State::Refresh("a")] {
            ReducerTest::new(reducer())
                .given(state)
                .when(Action::EmptyDataLoaded)
                .expect_state(State::Empty)
                .expect_effects(vec![]);
        }
    }

    #[test]
    fn test_errors_with_and_without_data() {
        let error = LoadError::msg("offline");

        ReducerTest::new(reducer())
            .given(State::Loading)
            .when(Action::LoadingError(error.clone()))
            .expect_state(State::Error(error.clone()))
            .expect_effects(vec![Effect::EmitEvent(LoadingEvent::Error {
                error: error.clone(),
                has_data: false,
            })]);

        ReducerTest::new(reducer())
            .given(State::Refresh("a"))
            .when(Action::LoadingError(error.clone()))
            .expect_state(State::Data("a"))
            .expect_effects(vec![Effect::EmitEvent(LoadingEvent::Error {
                error,
                has_data: true,
            })]);
    }

    #[test]
    fn test_results_outside_loading_are_noops() {
        let error = LoadError::msg("boom");
        for state in [State::Empty, State::Error(error.clone()), State::Data("a")] {
            for action in [
                Action::DataLoaded("z"),
                Action::EmptyDataLoaded,
                Action::LoadingError(error.clone()),
                Action::Cancel { reset: false },
            ] {
                assert!(reducer().reduce(&state, action).is_noop());
            }
        }
    }

    #[test]
    fn test_projection() {
        let error = LoadError::msg("boom");
        assert_eq!(State::<u8>::Empty.to_public(), LoadingState::Empty);
        assert_eq!(State::<u8>::Loading.to_public(), LoadingState::Loading);
        assert_eq!(
            State::<u8>::Error(error.clone()).to_public(),
            LoadingState::Error(error)
        );
        assert_eq!(State::Data(3).to_public(), LoadingState::data(3));
        assert_eq!(
            State::Refresh(3).to_public(),
            LoadingState::Data {
                data: 3,
                refreshing: true
            }
        );

        assert_eq!(State::<u8>::from_initial(LoadingState::Loading), State::Empty);
        assert_eq!(
            State::from_initial(LoadingState::Data {
                data: 3,
                refreshing: true
            }),
            State::Data(3)
        );
    }
}
