//! The timekeeper transition table.
//!
//! Pure functions only: given a state (and, for eventless transitions, the
//! session guards) they return what happens next. The driver in
//! [`crate::timekeeper`] executes the effects.

use super::types::{ActiveState, Effect, Event, Guards, State, Transition};

const RUNNING: State = State::RaceActive(ActiveState::Running);
const PAUSED: State = State::RaceActive(ActiveState::Paused);
const CAPTURING_LAP: State = State::RaceActive(ActiveState::CapturingLap);
const ACTIVE_DONE: State = State::RaceActive(ActiveState::Done);

/// Transition for `event` in `state`, or `None` when the event is ignored.
pub fn on_event(state: &State, event: &Event) -> Option<Transition> {
    let transition = match (state, event) {
        (State::ReadyToStart, Event::Toggle | Event::AutoCapture) => Transition::to(RUNNING),
        (State::ReadyToStart, Event::End) => Transition::to(State::RaceReset),
        (State::ReadyToStart, Event::SelectRacer(racer)) => Transition::with_actions(
            vec![Effect::StageRacer(racer.clone())],
            State::ReadyToStart,
        ),

        (State::RaceActive(ActiveState::Running), Event::Toggle) => Transition::to(PAUSED),
        (State::RaceActive(ActiveState::Running), Event::Expire) => {
            Transition::internal(vec![Effect::MarkExpired, Effect::PublishUpdate])
        }
        (State::RaceActive(ActiveState::Running), Event::End) => Transition::to(ACTIVE_DONE),
        (State::RaceActive(ActiveState::Running), Event::Capture | Event::AutoCapture) => {
            Transition::to(CAPTURING_LAP)
        }
        // Flag and capture are one transition so the flag always tags this lap.
        (State::RaceActive(ActiveState::Running), Event::DidNotFinish) => {
            Transition::with_actions(vec![Effect::MarkDidNotFinish], CAPTURING_LAP)
        }

        (State::RaceActive(ActiveState::Paused), Event::Toggle | Event::AutoCapture) => {
            Transition::to(RUNNING)
        }
        (State::RaceActive(ActiveState::Paused), Event::End) => Transition::to(ACTIVE_DONE),

        (
            State::RaceActive(ActiveState::Running | ActiveState::Paused),
            Event::OffTrack,
        ) => Transition::internal(vec![Effect::CountOffTrack, Effect::PublishUpdate]),

        (State::RaceOver, Event::End) => Transition::to(State::RaceReset),
        (State::RaceOver, Event::Resume) => Transition::to(PAUSED),

        _ => return None,
    };
    Some(transition)
}

/// Effects run when `state` is entered.
pub fn entry_effects(state: &State) -> Vec<Effect> {
    match state {
        // Displays see the cleared session before the overlay closes.
        State::RaceReset => vec![
            Effect::ClearSession,
            Effect::ResetTimer,
            Effect::PublishUpdate,
            Effect::PublishEnd,
        ],
        State::ReadyToStart => vec![Effect::AssignRacer, Effect::PublishBegin],
        State::RaceActive(ActiveState::Running) => vec![
            Effect::ClearExpired,
            Effect::StartTimer,
            Effect::PublishBegin,
        ],
        State::RaceActive(ActiveState::Paused) => vec![Effect::PauseTimer, Effect::PublishUpdate],
        State::RaceActive(ActiveState::CapturingLap) => vec![Effect::CaptureLap],
        State::RaceActive(ActiveState::Done) => Vec::new(),
        State::RaceOver => vec![
            Effect::PauseTimer,
            Effect::PublishUpdate,
            Effect::PublishEnd,
            Effect::Finalize,
        ],
    }
}

/// Effects run when `state` is exited.
pub fn exit_effects(state: &State) -> Vec<Effect> {
    match state {
        State::RaceActive(ActiveState::CapturingLap) => vec![Effect::ClearDidNotFinish],
        _ => Vec::new(),
    }
}

/// Transition that fires without an event, or `None` when `state` is stable.
///
/// Capture guards are ordered: expiry wins over a pending did-not-finish.
pub fn eventless(state: &State, guards: Guards) -> Option<State> {
    match state {
        State::RaceReset => Some(State::ReadyToStart),
        State::RaceActive(ActiveState::CapturingLap) => {
            if !guards.race_time_is_expired && !guards.did_not_finish_pending {
                Some(RUNNING)
            } else if !guards.race_time_is_expired && guards.did_not_finish_pending {
                Some(PAUSED)
            } else {
                Some(ACTIVE_DONE)
            }
        }
        State::RaceActive(ActiveState::Done) => Some(State::RaceOver),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timekeeper_protocol::Racer;

    const ALL_STATES: [State; 7] = [
        State::RaceReset,
        State::ReadyToStart,
        RUNNING,
        PAUSED,
        CAPTURING_LAP,
        ACTIVE_DONE,
        State::RaceOver,
    ];

    fn all_events() -> Vec<Event> {
        vec![
            Event::Toggle,
            Event::End,
            Event::Capture,
            Event::AutoCapture,
            Event::DidNotFinish,
            Event::Expire,
            Event::Resume,
            Event::OffTrack,
            Event::SelectRacer(Racer {
                id: "racer-1".to_string(),
                display_name: "Racer One".to_string(),
            }),
        ]
    }

    fn target(state: State, event: Event) -> Option<State> {
        on_event(&state, &event).and_then(|transition| transition.target)
    }

    #[test]
    fn test_ready_to_start_toggle_starts_running() {
        assert_eq!(target(State::ReadyToStart, Event::Toggle), Some(RUNNING));
    }

    #[test]
    fn test_ready_to_start_auto_capture_starts_running() {
        assert_eq!(
            target(State::ReadyToStart, Event::AutoCapture),
            Some(RUNNING)
        );
    }

    #[test]
    fn test_running_toggle_pauses() {
        assert_eq!(target(RUNNING, Event::Toggle), Some(PAUSED));
    }

    #[test]
    fn test_running_expire_is_internal() {
        assert_eq!(
            on_event(&RUNNING, &Event::Expire),
            Some(Transition::internal(vec![
                Effect::MarkExpired,
                Effect::PublishUpdate
            ]))
        );
    }

    #[test]
    fn test_running_did_not_finish_marks_then_captures() {
        let transition = on_event(&RUNNING, &Event::DidNotFinish).expect("handled");
        assert_eq!(transition.actions, vec![Effect::MarkDidNotFinish]);
        assert_eq!(transition.target, Some(CAPTURING_LAP));
    }

    #[test]
    fn test_running_end_completes_race_active() {
        assert_eq!(target(RUNNING, Event::End), Some(ACTIVE_DONE));
    }

    #[test]
    fn test_paused_resumes_on_toggle_or_sensor() {
        assert_eq!(target(PAUSED, Event::Toggle), Some(RUNNING));
        assert_eq!(target(PAUSED, Event::AutoCapture), Some(RUNNING));
    }

    #[test]
    fn test_paused_ignores_manual_capture() {
        assert_eq!(on_event(&PAUSED, &Event::Capture), None);
        assert_eq!(on_event(&PAUSED, &Event::DidNotFinish), None);
    }

    #[test]
    fn test_race_over_resume_reenters_paused() {
        assert_eq!(target(State::RaceOver, Event::Resume), Some(PAUSED));
    }

    #[test]
    fn test_end_from_idle_states_resets() {
        assert_eq!(
            target(State::ReadyToStart, Event::End),
            Some(State::RaceReset)
        );
        assert_eq!(target(State::RaceOver, Event::End), Some(State::RaceReset));
    }

    #[test]
    fn test_select_racer_only_in_ready_to_start() {
        for state in ALL_STATES {
            let handled = on_event(
                &state,
                &Event::SelectRacer(Racer {
                    id: "r".to_string(),
                    display_name: "R".to_string(),
                }),
            )
            .is_some();
            assert_eq!(handled, state == State::ReadyToStart, "{}", state.name());
        }
    }

    #[test]
    fn test_transient_states_ignore_events() {
        for state in [State::RaceReset, CAPTURING_LAP, ACTIVE_DONE] {
            for event in all_events() {
                assert_eq!(on_event(&state, &event), None, "{}", state.name());
            }
        }
    }

    #[test]
    fn test_stable_states_have_no_eventless_exit() {
        for state in [State::ReadyToStart, RUNNING, PAUSED, State::RaceOver] {
            for expired in [false, true] {
                for pending in [false, true] {
                    let guards = Guards {
                        race_time_is_expired: expired,
                        did_not_finish_pending: pending,
                    };
                    assert_eq!(eventless(&state, guards), None);
                }
            }
        }
    }

    #[test]
    fn test_capture_guards_in_order() {
        let guards = |expired, pending| Guards {
            race_time_is_expired: expired,
            did_not_finish_pending: pending,
        };
        assert_eq!(eventless(&CAPTURING_LAP, guards(false, false)), Some(RUNNING));
        assert_eq!(eventless(&CAPTURING_LAP, guards(false, true)), Some(PAUSED));
        assert_eq!(
            eventless(&CAPTURING_LAP, guards(true, false)),
            Some(ACTIVE_DONE)
        );
        // Expiry wins over an outstanding did-not-finish.
        assert_eq!(
            eventless(&CAPTURING_LAP, guards(true, true)),
            Some(ACTIVE_DONE)
        );
    }

    #[test]
    fn test_completion_and_reset_fall_through() {
        let guards = Guards::default();
        assert_eq!(eventless(&ACTIVE_DONE, guards), Some(State::RaceOver));
        assert_eq!(
            eventless(&State::RaceReset, guards),
            Some(State::ReadyToStart)
        );
    }

    #[test]
    fn test_every_target_is_a_declared_state() {
        for state in ALL_STATES {
            for event in all_events() {
                if let Some(next) = target(state, event) {
                    assert!(ALL_STATES.contains(&next));
                }
            }
        }
    }

    #[test]
    fn test_entry_effects_follow_state_contracts() {
        assert_eq!(
            entry_effects(&State::RaceOver),
            vec![
                Effect::PauseTimer,
                Effect::PublishUpdate,
                Effect::PublishEnd,
                Effect::Finalize
            ]
        );
        assert_eq!(
            entry_effects(&State::RaceReset),
            vec![
                Effect::ClearSession,
                Effect::ResetTimer,
                Effect::PublishUpdate,
                Effect::PublishEnd
            ]
        );
        assert!(entry_effects(&RUNNING).contains(&Effect::ClearExpired));
        assert_eq!(exit_effects(&CAPTURING_LAP), vec![Effect::ClearDidNotFinish]);
        assert!(exit_effects(&RUNNING).is_empty());
    }
}
