//! Run-to-completion driver for the race state machine.
//!
//! Each dispatch looks the event up in the transition table, runs the
//! transition's actions, then keeps entering states until no eventless
//! transition applies. Only then does control return to the caller, so a
//! capture (append, then decide) is never interleaved with another event.

use chrono::Utc;
use std::time::Duration;
use timekeeper_protocol::{Lap, Snapshot};
use tracing::{debug, info, warn};

use crate::collaborators::{OverlayPublisher, ResultsFinalizer};
use crate::config::RaceConfig;
use crate::error::{CollaboratorError, EffectFailure};
use crate::machine::{self, Effect, Event, State};
use crate::session::Session;
use crate::timer::{Countdown, RaceTimer};

pub type BoxedPublisher = Box<dyn OverlayPublisher + Send>;
pub type BoxedFinalizer = Box<dyn ResultsFinalizer + Send>;

pub struct Timekeeper<T: RaceTimer = Countdown> {
    state: State,
    session: Session,
    timer: T,
    race_duration: Duration,
    publisher: BoxedPublisher,
    finalizer: BoxedFinalizer,
    failures: Vec<EffectFailure>,
}

impl Timekeeper<Countdown> {
    pub fn new(config: &RaceConfig, publisher: BoxedPublisher, finalizer: BoxedFinalizer) -> Self {
        Self::with_timer(
            config,
            Countdown::new(config.duration()),
            publisher,
            finalizer,
        )
    }
}

impl<T: RaceTimer> Timekeeper<T> {
    /// Builds a timekeeper in `ReadyToStart` and runs that state's entry
    /// actions.
    pub fn with_timer(
        config: &RaceConfig,
        mut timer: T,
        publisher: BoxedPublisher,
        finalizer: BoxedFinalizer,
    ) -> Self {
        let race_duration = config.duration();
        timer.reset(race_duration);
        let mut timekeeper = Self {
            state: State::ReadyToStart,
            session: Session::new(race_duration),
            timer,
            race_duration,
            publisher,
            finalizer,
            failures: Vec::new(),
        };
        for effect in machine::entry_effects(&State::ReadyToStart) {
            timekeeper.apply(&effect);
        }
        timekeeper
    }

    /// Processes one event to completion and returns the resulting snapshot.
    /// Events with no transition in the current state are ignored.
    pub fn dispatch(&mut self, event: Event) -> Snapshot {
        let Some(transition) = machine::on_event(&self.state, &event) else {
            debug!(
                state = self.state.name(),
                event = event.name(),
                "Ignored event"
            );
            return self.snapshot();
        };

        for effect in &transition.actions {
            self.apply(effect);
        }

        if let Some(target) = transition.target {
            self.enter(target, event.name());
            self.settle();
        }

        self.snapshot()
    }

    /// Polls the timer and dispatches `EXPIRE` when it has just drained.
    pub fn tick(&mut self) -> Option<Snapshot> {
        if !self.timer.poll_expired() {
            return None;
        }
        info!(state = self.state.name(), "Race time expired");
        Some(self.dispatch(Event::Expire))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot(&self.state, self.timer.remaining())
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn laps(&self) -> &[Lap] {
        self.session.laps()
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Drains collaborator failures recorded since the last call.
    pub fn take_effect_failures(&mut self) -> Vec<EffectFailure> {
        std::mem::take(&mut self.failures)
    }

    fn enter(&mut self, target: State, cause: &'static str) {
        for effect in machine::exit_effects(&self.state) {
            self.apply(&effect);
        }
        info!(
            from = self.state.name(),
            to = target.name(),
            cause,
            "State transition"
        );
        self.state = target;
        for effect in machine::entry_effects(&self.state) {
            self.apply(&effect);
        }
    }

    fn settle(&mut self) {
        while let Some(next) = machine::eventless(&self.state, self.session.guards()) {
            self.enter(next, "eventless");
        }
    }

    fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::ClearSession => self.session.clear(self.race_duration),
            Effect::ResetTimer => self.timer.reset(self.race_duration),
            Effect::StageRacer(racer) => self.session.staged_racer = Some(racer.clone()),
            Effect::AssignRacer => self.session.assign_staged_racer(),
            Effect::StartTimer => {
                let remaining = self.timer.remaining();
                self.timer.start(remaining);
            }
            Effect::PauseTimer => self.timer.pause(),
            Effect::ClearExpired => self.session.race_time_is_expired = false,
            Effect::MarkExpired => self.session.race_time_is_expired = true,
            Effect::MarkDidNotFinish => self.session.did_not_finish_pending = true,
            Effect::ClearDidNotFinish => self.session.did_not_finish_pending = false,
            Effect::CaptureLap => {
                let remaining = self.timer.remaining();
                let lap = self.session.capture_lap(remaining, Utc::now());
                info!(
                    lap_number = lap.lap_number,
                    elapsed_ms = lap.elapsed_ms,
                    is_valid = lap.is_valid,
                    off_track_resets = lap.off_track_resets,
                    "Lap captured"
                );
            }
            Effect::CountOffTrack => {
                self.session.off_track_resets = self.session.off_track_resets.saturating_add(1);
            }
            Effect::PublishBegin => {
                let snapshot = self.snapshot();
                let result = self.publisher.begin(&snapshot);
                self.record(effect, result);
            }
            Effect::PublishUpdate => {
                let snapshot = self.snapshot();
                let result = self.publisher.update(&snapshot);
                self.record(effect, result);
            }
            Effect::PublishEnd => {
                let result = self.publisher.end();
                self.record(effect, result);
            }
            Effect::Finalize => {
                let snapshot = self.snapshot();
                info!(
                    racer = ?snapshot.racer.as_ref().map(|racer| racer.id.as_str()),
                    laps = snapshot.laps.len(),
                    "Finalizing race"
                );
                let result = self.finalizer.finalize(&snapshot);
                self.record(effect, result);
            }
        }
    }

    fn record(&mut self, effect: &Effect, result: Result<(), CollaboratorError>) {
        if let Err(err) = result {
            warn!(
                effect = effect.name(),
                state = self.state.name(),
                error = %err,
                "Collaborator call failed"
            );
            self.failures.push(EffectFailure {
                effect: effect.name(),
                message: err.to_string(),
            });
        }
    }
}
