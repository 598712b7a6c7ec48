use timekeeper_protocol::{ErrorInfo, EventEnvelope, EventType, RaceStatus, Racer};

/// Top-level timekeeper state. `RaceActive` carries its own inner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Transient: tears the session down, then falls through to `ReadyToStart`.
    RaceReset,
    ReadyToStart,
    RaceActive(ActiveState),
    RaceOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveState {
    Running,
    Paused,
    /// Transient: records one lap, then picks the next inner state.
    CapturingLap,
    /// Inner final state. Completes `RaceActive` into `RaceOver`.
    Done,
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::RaceReset => "RaceReset",
            State::ReadyToStart => "ReadyToStart",
            State::RaceActive(ActiveState::Running) => "RaceActive.Running",
            State::RaceActive(ActiveState::Paused) => "RaceActive.Paused",
            State::RaceActive(ActiveState::CapturingLap) => "RaceActive.CapturingLap",
            State::RaceActive(ActiveState::Done) => "RaceActive.Done",
            State::RaceOver => "RaceOver",
        }
    }

    pub fn race_status(&self) -> RaceStatus {
        match self {
            State::RaceReset => RaceStatus::NoRacerSelected,
            State::ReadyToStart => RaceStatus::ReadyToStart,
            State::RaceActive(ActiveState::Running | ActiveState::CapturingLap) => {
                RaceStatus::RaceInProgress
            }
            State::RaceActive(ActiveState::Paused) => RaceStatus::RacePaused,
            State::RaceActive(ActiveState::Done) | State::RaceOver => RaceStatus::RaceFinished,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Toggle,
    End,
    Capture,
    AutoCapture,
    DidNotFinish,
    Expire,
    Resume,
    OffTrack,
    SelectRacer(Racer),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Toggle => "TOGGLE",
            Event::End => "END",
            Event::Capture => "CAPTURE",
            Event::AutoCapture => "AUTO_CAPTURE",
            Event::DidNotFinish => "DID_NOT_FINISH",
            Event::Expire => "EXPIRE",
            Event::Resume => "RESUME",
            Event::OffTrack => "OFF_TRACK",
            Event::SelectRacer(_) => "SELECT_RACER",
        }
    }
}

impl TryFrom<&EventEnvelope> for Event {
    type Error = ErrorInfo;

    fn try_from(envelope: &EventEnvelope) -> Result<Self, Self::Error> {
        let event = match envelope.event_type {
            EventType::Toggle => Event::Toggle,
            EventType::End => Event::End,
            EventType::Capture => Event::Capture,
            EventType::AutoCapture => Event::AutoCapture,
            EventType::DidNotFinish => Event::DidNotFinish,
            EventType::Expire => Event::Expire,
            EventType::Resume => Event::Resume,
            EventType::OffTrack => Event::OffTrack,
            EventType::SelectRacer => match envelope.racer() {
                Some(racer) => Event::SelectRacer(racer),
                None => {
                    return Err(ErrorInfo::new(
                        "missing_field",
                        "select_racer requires racer_id and racer_name",
                    ))
                }
            },
        };
        Ok(event)
    }
}

/// Side effect executed by the driver, in order, after the table has decided
/// a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ClearSession,
    ResetTimer,
    StageRacer(Racer),
    AssignRacer,
    StartTimer,
    PauseTimer,
    ClearExpired,
    MarkExpired,
    MarkDidNotFinish,
    ClearDidNotFinish,
    CaptureLap,
    CountOffTrack,
    PublishBegin,
    PublishUpdate,
    PublishEnd,
    Finalize,
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::ClearSession => "clear_session",
            Effect::ResetTimer => "reset_timer",
            Effect::StageRacer(_) => "stage_racer",
            Effect::AssignRacer => "assign_racer",
            Effect::StartTimer => "start_timer",
            Effect::PauseTimer => "pause_timer",
            Effect::ClearExpired => "clear_expired",
            Effect::MarkExpired => "mark_expired",
            Effect::MarkDidNotFinish => "mark_did_not_finish",
            Effect::ClearDidNotFinish => "clear_did_not_finish",
            Effect::CaptureLap => "capture_lap",
            Effect::CountOffTrack => "count_off_track",
            Effect::PublishBegin => "publish_begin",
            Effect::PublishUpdate => "publish_update",
            Effect::PublishEnd => "publish_end",
            Effect::Finalize => "finalize",
        }
    }
}

/// The session flags eventless guards read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Guards {
    pub race_time_is_expired: bool,
    pub did_not_finish_pending: bool,
}

/// Outcome of an event in the current state. `target: None` is an internal
/// transition: actions run, but no state is exited or entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub actions: Vec<Effect>,
    pub target: Option<State>,
}

impl Transition {
    pub(crate) fn to(target: State) -> Self {
        Self {
            actions: Vec::new(),
            target: Some(target),
        }
    }

    pub(crate) fn internal(actions: Vec<Effect>) -> Self {
        Self {
            actions,
            target: None,
        }
    }

    pub(crate) fn with_actions(actions: Vec<Effect>, target: State) -> Self {
        Self {
            actions,
            target: Some(target),
        }
    }
}
