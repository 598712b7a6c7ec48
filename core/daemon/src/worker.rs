//! The single event loop that owns the timekeeper.
//!
//! Connection threads, the CLI, and track sensors all reach the timekeeper
//! through one channel, so events are processed strictly in arrival order and
//! each one runs to completion before the next. Timer expiry is polled from
//! the same loop, which makes `EXPIRE` just another entry in that order.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use timekeeper_core::{Event, RaceTimer, Timekeeper};
use timekeeper_protocol::{ErrorInfo, EventSource, Snapshot};
use tracing::{debug, info, warn};

const REPLY_TIMEOUT_SECS: u64 = 2;

pub enum Command {
    Dispatch {
        event: Event,
        event_id: String,
        source: EventSource,
        reply: Sender<Snapshot>,
    },
    Snapshot {
        reply: Sender<Snapshot>,
    },
}

#[derive(Clone)]
pub struct TimekeeperHandle {
    sender: Sender<Command>,
}

impl TimekeeperHandle {
    pub fn dispatch(
        &self,
        event: Event,
        event_id: String,
        source: EventSource,
    ) -> Result<Snapshot, ErrorInfo> {
        let (reply, response) = mpsc::channel();
        self.send(Command::Dispatch {
            event,
            event_id,
            source,
            reply,
        })?;
        wait_for_reply(response)
    }

    pub fn snapshot(&self) -> Result<Snapshot, ErrorInfo> {
        let (reply, response) = mpsc::channel();
        self.send(Command::Snapshot { reply })?;
        wait_for_reply(response)
    }

    fn send(&self, command: Command) -> Result<(), ErrorInfo> {
        self.sender
            .send(command)
            .map_err(|_| ErrorInfo::new("daemon_unavailable", "timekeeper loop has stopped"))
    }
}

fn wait_for_reply(response: Receiver<Snapshot>) -> Result<Snapshot, ErrorInfo> {
    response
        .recv_timeout(Duration::from_secs(REPLY_TIMEOUT_SECS))
        .map_err(|_| ErrorInfo::new("daemon_unavailable", "timekeeper loop did not reply"))
}

pub fn spawn_timekeeper<T>(
    timekeeper: Timekeeper<T>,
    tick_interval: Duration,
) -> std::io::Result<(TimekeeperHandle, JoinHandle<()>)>
where
    T: RaceTimer + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let join = thread::Builder::new()
        .name("timekeeper".to_string())
        .spawn(move || run_loop(timekeeper, receiver, tick_interval))?;
    Ok((TimekeeperHandle { sender }, join))
}

fn run_loop<T: RaceTimer>(
    mut timekeeper: Timekeeper<T>,
    receiver: Receiver<Command>,
    tick_interval: Duration,
) {
    loop {
        let command = match receiver.recv_timeout(tick_interval) {
            Ok(command) => Some(command),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // Expiry that happened before this command arrived is handled first.
        if timekeeper.tick().is_some() {
            report_failures(&mut timekeeper);
        }

        match command {
            Some(Command::Dispatch {
                event,
                event_id,
                source,
                reply,
            }) => {
                debug!(
                    event = event.name(),
                    event_id = %event_id,
                    source = ?source,
                    "Dispatching event"
                );
                let snapshot = timekeeper.dispatch(event);
                report_failures(&mut timekeeper);
                let _ = reply.send(snapshot);
            }
            Some(Command::Snapshot { reply }) => {
                let _ = reply.send(timekeeper.snapshot());
            }
            None => {}
        }
    }

    info!("Timekeeper loop stopped");
}

fn report_failures<T: RaceTimer>(timekeeper: &mut Timekeeper<T>) {
    for failure in timekeeper.take_effect_failures() {
        warn!(
            effect = failure.effect,
            error = %failure.message,
            "Collaborator failure"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timekeeper_core::{
        Countdown, ManualClock, MemoryFinalizer, NullPublisher, RaceConfig, RaceStatus,
    };

    fn spawn_with_clock() -> (TimekeeperHandle, ManualClock, MemoryFinalizer) {
        let clock = ManualClock::new();
        let finalizer = MemoryFinalizer::new();
        let config = RaceConfig { duration_secs: 10 };
        let timekeeper = Timekeeper::with_timer(
            &config,
            Countdown::with_clock(config.duration(), clock.clone()),
            Box::new(NullPublisher),
            Box::new(finalizer.clone()),
        );
        let (handle, _join) =
            spawn_timekeeper(timekeeper, Duration::from_millis(5)).expect("spawn loop");
        (handle, clock, finalizer)
    }

    #[test]
    fn dispatch_returns_post_event_snapshot() {
        let (handle, _clock, _finalizer) = spawn_with_clock();
        let snapshot = handle
            .dispatch(Event::Toggle, "evt-1".to_string(), EventSource::Operator)
            .expect("dispatch");
        assert_eq!(snapshot.race_status, RaceStatus::RaceInProgress);
    }

    #[test]
    fn expiry_is_processed_before_the_next_event() {
        let (handle, clock, finalizer) = spawn_with_clock();
        handle
            .dispatch(Event::Toggle, "evt-1".to_string(), EventSource::Operator)
            .expect("dispatch");
        clock.advance(Duration::from_secs(11));

        let snapshot = handle
            .dispatch(Event::AutoCapture, "evt-2".to_string(), EventSource::Sensor)
            .expect("dispatch");
        assert_eq!(snapshot.state, "RaceOver");
        assert_eq!(snapshot.laps.len(), 1);
        assert_eq!(finalizer.results().len(), 1);
    }

    #[test]
    fn snapshot_query_does_not_change_state() {
        let (handle, _clock, _finalizer) = spawn_with_clock();
        let first = handle.snapshot().expect("snapshot");
        let second = handle.snapshot().expect("snapshot");
        assert_eq!(first, second);
        assert_eq!(first.state, "ReadyToStart");
    }
}
