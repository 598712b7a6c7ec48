//! Per-racer session record owned by the timekeeper.

use chrono::{DateTime, Utc};
use std::time::Duration;
use timekeeper_protocol::{Lap, Racer, Snapshot};

use crate::ledger::LapLedger;
use crate::machine::{Guards, State};

#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) racer: Option<Racer>,
    /// Racer chosen while ready to start, assigned on (re)entering that state.
    pub(crate) staged_racer: Option<Racer>,
    pub(crate) race_time_is_expired: bool,
    pub(crate) did_not_finish_pending: bool,
    /// Off-track count accumulated since the previous capture.
    pub(crate) off_track_resets: u32,
    /// Timer reading at the previous capture, or at race start.
    lap_mark: Duration,
    ledger: LapLedger,
}

impl Session {
    pub fn new(race_duration: Duration) -> Self {
        Self {
            racer: None,
            staged_racer: None,
            race_time_is_expired: false,
            did_not_finish_pending: false,
            off_track_resets: 0,
            lap_mark: race_duration,
            ledger: LapLedger::new(),
        }
    }

    pub fn racer(&self) -> Option<&Racer> {
        self.racer.as_ref()
    }

    pub fn laps(&self) -> &[Lap] {
        self.ledger.all()
    }

    pub fn race_time_is_expired(&self) -> bool {
        self.race_time_is_expired
    }

    pub fn did_not_finish_pending(&self) -> bool {
        self.did_not_finish_pending
    }

    pub(crate) fn guards(&self) -> Guards {
        Guards {
            race_time_is_expired: self.race_time_is_expired,
            did_not_finish_pending: self.did_not_finish_pending,
        }
    }

    pub(crate) fn clear(&mut self, race_duration: Duration) {
        self.racer = None;
        self.staged_racer = None;
        self.race_time_is_expired = false;
        self.did_not_finish_pending = false;
        self.off_track_resets = 0;
        self.lap_mark = race_duration;
        self.ledger.clear();
    }

    pub(crate) fn assign_staged_racer(&mut self) {
        if let Some(racer) = self.staged_racer.take() {
            self.racer = Some(racer);
        }
    }

    /// Closes the open lap at timer reading `remaining`. Validity comes from
    /// the did-not-finish flag as it stands now.
    pub(crate) fn capture_lap(&mut self, remaining: Duration, captured_at: DateTime<Utc>) -> &Lap {
        let lap = Lap {
            lap_number: self.ledger.len() as u32 + 1,
            elapsed_ms: self.current_lap_time(remaining).as_millis() as u64,
            is_valid: !self.did_not_finish_pending,
            off_track_resets: self.off_track_resets,
            captured_at,
        };
        self.lap_mark = remaining;
        self.off_track_resets = 0;
        self.ledger.append(lap);
        &self.ledger.all()[self.ledger.len() - 1]
    }

    pub(crate) fn current_lap_time(&self, remaining: Duration) -> Duration {
        self.lap_mark.saturating_sub(remaining)
    }

    pub(crate) fn snapshot(&self, state: &State, remaining: Duration) -> Snapshot {
        Snapshot {
            state: state.name().to_string(),
            race_status: state.race_status(),
            racer: self.racer.clone(),
            remaining_time_ms: remaining.as_millis() as u64,
            current_lap_time_ms: self.current_lap_time(remaining).as_millis() as u64,
            race_time_is_expired: self.race_time_is_expired,
            did_not_finish_pending: self.did_not_finish_pending,
            off_track_resets: self.off_track_resets,
            laps: self.ledger.all().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laps_measure_race_clock_between_captures() {
        let mut session = Session::new(Duration::from_secs(60));
        let first = session
            .capture_lap(Duration::from_secs(48), Utc::now())
            .clone();
        assert_eq!(first.lap_number, 1);
        assert_eq!(first.elapsed_ms, 12_000);

        let second = session.capture_lap(Duration::from_millis(38_500), Utc::now());
        assert_eq!(second.lap_number, 2);
        assert_eq!(second.elapsed_ms, 9_500);
    }

    #[test]
    fn capture_moves_off_track_count_into_lap() {
        let mut session = Session::new(Duration::from_secs(60));
        session.off_track_resets = 2;
        session.did_not_finish_pending = true;

        let lap = session.capture_lap(Duration::from_secs(50), Utc::now());
        assert_eq!(lap.off_track_resets, 2);
        assert!(!lap.is_valid);
        assert_eq!(session.off_track_resets, 0);
    }

    #[test]
    fn clear_restores_fresh_session() {
        let mut session = Session::new(Duration::from_secs(60));
        session.staged_racer = Some(Racer {
            id: "racer-1".to_string(),
            display_name: "Racer One".to_string(),
        });
        session.assign_staged_racer();
        session.race_time_is_expired = true;
        session.capture_lap(Duration::from_secs(10), Utc::now());

        session.clear(Duration::from_secs(90));
        assert!(session.racer().is_none());
        assert!(session.laps().is_empty());
        assert!(!session.race_time_is_expired());
        assert_eq!(
            session.current_lap_time(Duration::from_secs(90)),
            Duration::ZERO
        );
    }
}
