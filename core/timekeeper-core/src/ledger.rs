//! Append-only record of the laps captured in the current session.

use timekeeper_protocol::Lap;

#[derive(Debug, Default, Clone)]
pub struct LapLedger {
    laps: Vec<Lap>,
}

impl LapLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, lap: Lap) {
        self.laps.push(lap);
    }

    /// Laps in capture order.
    pub fn all(&self) -> &[Lap] {
        &self.laps
    }

    pub(crate) fn len(&self) -> usize {
        self.laps.len()
    }

    /// Only called when the session is torn down.
    pub(crate) fn clear(&mut self) {
        self.laps.clear();
    }
}
