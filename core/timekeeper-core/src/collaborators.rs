//! Outbound collaborators of the timekeeper.
//!
//! Both are notifications: the timekeeper never waits on them and never
//! undoes a transition because one failed.

use std::sync::{Arc, Mutex};
use timekeeper_protocol::Snapshot;

use crate::error::CollaboratorError;

/// Pushes session-visible state to spectator displays.
pub trait OverlayPublisher {
    fn begin(&mut self, snapshot: &Snapshot) -> Result<(), CollaboratorError>;
    fn update(&mut self, snapshot: &Snapshot) -> Result<(), CollaboratorError>;
    fn end(&mut self) -> Result<(), CollaboratorError>;
}

/// Receives the finished session when a race is over.
pub trait ResultsFinalizer {
    fn finalize(&mut self, snapshot: &Snapshot) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

impl OverlayPublisher for NullPublisher {
    fn begin(&mut self, _snapshot: &Snapshot) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn update(&mut self, _snapshot: &Snapshot) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn end(&mut self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullFinalizer;

impl ResultsFinalizer for NullFinalizer {
    fn finalize(&mut self, _snapshot: &Snapshot) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayPush {
    Begin(Snapshot),
    Update(Snapshot),
    End,
}

/// Publisher that keeps every push in memory. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct MemoryPublisher {
    pushes: Arc<Mutex<Vec<OverlayPush>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pushes(&self) -> Vec<OverlayPush> {
        self.pushes
            .lock()
            .map(|pushes| pushes.clone())
            .unwrap_or_default()
    }

    fn record(&self, push: OverlayPush) -> Result<(), CollaboratorError> {
        let mut pushes = self
            .pushes
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("overlay log poisoned".to_string()))?;
        pushes.push(push);
        Ok(())
    }
}

impl OverlayPublisher for MemoryPublisher {
    fn begin(&mut self, snapshot: &Snapshot) -> Result<(), CollaboratorError> {
        self.record(OverlayPush::Begin(snapshot.clone()))
    }

    fn update(&mut self, snapshot: &Snapshot) -> Result<(), CollaboratorError> {
        self.record(OverlayPush::Update(snapshot.clone()))
    }

    fn end(&mut self) -> Result<(), CollaboratorError> {
        self.record(OverlayPush::End)
    }
}

/// Finalizer that keeps every finished session in memory. Clones share the
/// same list.
#[derive(Debug, Default, Clone)]
pub struct MemoryFinalizer {
    results: Arc<Mutex<Vec<Snapshot>>>,
}

impl MemoryFinalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<Snapshot> {
        self.results
            .lock()
            .map(|results| results.clone())
            .unwrap_or_default()
    }
}

impl ResultsFinalizer for MemoryFinalizer {
    fn finalize(&mut self, snapshot: &Snapshot) -> Result<(), CollaboratorError> {
        let mut results = self
            .results
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("results log poisoned".to_string()))?;
        results.push(snapshot.clone());
        Ok(())
    }
}
