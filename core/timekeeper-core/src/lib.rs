//! # timekeeper-core
//!
//! Core library for the race timekeeper: the state machine that governs one
//! racer's timed session on one track, the race countdown, and the lap ledger.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The daemon owns the event loop.
//! - **Not thread-safe**: One [`Timekeeper`] per track, driven from one thread.
//!   Callers serialize events from every source into a single queue.
//! - **Total over events**: An event with no transition in the current state is
//!   ignored, never an error.
//! - **Pure table, explicit effects**: [`machine`] decides transitions and lists
//!   effect descriptors; [`Timekeeper`] executes them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use timekeeper_core::{Event, NullFinalizer, NullPublisher, RaceConfig, Timekeeper};
//!
//! let mut timekeeper = Timekeeper::new(
//!     &RaceConfig::default(),
//!     Box::new(NullPublisher),
//!     Box::new(NullFinalizer),
//! );
//! timekeeper.dispatch(Event::Toggle);
//! let snapshot = timekeeper.dispatch(Event::Capture);
//! ```

pub mod collaborators;
pub mod config;
pub mod error;
pub mod ledger;
pub mod machine;
pub mod session;
pub mod timekeeper;
pub mod timer;

pub use collaborators::{
    MemoryFinalizer, MemoryPublisher, NullFinalizer, NullPublisher, OverlayPublisher, OverlayPush,
    ResultsFinalizer,
};
pub use config::*;
pub use error::{CollaboratorError, EffectFailure, Result, TimekeeperError};
pub use ledger::LapLedger;
pub use machine::{ActiveState, Event, State};
pub use session::Session;
pub use timekeeper::{BoxedFinalizer, BoxedPublisher, Timekeeper};
pub use timer::{Clock, Countdown, ManualClock, MonotonicClock, RaceTimer};
pub use timekeeper_protocol::{Lap, RaceStatus, Racer, Snapshot};
