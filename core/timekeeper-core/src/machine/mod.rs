//! Race session state machine.
//!
//! ```text
//! RaceReset ──always──► ReadyToStart ──TOGGLE/AUTO_CAPTURE──► RaceActive.Running
//!     ▲                     │ END                               │  ▲
//!     │◄────────────────────┘                        TOGGLE     ▼  │ TOGGLE/AUTO_CAPTURE
//!     │                                             RaceActive.Paused
//!     │ END                                                     ▲
//!  RaceOver ◄──completion── RaceActive.Done ◄── CapturingLap ───┘ (dnf pending)
//!     │ RESUME ──► RaceActive.Paused
//! ```
//!
//! # Module Structure
//!
//! - [`types`]: states, events, effect descriptors, guards
//! - [`transition`]: the pure transition table and eventless rules

pub mod transition;
pub mod types;

pub use transition::{entry_effects, eventless, exit_effects, on_event};
pub use types::{ActiveState, Effect, Event, Guards, State, Transition};
