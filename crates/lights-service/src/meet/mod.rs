//! Per-meet coordination: state, countdowns and round decisions.

pub mod decisions;
pub mod state;
pub mod timers;

pub use decisions::{DecisionCoordinator, RoundResult, SubmitOutcome};
pub use state::{MeetState, MeetStateStore, StateProvider};
pub use timers::TimerEngine;
