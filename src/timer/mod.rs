pub mod commands;
pub mod controller;
pub mod session;
pub mod state;

pub use commands::OperatorCommand;
pub use controller::{SessionController, TimerSnapshot};
pub use session::{Session, SessionEvent};
pub use state::{
    ClockEvent, ClockState, IntervalClock, Phase, PhaseDurations, SessionCounters, MAX_MINUTES,
};
