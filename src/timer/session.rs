use log::{debug, info};
use uuid::Uuid;

use crate::sensing::PresenceGate;

use super::state::{ClockEvent, ClockState, IntervalClock, Phase, PhaseDurations, SessionCounters};

/// Something observable happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Started,
    Paused,
    /// Presence was lost during work; the work phase starts over.
    WorkRestarted,
    Reset,
    PhaseCompleted { completed: Phase, next: Phase },
    DurationAdjusted { minutes: u32 },
}

/// The run/pause flag, the countdown and the interval counters.
///
/// Every method is synchronous and infallible; requests that make no sense in
/// the current state return `None` and change nothing.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    clock: IntervalClock,
    counters: SessionCounters,
    running: bool,
    durations: PhaseDurations,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PhaseDurations::default())
    }
}

impl Session {
    pub fn new(durations: PhaseDurations) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            clock: IntervalClock::new(Phase::Work, durations.work_minutes, 0),
            counters: SessionCounters::default(),
            running: false,
            durations,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.clock.phase()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn clock(&self) -> &IntervalClock {
        &self.clock
    }

    pub fn clock_state(&self) -> ClockState {
        self.clock.state(self.running)
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn durations(&self) -> PhaseDurations {
        self.durations
    }

    /// The one-second ticker should exist.
    pub fn wants_ticker(&self) -> bool {
        self.running
    }

    /// Presence sampling should exist.
    pub fn wants_presence(&self) -> bool {
        self.phase() == Phase::Work
    }

    /// The ambient ticking sound should be playing.
    pub fn wants_ambient(&self) -> bool {
        self.running && self.phase() == Phase::Work
    }

    pub fn on_person_detected(&mut self) -> Option<SessionEvent> {
        if self.running {
            return None;
        }
        self.running = true;
        info!("session {}: person detected, starting {}", self.id, self.clock.display());
        Some(SessionEvent::Started)
    }

    pub fn on_person_left(&mut self) -> Option<SessionEvent> {
        if self.phase() != Phase::Work {
            return None;
        }

        let already_fresh = !self.running
            && self.clock.is_at_top_of_phase()
            && self.clock.minutes() == self.durations.work_minutes
            && self.clock.seconds() == 0;
        self.running = false;
        self.clock.set_phase(Phase::Work, self.durations.work_minutes, 0);
        if already_fresh {
            return None;
        }

        info!("session {}: person left, work phase restarted", self.id);
        Some(SessionEvent::WorkRestarted)
    }

    /// Feeds one presence sample through the gate.
    pub fn observe(&mut self, person_present: bool) -> Option<SessionEvent> {
        let signal = PresenceGate::observe(person_present, self.phase())?;
        if signal.should_run() {
            self.on_person_detected()
        } else {
            self.on_person_left()
        }
    }

    pub fn pause(&mut self) -> Option<SessionEvent> {
        if !self.running {
            return None;
        }
        self.running = false;
        info!("session {}: paused at {}", self.id, self.clock.display());
        Some(SessionEvent::Paused)
    }

    pub fn reset(&mut self) -> SessionEvent {
        self.id = Uuid::new_v4().to_string();
        self.running = false;
        self.counters = SessionCounters::default();
        self.clock.set_phase(Phase::Work, self.durations.work_minutes, 0);
        info!("session {}: reset", self.id);
        SessionEvent::Reset
    }

    /// Advances the countdown by one second. Does nothing while paused.
    pub fn tick(&mut self) -> Option<SessionEvent> {
        if !self.running {
            return None;
        }

        match self.clock.tick()? {
            ClockEvent::PhaseComplete { .. } => Some(self.on_tick_expiry()),
        }
    }

    /// Closes the current phase: bumps its counter and installs the next one.
    pub fn on_tick_expiry(&mut self) -> SessionEvent {
        let completed = self.phase();
        let next = completed.next();
        self.counters.record_completed(completed);
        self.clock.set_phase(next, self.durations.minutes_for(next), 0);
        info!(
            "session {}: {} complete (work {}/break {}), {} begins",
            self.id,
            completed.as_str(),
            self.counters.work_intervals_completed,
            self.counters.break_intervals_completed,
            next.as_str()
        );
        SessionEvent::PhaseCompleted { completed, next }
    }

    pub fn adjust_duration(&mut self, delta: i32) -> Option<SessionEvent> {
        if self.running {
            debug!("session {}: ignoring duration change while running", self.id);
            return None;
        }
        if !self.clock.adjust_initial_minutes(delta) {
            return None;
        }
        Some(SessionEvent::DurationAdjusted {
            minutes: self.clock.minutes(),
        })
    }
}
