use serde::{Deserialize, Serialize};

/// Upper bound for the minutes field of the countdown.
pub const MAX_MINUTES: u32 = 100;

/// Counter values at which the progress bars read full.
const WORK_PROGRESS_SPAN: u32 = 25;
const BREAK_PROGRESS_SPAN: u32 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Work,
    Break,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Work
    }
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Work => "Work",
            Phase::Break => "Break",
        }
    }

    /// Background color the front end paints while this phase is active.
    pub fn color_hint(&self) -> &'static str {
        match self {
            Phase::Work => "#333",
            Phase::Break => "#2196f3",
        }
    }

    pub fn next(self) -> Phase {
        match self {
            Phase::Work => Phase::Break,
            Phase::Break => Phase::Work,
        }
    }
}

/// Default length of each phase, in whole minutes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDurations {
    pub work_minutes: u32,
    pub break_minutes: u32,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            break_minutes: 5,
        }
    }
}

impl PhaseDurations {
    pub fn minutes_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Work => self.work_minutes,
            Phase::Break => self.break_minutes,
        }
    }
}

/// What the display layer sees of the countdown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClockState {
    pub minutes_remaining: u32,
    pub seconds_remaining: u32,
    pub phase: Phase,
    pub running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// The countdown for `phase` was ticked while already at 0:00.
    PhaseComplete { phase: Phase },
}

/// Minute/second countdown for a single phase.
///
/// The clock never schedules itself; whoever owns it decides when to call
/// [`IntervalClock::tick`]. Reaching 0:00 is not the end of the phase: the
/// tick that arrives *at* 0:00 reports [`ClockEvent::PhaseComplete`] and leaves
/// the state untouched until [`IntervalClock::set_phase`] installs the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalClock {
    phase: Phase,
    minutes: u32,
    seconds: u32,
    /// No tick has consumed time since the last `set_phase`.
    at_top_of_phase: bool,
}

impl IntervalClock {
    pub fn new(phase: Phase, minutes: u32, seconds: u32) -> Self {
        let mut clock = Self {
            phase,
            minutes: 0,
            seconds: 0,
            at_top_of_phase: true,
        };
        clock.set_phase(phase, minutes, seconds);
        clock
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    pub fn is_at_top_of_phase(&self) -> bool {
        self.at_top_of_phase
    }

    pub fn is_expired(&self) -> bool {
        self.minutes == 0 && self.seconds == 0
    }

    pub fn tick(&mut self) -> Option<ClockEvent> {
        if self.seconds > 0 {
            self.seconds -= 1;
        } else if self.minutes == 0 {
            return Some(ClockEvent::PhaseComplete { phase: self.phase });
        } else {
            self.minutes -= 1;
            self.seconds = 59;
        }
        self.at_top_of_phase = false;
        None
    }

    pub fn set_phase(&mut self, phase: Phase, minutes: u32, seconds: u32) {
        self.phase = phase;
        self.minutes = minutes.min(MAX_MINUTES);
        self.seconds = seconds.min(59);
        self.at_top_of_phase = true;
    }

    /// Moves the starting minutes of the current phase by `delta`, clamped to
    /// `0..=MAX_MINUTES`. Ignored once the phase has started counting down.
    /// Returns whether the clock changed.
    pub fn adjust_initial_minutes(&mut self, delta: i32) -> bool {
        if !self.at_top_of_phase {
            return false;
        }

        let target = (i64::from(self.minutes) + i64::from(delta)).clamp(0, i64::from(MAX_MINUTES));
        let target = target as u32;
        if target == self.minutes {
            return false;
        }
        self.minutes = target;
        true
    }

    pub fn state(&self, running: bool) -> ClockState {
        ClockState {
            minutes_remaining: self.minutes,
            seconds_remaining: self.seconds,
            phase: self.phase,
            running,
        }
    }

    /// `M:SS`, seconds zero-padded.
    pub fn display(&self) -> String {
        format!("{}:{:02}", self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounters {
    pub work_intervals_completed: u32,
    pub break_intervals_completed: u32,
}

impl SessionCounters {
    pub fn record_completed(&mut self, phase: Phase) {
        match phase {
            Phase::Work => {
                self.work_intervals_completed = self.work_intervals_completed.saturating_add(1)
            }
            Phase::Break => {
                self.break_intervals_completed = self.break_intervals_completed.saturating_add(1)
            }
        }
    }

    /// 0.0 ..= 1.0 fill of the work progress bar.
    pub fn work_progress(&self) -> f64 {
        progress(self.work_intervals_completed, WORK_PROGRESS_SPAN)
    }

    /// 0.0 ..= 1.0 fill of the break progress bar.
    pub fn break_progress(&self) -> f64 {
        progress(self.break_intervals_completed, BREAK_PROGRESS_SPAN)
    }
}

fn progress(count: u32, span: u32) -> f64 {
    (f64::from(count) / f64::from(span)).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_decrements_seconds_then_borrows_a_minute() {
        let mut clock = IntervalClock::new(Phase::Work, 1, 1);
        assert_eq!(clock.tick(), None);
        assert_eq!((clock.minutes(), clock.seconds()), (1, 0));
        assert_eq!(clock.tick(), None);
        assert_eq!((clock.minutes(), clock.seconds()), (0, 59));
    }

    #[test]
    fn tick_at_zero_reports_completion_without_going_negative() {
        let mut clock = IntervalClock::new(Phase::Break, 0, 1);
        assert_eq!(clock.tick(), None);
        assert!(clock.is_expired());

        for _ in 0..3 {
            assert_eq!(
                clock.tick(),
                Some(ClockEvent::PhaseComplete {
                    phase: Phase::Break
                })
            );
            assert_eq!((clock.minutes(), clock.seconds()), (0, 0));
        }
    }

    #[test]
    fn full_work_phase_takes_1500_ticks_plus_expiry() {
        let mut clock = IntervalClock::new(Phase::Work, 25, 0);
        let mut completions = 0;
        for _ in 0..1500 {
            if clock.tick().is_some() {
                completions += 1;
            }
            assert!(clock.seconds() <= 59);
        }
        assert_eq!(completions, 0);
        assert!(clock.is_expired());
        assert!(clock.tick().is_some());
    }

    #[test]
    fn adjust_only_at_top_of_phase() {
        let mut clock = IntervalClock::new(Phase::Work, 25, 0);
        assert!(clock.adjust_initial_minutes(1));
        assert_eq!(clock.minutes(), 26);

        clock.tick();
        assert!(!clock.adjust_initial_minutes(1));
        assert_eq!(clock.display(), "25:59");

        clock.set_phase(Phase::Work, 25, 0);
        assert!(clock.adjust_initial_minutes(-1));
        assert_eq!(clock.minutes(), 24);
    }

    #[test]
    fn adjust_clamps_to_range() {
        let mut clock = IntervalClock::new(Phase::Work, MAX_MINUTES, 0);
        assert!(!clock.adjust_initial_minutes(1));
        assert_eq!(clock.minutes(), MAX_MINUTES);

        clock.set_phase(Phase::Work, 0, 0);
        assert!(!clock.adjust_initial_minutes(-1));
        assert_eq!(clock.minutes(), 0);

        clock.set_phase(Phase::Work, 98, 0);
        assert!(clock.adjust_initial_minutes(40));
        assert_eq!(clock.minutes(), MAX_MINUTES);
    }

    #[test]
    fn set_phase_clamps_inputs() {
        let clock = IntervalClock::new(Phase::Work, 500, 75);
        assert_eq!((clock.minutes(), clock.seconds()), (MAX_MINUTES, 59));
    }

    #[test]
    fn display_pads_seconds() {
        let clock = IntervalClock::new(Phase::Work, 3, 7);
        assert_eq!(clock.display(), "3:07");
    }

    #[test]
    fn progress_saturates() {
        let mut counters = SessionCounters::default();
        for _ in 0..7 {
            counters.record_completed(Phase::Break);
        }
        counters.record_completed(Phase::Work);
        assert_eq!(counters.break_progress(), 1.0);
        assert!((counters.work_progress() - 0.04).abs() < f64::EPSILON);
    }
}
