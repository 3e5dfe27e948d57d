use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::Phase;

/// One sample of "is somebody in front of the camera".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceObservation {
    pub person_present: bool,
    pub observed_at: DateTime<Utc>,
}

impl PresenceObservation {
    pub fn now(person_present: bool) -> Self {
        Self {
            person_present,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    /// A person is present during work; the countdown should run.
    ShouldRun,
    /// Nobody is present during work; stop and start the phase over.
    PresenceLost,
}

impl GateSignal {
    pub fn should_run(&self) -> bool {
        matches!(self, GateSignal::ShouldRun)
    }
}

/// Turns presence samples into run/pause decisions.
///
/// Breaks run regardless of who is at the desk, so nothing observed during a
/// break produces a signal.
pub struct PresenceGate;

impl PresenceGate {
    pub fn observe(person_present: bool, phase: Phase) -> Option<GateSignal> {
        match (phase, person_present) {
            (Phase::Break, _) => None,
            (Phase::Work, true) => Some(GateSignal::ShouldRun),
            (Phase::Work, false) => Some(GateSignal::PresenceLost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_phase_follows_presence() {
        assert_eq!(
            PresenceGate::observe(true, Phase::Work),
            Some(GateSignal::ShouldRun)
        );
        let lost = PresenceGate::observe(false, Phase::Work);
        assert_eq!(lost, Some(GateSignal::PresenceLost));
        assert!(!lost.map(|s| s.should_run()).unwrap_or(true));
    }

    #[test]
    fn break_phase_is_silent() {
        assert_eq!(PresenceGate::observe(true, Phase::Break), None);
        assert_eq!(PresenceGate::observe(false, Phase::Break), None);
    }
}
