use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

/// Length of one audible click at the start of each second.
const CLICK_SECS: f32 = 0.03;

/// Endless mechanical clock: a short tick every second, alternating pitch
/// between "tick" and "tock".
pub struct ClockTick {
    sample_rate: u32,
    position: u64,
    rng: StdRng,
}

impl ClockTick {
    pub fn new() -> Self {
        Self {
            sample_rate: 44100,
            position: 0,
            rng: StdRng::from_entropy(),
        }
    }
}

impl Iterator for ClockTick {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let period = u64::from(self.sample_rate);
        let beat = self.position / period;
        let offset = self.position % period;
        self.position = self.position.wrapping_add(1);

        let t = offset as f32 / self.sample_rate as f32;
        if t > CLICK_SECS {
            return Some(0.0);
        }

        let pitch = if beat % 2 == 0 { 2_000.0 } else { 1_500.0 };
        let tone = (TAU * pitch * t).sin();
        // A little noise makes it sound like a mechanism rather than a beep
        let grit: f32 = self.rng.gen_range(-1.0..1.0);
        let envelope = (-t * 250.0).exp();

        Some((tone * 0.7 + grit * 0.3) * envelope * 0.5)
    }
}

impl Source for ClockTick {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
