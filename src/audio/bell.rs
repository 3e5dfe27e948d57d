use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

const FUNDAMENTAL_HZ: f32 = 880.0;
const LENGTH_SECS: f32 = 2.5;

/// (frequency ratio, amplitude) of the bell's partials.
const PARTIALS: [(f32, f32); 3] = [(1.0, 0.6), (2.76, 0.25), (5.40, 0.15)];

/// A single struck bell that rings out and stops.
pub struct Bell {
    sample_rate: u32,
    position: u32,
    total_samples: u32,
}

impl Bell {
    pub fn new() -> Self {
        let sample_rate = 44100;
        Self {
            sample_rate,
            position: 0,
            total_samples: (sample_rate as f32 * LENGTH_SECS) as u32,
        }
    }
}

impl Iterator for Bell {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }

        let t = self.position as f32 / self.sample_rate as f32;
        self.position += 1;

        // Higher partials die away faster
        let sample: f32 = PARTIALS
            .iter()
            .enumerate()
            .map(|(i, (ratio, amplitude))| {
                let decay = (-t * (2.0 + i as f32 * 1.5)).exp();
                (TAU * FUNDAMENTAL_HZ * ratio * t).sin() * amplitude * decay
            })
            .sum();

        Some(sample * 0.8)
    }
}

impl Source for Bell {
    fn current_frame_len(&self) -> Option<usize> {
        Some((self.total_samples - self.position) as usize)
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(LENGTH_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rings_out_and_ends() {
        let samples: Vec<f32> = Bell::new().collect();
        assert_eq!(samples.len(), (44100.0 * LENGTH_SECS) as usize);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
        let head: f32 = samples[..4410].iter().map(|s| s.abs()).sum();
        let tail: f32 = samples[samples.len() - 4410..].iter().map(|s| s.abs()).sum();
        assert!(tail < head / 10.0);
    }
}
