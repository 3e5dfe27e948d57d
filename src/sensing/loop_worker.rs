use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::detector::{detect_person, PresenceSource};
use super::gate::PresenceObservation;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_info, log_warn};

const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 500;
const DEFAULT_SAMPLE_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingConfig {
    pub interval: Duration,
    /// A detection running longer than this is abandoned for the round.
    pub timeout: Duration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
            timeout: Duration::from_millis(DEFAULT_SAMPLE_TIMEOUT_MS),
        }
    }
}

pub async fn presence_loop(
    source: PresenceSource,
    sink: UnboundedSender<PresenceObservation>,
    config: SamplingConfig,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut sampler = PresenceSampler::new(source);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = tokio::select! {
                    outcome = sampler.sample(config.timeout) => outcome,
                    _ = cancel_token.cancelled() => break,
                };

                match outcome {
                    Ok(Some(person_present)) => {
                        if sink.send(PresenceObservation::now(person_present)).is_err() {
                            log_info!("presence sink closed, stopping sampling");
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => log_warn!("presence sample failed: {err:?}"),
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }

    log_info!("presence loop shutting down");
}

/// Runs detections one at a time.
///
/// A detection that outlives its timeout keeps running on the blocking pool,
/// but no new one starts until it has finished.
struct PresenceSampler {
    source: PresenceSource,
    pending: Option<JoinHandle<Result<Option<bool>>>>,
    waiting_for_model: bool,
}

impl PresenceSampler {
    fn new(source: PresenceSource) -> Self {
        Self {
            source,
            pending: None,
            waiting_for_model: false,
        }
    }

    async fn sample(&mut self, timeout: Duration) -> Result<Option<bool>> {
        if let Some(previous) = self.pending.take() {
            if !previous.is_finished() {
                log_debug!("previous detection still running, skipping sample");
                self.pending = Some(previous);
                return Ok(None);
            }
            // A late result is still the freshest one available
            log_debug!("collecting detection that outlived its timeout");
            return previous.await.context("detection worker join failed")?;
        }

        let Some(detector) = self.source.model.get() else {
            if !self.waiting_for_model {
                log_info!("detection model not loaded yet, presence sampling idle");
                self.waiting_for_model = true;
            }
            return Ok(None);
        };
        self.waiting_for_model = false;

        let frames = Arc::clone(&self.source.frames);
        let outcome = {
            let handle = self.pending.insert(tokio::task::spawn_blocking(move || {
                detect_person(frames.as_ref(), detector.as_ref())
            }));
            tokio::time::timeout(timeout, handle).await
        };

        match outcome {
            Ok(joined) => {
                self.pending = None;
                joined.context("detection worker join failed")?
            }
            Err(_) => {
                log_warn!("presence detection exceeded {:?}, dropping this sample", timeout);
                Ok(None)
            }
        }
    }
}
