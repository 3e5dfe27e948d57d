use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::detector::PresenceSource;
use super::gate::PresenceObservation;
use super::loop_worker::{presence_loop, SamplingConfig};

/// Owns the presence sampling task while it runs.
pub struct SensingController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Default for SensingController {
    fn default() -> Self {
        Self::new()
    }
}

impl SensingController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start_sensing(
        &mut self,
        source: PresenceSource,
        sink: UnboundedSender<PresenceObservation>,
        config: SamplingConfig,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("sensing already active");
        }

        info!(
            "starting presence sampling every {}ms",
            config.interval.as_millis()
        );

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(presence_loop(source, sink, config, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop_sensing(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("presence loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::{FrameSource, ModelSlot, ObjectDetector, SimulatedPresence};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn start_stop_lifecycle() {
        let sensor = SimulatedPresence::new(true);
        let source = PresenceSource::new(
            Arc::clone(&sensor) as Arc<dyn FrameSource>,
            ModelSlot::loaded(Arc::clone(&sensor) as Arc<dyn ObjectDetector>),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sensing = SensingController::new();

        sensing
            .start_sensing(source.clone(), tx.clone(), SamplingConfig::default())
            .unwrap();
        assert!(sensing.is_active());
        assert!(sensing
            .start_sensing(source, tx, SamplingConfig::default())
            .is_err());

        assert!(rx.recv().await.is_some());

        sensing.stop_sensing().await.unwrap();
        assert!(!sensing.is_active());

        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err(), "no samples after stop");

        sensing.stop_sensing().await.unwrap();
    }
}
