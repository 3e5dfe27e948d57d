use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use image::RgbImage;
use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Detection class that counts as somebody being at the desk.
pub const PERSON_CLASS: &str = "person";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub class: String,
    pub score: f32,
    /// `[x, y, width, height]` in frame pixels.
    pub bbox: [f32; 4],
}

/// A camera, or anything that can hand out frames.
pub trait FrameSource: Send + Sync {
    /// `Ok(None)` while the device is still warming up.
    fn capture(&self) -> Result<Option<RgbImage>>;
}

/// A loaded object-detection model.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<Detection>>;
}

pub fn contains_person(detections: &[Detection]) -> bool {
    detections
        .iter()
        .any(|detection| detection.class == PERSON_CLASS)
}

/// Holds the detector once its (slow) load has finished.
#[derive(Clone, Default)]
pub struct ModelSlot {
    inner: Arc<OnceLock<Arc<dyn ObjectDetector>>>,
}

impl ModelSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn loaded(detector: Arc<dyn ObjectDetector>) -> Self {
        let slot = Self::empty();
        let _ = slot.inner.set(detector);
        slot
    }

    pub fn get(&self) -> Option<Arc<dyn ObjectDetector>> {
        self.inner.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Runs `load` on the blocking pool and fills the slot when it succeeds.
    pub fn spawn_load<F>(&self, load: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Result<Arc<dyn ObjectDetector>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || match load() {
            Ok(detector) => {
                if inner.set(detector).is_ok() {
                    info!("detection model loaded");
                }
            }
            Err(err) => error!("detection model failed to load: {err:?}"),
        })
    }
}

/// Camera plus model: everything needed to sample presence.
#[derive(Clone)]
pub struct PresenceSource {
    pub frames: Arc<dyn FrameSource>,
    pub model: ModelSlot,
}

impl PresenceSource {
    pub fn new(frames: Arc<dyn FrameSource>, model: ModelSlot) -> Self {
        Self { frames, model }
    }
}

/// One blocking capture + inference pass. `Ok(None)` means no signal.
pub fn detect_person(frames: &dyn FrameSource, detector: &dyn ObjectDetector) -> Result<Option<bool>> {
    let Some(frame) = frames.capture().context("camera capture failed")? else {
        return Ok(None);
    };
    let detections = detector
        .detect(&frame)
        .context("object detection failed")?;
    Ok(Some(contains_person(&detections)))
}
