use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use image::RgbImage;

use super::detector::{Detection, FrameSource, ObjectDetector, PERSON_CLASS};

/// Stand-in for the camera and the detection model, driven by hand.
///
/// Used by the terminal front end (`h` / `a`) and by tests.
pub struct SimulatedPresence {
    present: AtomicBool,
    camera_ready: AtomicBool,
}

impl SimulatedPresence {
    pub fn new(present: bool) -> Arc<Self> {
        Arc::new(Self {
            present: AtomicBool::new(present),
            camera_ready: AtomicBool::new(true),
        })
    }

    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    pub fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    pub fn set_camera_ready(&self, ready: bool) {
        self.camera_ready.store(ready, Ordering::SeqCst);
    }
}

impl FrameSource for SimulatedPresence {
    fn capture(&self) -> Result<Option<RgbImage>> {
        if !self.camera_ready.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(RgbImage::new(1, 1)))
    }
}

impl ObjectDetector for SimulatedPresence {
    fn detect(&self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        let mut detections = vec![Detection {
            class: "chair".into(),
            score: 0.8,
            bbox: [0.0, 0.0, 1.0, 1.0],
        }];
        if self.is_present() {
            detections.push(Detection {
                class: PERSON_CLASS.into(),
                score: 0.95,
                bbox: [0.0, 0.0, 1.0, 1.0],
            });
        }
        Ok(detections)
    }
}
