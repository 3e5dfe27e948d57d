pub mod controller;
pub mod detector;
pub mod gate;
pub mod loop_worker;
pub mod simulated;

pub use controller::SensingController;
pub use detector::{
    contains_person, Detection, FrameSource, ModelSlot, ObjectDetector, PresenceSource,
    PERSON_CLASS,
};
pub use gate::{GateSignal, PresenceGate, PresenceObservation};
pub use loop_worker::SamplingConfig;
pub use simulated::SimulatedPresence;
