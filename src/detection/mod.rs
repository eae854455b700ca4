// detection/mod.rs
pub mod detector;
pub mod tally;
pub mod types;

pub use detector::{Detector, ScriptedDetector, SimulatedDetector, SimulationProfile};
pub use tally::{tally_detections, IngestFilter, TallyReport, VehicleTally};
pub use types::{BoundingBox, Detection, VehicleClass};
